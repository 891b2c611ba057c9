//! Git state snapshot captured at session-save time, and the pure rules
//! the reconciler uses to compare it with live state

use serde::{Deserialize, Serialize};

use super::status::GitStatus;

/// Branch/commit sentinel for sessions saved outside a git repository
pub const NO_GIT: &str = "no-git";

/// Persisted `{branch, commit, isDirty, stashId}` tuple on a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStateSnapshot {
    pub branch: String,
    pub commit: String,
    pub is_dirty: bool,
    #[serde(default)]
    pub stash_id: Option<String>,
}

impl GitStateSnapshot {
    /// Sentinel stored when the user saves without git integration
    pub fn no_git() -> Self {
        Self {
            branch: NO_GIT.to_string(),
            commit: NO_GIT.to_string(),
            is_dirty: false,
            stash_id: None,
        }
    }

    pub fn is_no_git(&self) -> bool {
        self.branch == NO_GIT && self.commit == NO_GIT
    }
}

/// True only when every change is a modification of a tracked file.
///
/// Added, deleted and untracked paths rule stashing out because a stash
/// cannot reliably recreate them in every git version/config.
pub fn can_stash(status: &GitStatus) -> bool {
    status.new_files.is_empty()
        && status.deleted_files.is_empty()
        && status.untracked_files.is_empty()
}

/// Project live status plus an optional stash id into the persisted shape
pub fn to_snapshot(status: &GitStatus, stash_id: Option<String>) -> GitStateSnapshot {
    GitStateSnapshot {
        branch: status.branch.clone(),
        commit: status.commit.clone(),
        is_dirty: status.is_dirty,
        stash_id,
    }
}

/// Which parts of live state differ from a stored snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Divergence {
    pub branch: bool,
    pub commit: bool,
}

impl Divergence {
    pub fn any(&self) -> bool {
        self.branch || self.commit
    }
}

/// Compare a stored snapshot with live branch/commit
pub fn diverges(stored: &GitStateSnapshot, live_branch: &str, live_commit: &str) -> Divergence {
    Divergence {
        branch: stored.branch != live_branch,
        commit: stored.commit != live_commit,
    }
}
