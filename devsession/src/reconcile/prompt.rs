//! User-decision and resume-use-case seams of the reconciler
//!
//! The reconciler never talks to a terminal or UI directly. Every choice it
//! needs goes through [`SessionPrompter`]; the work done after git state is
//! restored (reopening files, terminals, an IDE) goes through [`SessionResumer`].

use std::path::Path;

use async_trait::async_trait;

use crate::error::GitError;
use crate::git::{GitIdentity, GitStatus};
use crate::records::Session;

/// Ways to deal with uncommitted changes before saving or resuming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirtyResolution {
    /// Stage everything and commit
    Commit,
    /// Stash tracked modifications; only offered when stashing is safe
    Stash,
    /// `git reset --hard` plus `git clean -fd`
    Discard,
    /// Resume only: capture the dirty state as a new session first
    SaveAsNew,
    Cancel,
}

impl DirtyResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirtyResolution::Commit => "commit",
            DirtyResolution::Stash => "stash",
            DirtyResolution::Discard => "discard",
            DirtyResolution::SaveAsNew => "save-as-new",
            DirtyResolution::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for DirtyResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, notes and tags entered for a new session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDetails {
    pub name: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

/// Every decision the save and resume flows ask the user for.
///
/// Returning `None` (or `false`) from a prompt declines it; the flow ends
/// with a cancelled outcome rather than an error.
pub trait SessionPrompter: Send + Sync {
    /// `dir` is not a git repository; save without git integration?
    fn confirm_without_git(&self, dir: &Path) -> bool;

    /// Pick one of `options` for the dirty working tree described by `status`
    fn choose_dirty_resolution(
        &self,
        status: &GitStatus,
        options: &[DirtyResolution],
    ) -> DirtyResolution;

    fn commit_message(&self) -> Option<String>;

    /// Asked when git has no `user.name`/`user.email`
    fn git_identity(&self) -> Option<GitIdentity>;

    /// The commit failed; stash the changes instead?
    fn confirm_stash_fallback(&self, error: &GitError) -> bool;

    fn session_details(&self, defaults: &SessionDetails) -> Option<SessionDetails>;

    /// Pick a session to resume; returns its id
    fn select_session(&self, sessions: &[Session]) -> Option<String>;
}

/// Resumption work that runs after git state has been restored
#[async_trait]
pub trait SessionResumer: Send + Sync {
    /// `original_dir` is the directory the caller started in, not the
    /// session's project root
    async fn resume(&self, session: &Session, original_dir: &Path) -> anyhow::Result<()>;
}
