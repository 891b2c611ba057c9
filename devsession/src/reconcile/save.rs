//! Save flow: check repo, resolve dirty changes, capture state, persist

use std::path::Path;

use super::{project_root_string, CancelReason, Resolved, SessionDetails, SessionReconciler};
use crate::error::ReconcileError;
use crate::git::{GitStateSnapshot, GitStatus};
use crate::records::Session;

/// Optional presets for a save. A preset name skips the details prompt.
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub files: Vec<String>,
    pub terminal_refs: Vec<String>,
    pub script_refs: Vec<String>,
}

impl SaveRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(Session),
    Cancelled(CancelReason),
}

impl SaveOutcome {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SaveOutcome::Saved(session) => Some(session),
            SaveOutcome::Cancelled(_) => None,
        }
    }
}

impl SessionReconciler {
    /// Save the state of the project in `dir` as a new session
    pub async fn save(
        &self,
        dir: &Path,
        request: SaveRequest,
    ) -> Result<SaveOutcome, ReconcileError> {
        tracing::debug!(dir = %dir.display(), "Saving session");

        if !self.git.is_repository(dir).await {
            if !self.prompter.confirm_without_git(dir) {
                return Ok(SaveOutcome::Cancelled(CancelReason::NoGitDeclined));
            }
            tracing::info!(dir = %dir.display(), "Saving session without git integration");
            let git = GitStateSnapshot::no_git();
            let Some(details) = self.details(dir, None, &request) else {
                return Ok(SaveOutcome::Cancelled(CancelReason::Details));
            };
            return self.persist(dir, git, details, request);
        }

        let status = self.git.get_status(dir).await?;
        let mut stash_id = None;

        if status.is_dirty {
            let options = Self::dirty_options(&status, false);
            let choice = self.prompter.choose_dirty_resolution(&status, &options);
            if !options.contains(&choice) {
                tracing::warn!(choice = %choice, "Resolution not offered for this save");
                return Ok(SaveOutcome::Cancelled(CancelReason::DirtyResolution));
            }

            match self.resolve_dirty(dir, &status, choice).await? {
                Resolved::Cancelled(reason) => return Ok(SaveOutcome::Cancelled(reason)),
                Resolved::Stashed(id) => stash_id = Some(id),
                Resolved::Committed | Resolved::Discarded => {}
            }
        }

        let git = self.capture_state(dir, stash_id).await?;
        let Some(details) = self.details(dir, Some(&git.branch), &request) else {
            return Ok(SaveOutcome::Cancelled(CancelReason::Details));
        };
        self.persist(dir, git, details, request)
    }

    /// Capture the current dirty tree as a new session. Details are asked
    /// before anything touches the tree; the changes are then stashed when
    /// they allow it so the tree is clean for what follows.
    pub(crate) async fn save_dirty_as_new(
        &self,
        dir: &Path,
        status: &GitStatus,
    ) -> Result<SaveOutcome, ReconcileError> {
        let request = SaveRequest::default();
        let Some(details) = self.details(dir, Some(&status.branch), &request) else {
            return Ok(SaveOutcome::Cancelled(CancelReason::Details));
        };

        let stash_id = if crate::git::can_stash(status) {
            match self.stash_changes(dir, &status.branch).await? {
                Resolved::Stashed(id) => Some(id),
                _ => None,
            }
        } else {
            tracing::warn!(
                dir = %dir.display(),
                "Changes include added, deleted or untracked files; saving without a stash"
            );
            None
        };

        let git = self.capture_state(dir, stash_id).await?;
        self.persist(dir, git, details, request)
    }

    /// Preset name from the request, otherwise ask
    fn details(
        &self,
        dir: &Path,
        branch: Option<&str>,
        request: &SaveRequest,
    ) -> Option<SessionDetails> {
        match request.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => Some(SessionDetails {
                name: name.to_string(),
                notes: request.notes.clone(),
                tags: request.tags.clone(),
            }),
            None => self.prompter.session_details(&SessionDetails {
                name: default_session_name(dir, branch),
                notes: request.notes.clone(),
                tags: request.tags.clone(),
            }),
        }
    }

    fn persist(
        &self,
        dir: &Path,
        git: GitStateSnapshot,
        details: SessionDetails,
        request: SaveRequest,
    ) -> Result<SaveOutcome, ReconcileError> {
        let mut session = Session::new(details.name, project_root_string(dir), git);
        session.notes = details.notes;
        session.tags = details.tags;
        session.files = request.files;
        session.terminal_refs = request.terminal_refs;
        session.script_refs = request.script_refs;

        let session = self.sessions.create(session)?;
        tracing::info!(
            id = %session.id,
            name = %session.name,
            branch = %session.git.branch,
            stashed = session.git.stash_id.is_some(),
            "Saved session"
        );
        Ok(SaveOutcome::Saved(session))
    }
}

/// `<dir name> @ <branch>`, or just the dir name outside git
fn default_session_name(dir: &Path, branch: Option<&str>) -> String {
    let base = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    match branch {
        Some(branch) => format!("{} @ {}", base, branch),
        None => base,
    }
}
