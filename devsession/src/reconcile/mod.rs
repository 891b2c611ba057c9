//! Save and resume flows that reconcile live git state with stored sessions
//!
//! Both flows are small state machines driven by [`SessionReconciler`]. Git and
//! terminal commands always receive the directory they act on; the process
//! working directory is never changed.

pub mod prompt;
pub mod resume;
pub mod save;

use std::path::Path;
use std::sync::Arc;

use crate::error::{ReconcileError, TerminalError};
use crate::git::{can_stash, GitCollaborator, GitStateSnapshot, GitStatus, TerminalCollaborator};
use crate::records::SessionStore;

pub use prompt::{DirtyResolution, SessionDetails, SessionPrompter, SessionResumer};
pub use resume::{ResumeOutcome, ResumeReport, RestoreReport, WorkingDirs};
pub use save::{SaveOutcome, SaveRequest};

/// Commands run by the discard resolution, in order
pub const DISCARD_COMMANDS: [&str; 2] = ["git reset --hard", "git clean -fd"];

/// Label prefix of stashes created by the reconciler
pub const STASH_LABEL_PREFIX: &str = "devsession";

/// Why a flow stopped early. Cancellation is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Declined to save outside a git repository
    NoGitDeclined,
    /// Chose `cancel` when asked how to handle uncommitted changes
    DirtyResolution,
    /// No commit message was given
    CommitMessage,
    /// No git identity was given for an unconfigured repository
    GitIdentity,
    /// Session details prompt was dismissed
    Details,
    /// No session was picked (or none exist)
    NoSessionSelected,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CancelReason::NoGitDeclined => "declined to continue without git",
            CancelReason::DirtyResolution => "uncommitted changes left unresolved",
            CancelReason::CommitMessage => "no commit message given",
            CancelReason::GitIdentity => "git identity not configured",
            CancelReason::Details => "session details not provided",
            CancelReason::NoSessionSelected => "no session selected",
        };
        f.write_str(text)
    }
}

/// What a dirty-tree resolution did
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolved {
    Committed,
    Stashed(String),
    Discarded,
    Cancelled(CancelReason),
}

/// Drives the save and resume flows against the session store and the
/// git/terminal/user collaborators
#[derive(Clone)]
pub struct SessionReconciler {
    sessions: SessionStore,
    git: Arc<dyn GitCollaborator>,
    terminal: Arc<dyn TerminalCollaborator>,
    prompter: Arc<dyn SessionPrompter>,
    resumer: Arc<dyn SessionResumer>,
}

impl std::fmt::Debug for SessionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionReconciler")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl SessionReconciler {
    pub fn new(
        sessions: SessionStore,
        git: Arc<dyn GitCollaborator>,
        terminal: Arc<dyn TerminalCollaborator>,
        prompter: Arc<dyn SessionPrompter>,
        resumer: Arc<dyn SessionResumer>,
    ) -> Self {
        Self {
            sessions,
            git,
            terminal,
            prompter,
            resumer,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Dirty-tree options in the order they are offered
    pub(crate) fn dirty_options(status: &GitStatus, for_resume: bool) -> Vec<DirtyResolution> {
        let mut options = vec![DirtyResolution::Commit];
        if for_resume {
            options.push(DirtyResolution::SaveAsNew);
        } else if can_stash(status) {
            options.push(DirtyResolution::Stash);
        }
        options.push(DirtyResolution::Discard);
        options.push(DirtyResolution::Cancel);
        options
    }

    /// Commit everything. The message is asked for first; an identity is
    /// configured only once the commit is going ahead and git has none.
    /// A failed commit offers stashing instead when the changes allow it.
    pub(crate) async fn commit_changes(
        &self,
        dir: &Path,
        status: &GitStatus,
    ) -> Result<Resolved, ReconcileError> {
        let message = self
            .prompter
            .commit_message()
            .filter(|m| !m.trim().is_empty());
        let Some(message) = message else {
            return Ok(Resolved::Cancelled(CancelReason::CommitMessage));
        };

        if !self.git.is_configured(dir).await {
            let Some(identity) = self.prompter.git_identity() else {
                return Ok(Resolved::Cancelled(CancelReason::GitIdentity));
            };
            self.git.configure_identity(dir, &identity).await?;
            tracing::info!(dir = %dir.display(), name = %identity.name, "Configured git identity");
        }

        match self.git.commit(dir, &message).await {
            Ok(()) => {
                tracing::info!(dir = %dir.display(), "Committed working tree changes");
                Ok(Resolved::Committed)
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Commit failed");
                if can_stash(status) && self.prompter.confirm_stash_fallback(&e) {
                    self.stash_changes(dir, &status.branch).await
                } else {
                    Err(e.into())
                }
            }
        }
    }

    pub(crate) async fn stash_changes(
        &self,
        dir: &Path,
        branch: &str,
    ) -> Result<Resolved, ReconcileError> {
        let label = format!(
            "{}: {} {}",
            STASH_LABEL_PREFIX,
            branch,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        let outcome = self.git.create_stash(dir, &label).await?;
        match outcome.stash_id {
            Some(stash_id) if outcome.success => {
                tracing::info!(dir = %dir.display(), stash_id = %stash_id, "Stashed changes");
                Ok(Resolved::Stashed(stash_id))
            }
            _ => Err(ReconcileError::StashFailed {
                message: outcome.message,
            }),
        }
    }

    pub(crate) async fn discard_changes(&self, dir: &Path) -> Result<Resolved, ReconcileError> {
        for command in DISCARD_COMMANDS {
            let output = self.terminal.execute(dir, command).await?;
            if !output.success() {
                return Err(TerminalError::NonZeroExit {
                    command: command.to_string(),
                    exit_code: output.exit_code,
                    stderr: output.stderr,
                }
                .into());
            }
        }
        tracing::warn!(dir = %dir.display(), "Discarded uncommitted changes");
        Ok(Resolved::Discarded)
    }

    /// Apply a commit/stash/discard choice. `SaveAsNew` is handled by resume.
    pub(crate) async fn resolve_dirty(
        &self,
        dir: &Path,
        status: &GitStatus,
        choice: DirtyResolution,
    ) -> Result<Resolved, ReconcileError> {
        match choice {
            DirtyResolution::Commit => self.commit_changes(dir, status).await,
            DirtyResolution::Stash => self.stash_changes(dir, &status.branch).await,
            DirtyResolution::Discard => self.discard_changes(dir).await,
            DirtyResolution::SaveAsNew | DirtyResolution::Cancel => {
                Ok(Resolved::Cancelled(CancelReason::DirtyResolution))
            }
        }
    }

    /// Re-read branch and commit after a resolution. The snapshot is never
    /// marked dirty; a stash made by the resolution is recorded on it.
    pub(crate) async fn capture_state(
        &self,
        dir: &Path,
        stash_id: Option<String>,
    ) -> Result<GitStateSnapshot, ReconcileError> {
        let branch = self.git.current_branch(dir).await?;
        let commit = self.git.current_commit(dir).await?;
        Ok(GitStateSnapshot {
            branch,
            commit,
            is_dirty: false,
            stash_id,
        })
    }
}

pub(crate) fn project_root_string(dir: &Path) -> String {
    dir.to_string_lossy().into_owned()
}
