//! Resume flow: select, load, inspect the session's repo, resolve dirty
//! changes, restore branch and stash, then hand over to the resume use case

use std::path::{Path, PathBuf};

use super::{CancelReason, DirtyResolution, Resolved, SaveOutcome, SessionReconciler};
use crate::error::{GitError, ReconcileError};
use crate::git::{diverges, Divergence};
use crate::records::Session;
use crate::store::RecordFilter;

/// Directories involved in a resume.
///
/// Git and terminal calls run in `git`; the resume use case runs in
/// `original`. Neither is ever made the process working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirs {
    pub original: PathBuf,
    pub git: PathBuf,
}

impl WorkingDirs {
    pub fn is_cross_project(&self) -> bool {
        self.original != self.git
    }
}

/// Which restore steps completed. A failed stash apply leaves the branch
/// switch in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub branch_switched: bool,
    pub stash_applied: bool,
}

impl std::fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "branch switched: {}, stash applied: {}",
            self.branch_switched, self.stash_applied
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeReport {
    pub session: Session,
    /// Session created from the dirty tree via save-as-new
    pub saved_as_new: Option<Session>,
    pub dirs: WorkingDirs,
    /// Live state compared with the stored snapshot before restoring
    pub divergence: Divergence,
    pub restore: RestoreReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed(Box<ResumeReport>),
    Cancelled(CancelReason),
}

impl SessionReconciler {
    /// Resume `session_id`, or ask which session to resume when `None`.
    /// `cwd` is the caller's directory; it is handed to the resume use case.
    pub async fn resume(
        &self,
        cwd: &Path,
        session_id: Option<&str>,
    ) -> Result<ResumeOutcome, ReconcileError> {
        let id = match session_id {
            Some(id) => id.to_string(),
            None => {
                let sessions = self.sessions.list(&RecordFilter::all())?;
                if sessions.is_empty() {
                    tracing::info!("No saved sessions to resume");
                    return Ok(ResumeOutcome::Cancelled(CancelReason::NoSessionSelected));
                }
                match self.prompter.select_session(&sessions) {
                    Some(id) => id,
                    None => return Ok(ResumeOutcome::Cancelled(CancelReason::NoSessionSelected)),
                }
            }
        };

        let session = self.sessions.get(&id)?;
        let dirs = WorkingDirs {
            original: cwd.to_path_buf(),
            git: PathBuf::from(&session.project_root),
        };
        tracing::info!(
            id = %session.id,
            name = %session.name,
            project_root = %dirs.git.display(),
            cross_project = dirs.is_cross_project(),
            "Resuming session"
        );

        let mut report = ResumeReport {
            session,
            saved_as_new: None,
            dirs,
            divergence: Divergence::default(),
            restore: RestoreReport::default(),
        };

        if report.session.git.is_no_git() {
            tracing::debug!("Session was saved without git; skipping git restore");
        } else if let Some(reason) = self.reconcile_git(&mut report).await? {
            return Ok(ResumeOutcome::Cancelled(reason));
        }

        self.resumer
            .resume(&report.session, &report.dirs.original)
            .await
            .map_err(ReconcileError::Resumer)?;

        Ok(ResumeOutcome::Resumed(Box::new(report)))
    }

    /// Check the repo, resolve dirty changes and restore git state.
    /// Returns a cancel reason when the user backs out.
    async fn reconcile_git(
        &self,
        report: &mut ResumeReport,
    ) -> Result<Option<CancelReason>, ReconcileError> {
        let dir = report.dirs.git.clone();
        if !dir.is_dir() {
            return Err(ReconcileError::ProjectRootMissing { dir });
        }
        if !self.git.is_repository(&dir).await {
            return Err(ReconcileError::NotARepository { dir });
        }

        let status = self.git.get_status(&dir).await?;
        report.divergence = diverges(&report.session.git, &status.branch, &status.commit);
        if report.divergence.any() {
            tracing::info!(
                stored_branch = %report.session.git.branch,
                live_branch = %status.branch,
                commit_changed = report.divergence.commit,
                "Live git state differs from session"
            );
        }

        if status.is_dirty {
            let options = Self::dirty_options(&status, true);
            let choice = self.prompter.choose_dirty_resolution(&status, &options);
            if !options.contains(&choice) {
                tracing::warn!(choice = %choice, "Resolution not offered for this resume");
                return Ok(Some(CancelReason::DirtyResolution));
            }

            if choice == DirtyResolution::SaveAsNew {
                match self.save_dirty_as_new(&dir, &status).await? {
                    SaveOutcome::Saved(saved) => report.saved_as_new = Some(saved),
                    SaveOutcome::Cancelled(reason) => return Ok(Some(reason)),
                }
            } else if let Resolved::Cancelled(reason) =
                self.resolve_dirty(&dir, &status, choice).await?
            {
                return Ok(Some(reason));
            }
        }

        self.restore_git_state(&dir, report).await?;
        Ok(None)
    }

    /// Check out the stored branch if needed, then apply the stored stash.
    /// Stops at the first failure and reports what already happened.
    async fn restore_git_state(
        &self,
        dir: &Path,
        report: &mut ResumeReport,
    ) -> Result<(), ReconcileError> {
        let target = &report.session.git;

        let live_branch = self
            .git
            .current_branch(dir)
            .await
            .map_err(|source| restore_error(report.restore, source))?;

        if live_branch != target.branch {
            self.git
                .checkout_branch(dir, &target.branch)
                .await
                .map_err(|source| restore_error(report.restore, source))?;
            report.restore.branch_switched = true;
            tracing::info!(from = %live_branch, to = %target.branch, "Checked out session branch");
        }

        if let Some(stash_id) = &target.stash_id {
            let outcome = self
                .git
                .apply_stash(dir, stash_id)
                .await
                .map_err(|source| restore_error(report.restore, source))?;
            if !outcome.success {
                tracing::warn!(
                    stash_id = %stash_id,
                    message = %outcome.message,
                    "Stash apply failed"
                );
                return Err(restore_error(
                    report.restore,
                    GitError::CommandFailed {
                        subcommand: format!("stash apply {}", stash_id),
                        status: "failed".to_string(),
                        stderr: outcome.message,
                    },
                ));
            }
            report.restore.stash_applied = true;
            tracing::info!(stash_id = %stash_id, "Applied session stash");
        }

        Ok(())
    }
}

fn restore_error(report: RestoreReport, source: GitError) -> ReconcileError {
    ReconcileError::Restore { report, source }
}
