// GitCollaborator backed by the `git` executable
// Each call spawns `git` with an explicit current_dir; output is parsed from
// plumbing/porcelain formats with a fixed locale.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use super::{GitCollaborator, GitIdentity, GitStatus, StashOutcome};
use crate::error::GitError;

#[derive(Debug, Clone)]
pub struct CliGit {
    program: PathBuf,
}

impl Default for CliGit {
    fn default() -> Self {
        Self::new()
    }
}

impl CliGit {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn output(&self, dir: &Path, args: &[&str]) -> Result<Output, GitError> {
        Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GitError::Spawn {
                subcommand: args.join(" "),
                dir: dir.to_path_buf(),
                source: e,
            })
    }

    /// Run and require a zero exit; returns trimmed stdout
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = self.output(dir, args).await?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                subcommand: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn config_value(&self, dir: &Path, key: &str) -> Option<String> {
        self.run(dir, &["config", "--get", key])
            .await
            .ok()
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl GitCollaborator for CliGit {
    async fn is_repository(&self, dir: &Path) -> bool {
        matches!(
            self.run(dir, &["rev-parse", "--is-inside-work-tree"]).await.as_deref(),
            Ok("true")
        )
    }

    async fn get_status(&self, dir: &Path) -> Result<GitStatus, GitError> {
        let branch = self.current_branch(dir).await?;
        let commit = self.current_commit(dir).await?;

        // Not trimmed: leading spaces are significant in porcelain output
        let output = self.output(dir, &["status", "--porcelain=v1"]).await?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                subcommand: "status --porcelain=v1".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(GitStatus::from_porcelain(
            branch,
            commit,
            &String::from_utf8_lossy(&output.stdout),
        ))
    }

    async fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        match self.run(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await {
            Ok(branch) => Ok(branch),
            // Unborn branch (no commits yet)
            Err(_) => self.run(dir, &["symbolic-ref", "--short", "HEAD"]).await,
        }
    }

    async fn current_commit(&self, dir: &Path) -> Result<String, GitError> {
        self.run(dir, &["rev-parse", "HEAD"]).await
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<(), GitError> {
        self.run(dir, &["add", "-A"]).await?;
        self.run(dir, &["commit", "-m", message]).await?;
        Ok(())
    }

    async fn create_stash(&self, dir: &Path, label: &str) -> Result<StashOutcome, GitError> {
        let before = self.run(dir, &["rev-parse", "-q", "--verify", "refs/stash"]).await.ok();
        let message = self.run(dir, &["stash", "push", "-m", label]).await?;
        let after = self.run(dir, &["rev-parse", "-q", "--verify", "refs/stash"]).await.ok();

        // `git stash push` exits 0 even when there was nothing to stash
        if after.is_none() || after == before {
            return Ok(StashOutcome {
                success: false,
                stash_id: None,
                message,
            });
        }

        Ok(StashOutcome {
            success: true,
            stash_id: after,
            message,
        })
    }

    async fn apply_stash(&self, dir: &Path, stash_id: &str) -> Result<StashOutcome, GitError> {
        let output = self.output(dir, &["stash", "apply", stash_id]).await?;
        let success = output.status.success();
        let message = if success {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            String::from_utf8_lossy(&output.stderr).trim().to_string()
        };

        Ok(StashOutcome {
            success,
            stash_id: Some(stash_id.to_string()),
            message,
        })
    }

    async fn checkout_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.run(dir, &["checkout", branch, "--"]).await?;
        Ok(())
    }

    async fn is_configured(&self, dir: &Path) -> bool {
        self.config_value(dir, "user.name").await.is_some()
            && self.config_value(dir, "user.email").await.is_some()
    }

    async fn configure_identity(
        &self,
        dir: &Path,
        identity: &GitIdentity,
    ) -> Result<(), GitError> {
        self.run(dir, &["config", "user.name", identity.name.as_str()]).await?;
        self.run(dir, &["config", "user.email", identity.email.as_str()]).await?;
        Ok(())
    }
}
