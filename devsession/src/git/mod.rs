//! Git and terminal collaborators plus the pure snapshot rules
//!
//! The reconciler depends on the [`GitCollaborator`] and [`TerminalCollaborator`]
//! traits, not on how commands are run. Every call takes the directory it
//! operates in explicitly; nothing here reads or changes the process cwd.

pub mod cli;
pub mod snapshot;
pub mod status;
pub mod terminal;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GitError, TerminalError};

pub use cli::CliGit;
pub use snapshot::{can_stash, diverges, to_snapshot, Divergence, GitStateSnapshot, NO_GIT};
pub use status::{parse_porcelain, GitStatus};
pub use terminal::ShellTerminal;

/// Result of creating or applying a stash
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StashOutcome {
    pub success: bool,
    /// Stable identifier of the stash (its commit id)
    pub stash_id: Option<String>,
    pub message: String,
}

/// `user.name` / `user.email` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// Git operations the reconciler needs
#[async_trait]
pub trait GitCollaborator: Send + Sync {
    async fn is_repository(&self, dir: &Path) -> bool;

    async fn get_status(&self, dir: &Path) -> Result<GitStatus, GitError>;

    async fn current_branch(&self, dir: &Path) -> Result<String, GitError>;

    async fn current_commit(&self, dir: &Path) -> Result<String, GitError>;

    /// Stage everything and commit it
    async fn commit(&self, dir: &Path, message: &str) -> Result<(), GitError>;

    async fn create_stash(&self, dir: &Path, label: &str) -> Result<StashOutcome, GitError>;

    /// Apply exactly the stash identified by `stash_id`
    async fn apply_stash(&self, dir: &Path, stash_id: &str) -> Result<StashOutcome, GitError>;

    async fn checkout_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError>;

    /// Whether both `user.name` and `user.email` are set
    async fn is_configured(&self, dir: &Path) -> bool;

    async fn configure_identity(&self, dir: &Path, identity: &GitIdentity)
        -> Result<(), GitError>;
}

/// Captured output of a shell command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell commands (used for discard operations)
#[async_trait]
pub trait TerminalCollaborator: Send + Sync {
    /// Run `command` in `dir`; a non-zero exit is reported in the output, not as an error
    async fn execute(&self, dir: &Path, command: &str) -> Result<CommandOutput, TerminalError>;
}
