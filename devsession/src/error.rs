//! Error types shared by the store, the git collaborators and the reconciler

use std::path::PathBuf;

use thiserror::Error;

/// Failures from the record encryption codec. Both variants fail closed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Missing prefix, wrong field count or malformed base64
    #[error("invalid encrypted envelope: {0}")]
    InvalidFormat(String),
    /// Key derivation, cipher setup or authentication tag failure
    #[error("decryption/encryption failed: {0}")]
    CryptoFailure(String),
}

/// Payload problems. Always local to a single operation and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{kind}: missing required field `{field}`")]
    MissingField { kind: &'static str, field: &'static str },
    #[error("{kind}: invalid field `{field}`: {reason}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },
    #[error("{kind}: duplicate of existing record {existing_id} ({key})")]
    Duplicate {
        kind: &'static str,
        key: String,
        existing_id: String,
    },
}

/// Errors from a [`crate::store::RecordStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} record not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// File-system failure at any step, with the operation and path involved
    #[error("{op} failed for {}: {source}", .path.display())]
    Storage {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file that exists but does not parse as the expected document
    #[error("corrupt file {}: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("cannot decode {}: {source}", .path.display())]
    Crypto {
        path: PathBuf,
        #[source]
        source: CryptoError,
    },

    #[error("failed to serialize {kind} record: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn storage(
        op: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        StoreError::Storage {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors surfaced by a [`crate::git::GitCollaborator`]
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run `git {subcommand}` in {}: {source}", .dir.display())]
    Spawn {
        subcommand: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`git {subcommand}` exited with {status}: {stderr}")]
    CommandFailed {
        subcommand: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected output from `git {subcommand}`: {message}")]
    UnexpectedOutput { subcommand: String, message: String },
}

/// Errors surfaced by a [`crate::git::TerminalCollaborator`]
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("failed to run `{command}` in {}: {source}", .dir.display())]
    Spawn {
        command: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        stderr: String,
    },
}

/// Errors that end a save or resume flow. Cancellation is not an error.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Terminal(#[from] TerminalError),

    #[error("{} is not a git repository", .dir.display())]
    NotARepository { dir: PathBuf },

    #[error("project root {} does not exist", .dir.display())]
    ProjectRootMissing { dir: PathBuf },

    #[error("stash was not created: {message}")]
    StashFailed { message: String },

    /// A restore step failed; `report` says which steps had already completed
    #[error("restoring git state failed ({report}): {source}")]
    Restore {
        report: crate::reconcile::RestoreReport,
        #[source]
        source: GitError,
    },

    #[error("resume failed: {0:#}")]
    Resumer(anyhow::Error),
}
