// Data directory, passphrase and log filter (shared by the library and the CLI)
pub mod config;

// tracing subscriber setup; only the binary calls it
pub mod logging;

pub mod error;

// ENCRYPTED_v1 envelope for record files
pub mod crypto;

// Generic atomic, index-backed record store
pub mod store;

// Scripts, terminal collections and sessions
pub mod records;

// Git/terminal collaborators and snapshot rules
pub mod git;

// Save and resume state machines
pub mod reconcile;

pub use config::Config;
pub use error::{CryptoError, GitError, ReconcileError, StoreError, TerminalError, ValidationError};
pub use records::{Script, Session, SessionStore, TerminalCollection};
pub use reconcile::{ResumeOutcome, SaveOutcome, SaveRequest, SessionReconciler};
pub use store::{Record, RecordFilter, RecordStore};
