//! The three record kinds kept in a [`crate::store::RecordStore`]

pub mod script;
pub mod session;
pub mod terminal_collection;

pub use script::{Script, ScriptPatch};
pub use session::{Session, SessionPatch};
pub use terminal_collection::{
    Lifecycle, TerminalCollection, TerminalCollectionPatch, TerminalSpec,
};

use crate::store::RecordStore;

pub type ScriptStore = RecordStore<Script>;
pub type TerminalCollectionStore = RecordStore<TerminalCollection>;
pub type SessionStore = RecordStore<Session>;
