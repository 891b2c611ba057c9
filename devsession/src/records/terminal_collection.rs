//! Terminal collection records: groups of terminals opened together

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::store::{require_non_empty, IndexKeys, Record};

/// When a collection should be launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// When the project is opened
    Open,
    /// When a session in the project is resumed
    Resume,
    /// When the project is closed
    Close,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Open => "open",
            Lifecycle::Resume => "resume",
            Lifecycle::Close => "close",
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lifecycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Lifecycle::Open),
            "resume" => Ok(Lifecycle::Resume),
            "close" => Ok(Lifecycle::Close),
            _ => Err(format!("Unknown lifecycle: {}", s)),
        }
    }
}

/// One terminal in a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSpec {
    pub name: String,
    /// Command typed into the terminal once it opens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Working directory, relative to the collection root if not absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalCollection {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub root_path: String,
    #[serde(default)]
    pub lifecycle: Vec<Lifecycle>,
    #[serde(default)]
    pub terminals: Vec<TerminalSpec>,
    /// Ids of scripts run when the collection launches
    #[serde(default)]
    pub script_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TerminalCollection {
    pub fn new(name: impl Into<String>, root_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            root_path: root_path.into(),
            lifecycle: Vec::new(),
            terminals: Vec::new(),
            script_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: &[Lifecycle]) -> Self {
        self.lifecycle = lifecycle.to_vec();
        self
    }

    pub fn with_terminal(mut self, terminal: TerminalSpec) -> Self {
        self.terminals.push(terminal);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TerminalCollectionPatch {
    pub name: Option<String>,
    pub root_path: Option<String>,
    pub lifecycle: Option<Vec<Lifecycle>>,
    pub terminals: Option<Vec<TerminalSpec>>,
    pub script_refs: Option<Vec<String>>,
}

impl Record for TerminalCollection {
    const KIND: &'static str = "terminals";
    type Patch = TerminalCollectionPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty(Self::KIND, "name", &self.name)?;
        require_non_empty(Self::KIND, "rootPath", &self.root_path)?;
        if let Some(pos) = self.terminals.iter().position(|t| t.name.trim().is_empty()) {
            return Err(ValidationError::InvalidField {
                kind: Self::KIND,
                field: "terminals",
                reason: format!("terminal #{} has no name", pos + 1),
            });
        }
        if self.script_refs.iter().any(|r| r.trim().is_empty()) {
            return Err(ValidationError::InvalidField {
                kind: Self::KIND,
                field: "scriptRefs",
                reason: "empty script reference".to_string(),
            });
        }
        Ok(())
    }

    fn index_keys(&self) -> IndexKeys {
        let mut tags: Vec<String> = self.lifecycle.iter().map(|l| l.as_str().to_string()).collect();
        tags.dedup();
        IndexKeys {
            name: self.name.clone(),
            root_path: Some(self.root_path.clone()),
            tags,
        }
    }

    /// One collection per name per root
    fn dedup_key(&self) -> Option<String> {
        Some(format!("{}\u{0}{}", self.root_path, self.name.to_lowercase()))
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_patch(&mut self, patch: TerminalCollectionPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(root_path) = patch.root_path {
            self.root_path = root_path;
        }
        if let Some(lifecycle) = patch.lifecycle {
            self.lifecycle = lifecycle;
        }
        if let Some(terminals) = patch.terminals {
            self.terminals = terminals;
        }
        if let Some(script_refs) = patch.script_refs {
            self.script_refs = script_refs;
        }
        self.updated_at = Utc::now();
    }
}
