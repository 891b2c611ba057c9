//! Script records: named shell command lists bound to a root path

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::store::{require_non_empty, IndexKeys, Record};

/// A saved script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Record id (UUID v4, assigned by the store)
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Directory the commands run in
    pub root_path: String,
    /// Commands run in order
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Script {
    pub fn new(
        name: impl Into<String>,
        root_path: impl Into<String>,
        commands: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            root_path: root_path.into(),
            commands,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a [`Script`]; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ScriptPatch {
    pub name: Option<String>,
    pub root_path: Option<String>,
    pub commands: Option<Vec<String>>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

impl Record for Script {
    const KIND: &'static str = "scripts";
    type Patch = ScriptPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty(Self::KIND, "name", &self.name)?;
        require_non_empty(Self::KIND, "rootPath", &self.root_path)?;
        if self.commands.is_empty() {
            return Err(ValidationError::MissingField {
                kind: Self::KIND,
                field: "commands",
            });
        }
        if let Some(pos) = self.commands.iter().position(|c| c.trim().is_empty()) {
            return Err(ValidationError::InvalidField {
                kind: Self::KIND,
                field: "commands",
                reason: format!("command #{} is empty", pos + 1),
            });
        }
        Ok(())
    }

    fn index_keys(&self) -> IndexKeys {
        IndexKeys {
            name: self.name.clone(),
            root_path: Some(self.root_path.clone()),
            tags: Vec::new(),
        }
    }

    /// Same commands in the same root are the same script, whatever its name
    fn dedup_key(&self) -> Option<String> {
        Some(format!("{}\u{0}{}", self.root_path, self.commands.join("\n")))
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_patch(&mut self, patch: ScriptPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(root_path) = patch.root_path {
            self.root_path = root_path;
        }
        if let Some(commands) = patch.commands {
            self.commands = commands;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        self.updated_at = Utc::now();
    }
}
