//! Session records: a named point in a project's work, with the git state to return to

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, ValidationError};
use crate::git::GitStateSnapshot;
use crate::store::{require_non_empty, IndexKeys, Record, RecordFilter, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Absolute path of the project (git working tree) the session belongs to
    pub project_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Git state captured at save time; never mutated by resume
    pub git: GitStateSnapshot,
    /// Files to reopen on resume
    #[serde(default)]
    pub files: Vec<String>,
    /// Ids of terminal collections to relaunch
    #[serde(default)]
    pub terminal_refs: Vec<String>,
    /// Ids of scripts to rerun
    #[serde(default)]
    pub script_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        name: impl Into<String>,
        project_root: impl Into<String>,
        git: GitStateSnapshot,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            project_root: project_root.into(),
            notes: None,
            tags: Vec::new(),
            git,
            files: Vec::new(),
            terminal_refs: Vec::new(),
            script_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub notes: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub files: Option<Vec<String>>,
    pub terminal_refs: Option<Vec<String>>,
    pub script_refs: Option<Vec<String>>,
}

impl Record for Session {
    const KIND: &'static str = "sessions";
    type Patch = SessionPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty(Self::KIND, "name", &self.name)?;
        require_non_empty(Self::KIND, "projectRoot", &self.project_root)?;
        require_non_empty(Self::KIND, "git.branch", &self.git.branch)?;
        require_non_empty(Self::KIND, "git.commit", &self.git.commit)?;
        if self.git.stash_id.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ValidationError::InvalidField {
                kind: Self::KIND,
                field: "git.stashId",
                reason: "empty stash id".to_string(),
            });
        }
        Ok(())
    }

    fn index_keys(&self) -> IndexKeys {
        IndexKeys {
            name: self.name.clone(),
            root_path: Some(self.project_root.clone()),
            tags: self.tags.clone(),
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_patch(&mut self, patch: SessionPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(files) = patch.files {
            self.files = files;
        }
        if let Some(terminal_refs) = patch.terminal_refs {
            self.terminal_refs = terminal_refs;
        }
        if let Some(script_refs) = patch.script_refs {
            self.script_refs = script_refs;
        }
        self.updated_at = Utc::now();
    }
}

impl RecordStore<Session> {
    /// Most recently updated session for a project root, if any
    pub fn latest_for_project(&self, project_root: &str) -> Result<Option<Session>, StoreError> {
        let mut sessions = self.list(&RecordFilter::all().root_path(project_root).limit(1))?;
        Ok(sessions.pop())
    }
}
