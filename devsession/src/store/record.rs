//! Capability set a type needs to live in a [`super::RecordStore`]

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ValidationError;

use super::index::IndexEntry;

/// Secondary keys copied into the index so enumeration never opens record files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexKeys {
    pub name: String,
    pub root_path: Option<String>,
    pub tags: Vec<String>,
}

/// A persisted document kind (script, terminal collection, session)
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Subdirectory name under the data dir, also used in error messages
    const KIND: &'static str;

    /// Partial update accepted by [`super::RecordStore::update`]
    type Patch;

    fn id(&self) -> &str;

    /// Only called by the store when creating a record without an id
    fn set_id(&mut self, id: String);

    /// Check required fields and field shapes
    fn validate(&self) -> Result<(), ValidationError>;

    fn index_keys(&self) -> IndexKeys;

    /// Natural de-duplication key, if the kind has one
    fn dedup_key(&self) -> Option<String> {
        None
    }

    fn updated_at(&self) -> DateTime<Utc>;

    /// Merge `patch` into the record and bump `updated_at`
    fn apply_patch(&mut self, patch: Self::Patch);
}

/// Filter over index entries; all set fields must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Case-insensitive exact name match
    pub name: Option<String>,
    pub root_path: Option<String>,
    pub tag: Option<String>,
    /// Maximum number of records returned (newest first)
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &IndexEntry) -> bool {
        if let Some(name) = &self.name {
            if !entry.name.eq_ignore_ascii_case(name) {
                return false;
            }
        }
        if let Some(root) = &self.root_path {
            if entry.root_path.as_deref() != Some(root.as_str()) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !entry.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}

/// Reject empty or whitespace-only required string fields
pub fn require_non_empty(
    kind: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField { kind, field })
    } else {
        Ok(())
    }
}
