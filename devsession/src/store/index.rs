// Per-kind index: the sole authority for enumeration and secondary-key lookup.
// Persisted as <kind>/index.json through the atomic write protocol.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

use super::atomic;
use super::record::RecordFilter;

pub const INDEX_VERSION: u32 = 1;

/// Index row for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// SHA-256 of the record's natural key, so the index never holds it in clear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
    /// File name of the record, relative to the kind directory
    pub reference_file: String,
    pub updated_at: DateTime<Utc>,
}

/// Index persisted to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIndex {
    pub version: u32,
    /// Map of record id to index row
    pub entries: BTreeMap<String, IndexEntry>,
}

impl Default for RecordIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl RecordIndex {
    /// Load the index from disk, synthesizing an empty one if it doesn't exist.
    ///
    /// The synthesized index is not written back; the first mutation persists it.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(StoreError::storage("read index", path, e)),
        };

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let index: Self = serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if index.version > INDEX_VERSION {
            return Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                message: format!(
                    "index version {} is newer than supported version {}",
                    index.version, INDEX_VERSION
                ),
            });
        }

        Ok(index)
    }

    /// Persist the index through the atomic write protocol
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| StoreError::Serialize {
            kind: "index",
            source: e,
        })?;
        atomic::atomic_write(path, &json)
    }

    /// Insert or replace by id
    pub fn upsert(&mut self, id: &str, entry: IndexEntry) {
        self.entries.insert(id.to_string(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<IndexEntry> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of another record sharing `dedup_key`, ignoring `exclude_id`
    pub fn find_duplicate(&self, dedup_key: &str, exclude_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, entry)| {
                id.as_str() != exclude_id && entry.dedup_key.as_deref() == Some(dedup_key)
            })
            .map(|(id, _)| id.as_str())
    }

    /// Entries matching `filter`, newest first (ties broken by id).
    ///
    /// `filter.limit` is not applied here; callers truncate after resolving records.
    pub fn matching(&self, filter: &RecordFilter) -> Vec<(&str, &IndexEntry)> {
        let mut hits: Vec<(&str, &IndexEntry)> = self
            .entries
            .iter()
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(id, entry)| (id.as_str(), entry))
            .collect();

        hits.sort_by(|a, b| b.1.updated_at.cmp(&a.1.updated_at).then(a.0.cmp(b.0)));
        hits
    }
}
