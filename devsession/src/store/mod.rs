//! Record store: one index file plus one file per record, per kind
//!
//! Layout under the data directory:
//! `<data_dir>/<kind>/index.json` and `<data_dir>/<kind>/<id>.json`
//! (`.tmp`/`.bak` siblings appear transiently or after overwrites).
//!
//! - Record files are written before the index entry that references them
//! - Index entries are removed before the files they reference
//! - Orphaned files are acceptable garbage; dangling index entries are not
//! - Reads auto-detect encrypted envelopes; writes encrypt when a passphrase is configured

pub mod atomic;
pub mod index;
pub mod record;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use fs2::FileExt;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::crypto;
use crate::error::{CryptoError, StoreError, ValidationError};

pub use index::{IndexEntry, RecordIndex};
pub use record::{require_non_empty, IndexKeys, Record, RecordFilter};

const INDEX_FILE: &str = "index.json";
const LOCK_FILE: &str = "index.lock";

/// Maximum number of entries to scan during temp cleanup
const CLEANUP_SCAN_LIMIT: usize = 1000;

/// Age threshold for temp file cleanup (1 hour)
const CLEANUP_AGE_THRESHOLD: Duration = Duration::from_secs(3600);

/// Generic keyed document store, instantiated once per record kind
pub struct RecordStore<R: Record> {
    dir: PathBuf,
    passphrase: Option<String>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            passphrase: self.passphrase.clone(),
            _kind: PhantomData,
        }
    }
}

impl<R: Record> std::fmt::Debug for RecordStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("kind", &R::KIND)
            .field("dir", &self.dir)
            .field("encrypted", &self.passphrase.is_some())
            .finish()
    }
}

/// Exclusive advisory lock on the kind's index, released on drop
struct IndexLock {
    _file: File,
}

impl<R: Record> RecordStore<R> {
    /// Store for `R` under `config.data_dir`, encrypting writes if configured
    pub fn open(config: &Config) -> Self {
        Self::at(config.kind_dir(R::KIND), config.encryption_passphrase.clone())
    }

    /// Store rooted at an explicit kind directory
    pub fn at(dir: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            passphrase: passphrase.filter(|p| !p.is_empty()),
            _kind: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Path of the record file for `id`
    pub fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(Self::reference_file(id))
    }

    fn reference_file(id: &str) -> String {
        format!("{}.json", id)
    }

    /// Ensure the kind directory exists with strict permissions
    fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::storage("create store directory", &self.dir, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::storage("set directory permissions", &self.dir, e))?;
        }

        Ok(())
    }

    fn lock_index(&self) -> Result<IndexLock, StoreError> {
        self.ensure_dir()?;
        let path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| StoreError::storage("open index lock", &path, e))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::storage("lock index", &path, e))?;
        Ok(IndexLock { _file: file })
    }

    /// Current index; an empty one is synthesized if none exists on disk yet
    pub fn index(&self) -> Result<RecordIndex, StoreError> {
        RecordIndex::load(&self.index_path())
    }

    /// Validate, check duplicates, write the record file, then index it.
    ///
    /// Assigns a fresh UUID if the record has an empty id. A supplied id must
    /// be a plain file-name token and not already indexed. Returns the stored record.
    pub fn create(&self, mut record: R) -> Result<R, StoreError> {
        if record.id().trim().is_empty() {
            record.set_id(uuid::Uuid::new_v4().to_string());
        }
        check_id::<R>(record.id())?;
        record.validate()?;

        let _lock = self.lock_index()?;
        let mut index = self.index()?;
        if index.contains(record.id()) {
            return Err(ValidationError::Duplicate {
                kind: R::KIND,
                key: format!("id {}", record.id()),
                existing_id: record.id().to_string(),
            }
            .into());
        }
        self.check_duplicate(&index, &record)?;

        self.write_record(&record)?;
        index.upsert(record.id(), self.entry_for(&record));
        index.save(&self.index_path())?;

        tracing::debug!(kind = R::KIND, id = record.id(), "created record");
        Ok(record)
    }

    /// Look up a record by id.
    ///
    /// `NotFound` both when the id is not indexed and when its file is missing.
    pub fn get(&self, id: &str) -> Result<R, StoreError> {
        let index = self.index()?;
        let entry = index.get(id).ok_or_else(|| self.not_found(id))?;
        self.read_record(id, entry)
    }

    /// Records matching `filter`, newest first.
    ///
    /// Unreadable records are logged and skipped. Entries whose file has
    /// disappeared are pruned from the index.
    pub fn list(&self, filter: &RecordFilter) -> Result<Vec<R>, StoreError> {
        let index = self.index()?;
        let mut records = Vec::new();
        let mut missing = Vec::new();

        for (id, entry) in index.matching(filter) {
            if filter.limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }
            match self.read_record(id, entry) {
                Ok(record) => records.push(record),
                Err(StoreError::NotFound { .. }) => missing.push(id.to_string()),
                Err(e) => {
                    tracing::error!(
                        kind = R::KIND,
                        id,
                        error = %e,
                        "skipping unreadable record"
                    );
                }
            }
        }

        if !missing.is_empty() {
            self.prune_missing(&missing)?;
        }

        Ok(records)
    }

    /// First record (newest first) whose name matches case-insensitively
    pub fn find_by_name(&self, name: &str) -> Result<Option<R>, StoreError> {
        let mut hits = self.list(&RecordFilter::all().name(name).limit(1))?;
        Ok(hits.pop())
    }

    /// Read-modify-write: merge `patch`, re-validate, rewrite, re-index
    pub fn update(&self, id: &str, patch: R::Patch) -> Result<R, StoreError> {
        let _lock = self.lock_index()?;
        let mut index = self.index()?;
        let entry = index.get(id).ok_or_else(|| self.not_found(id))?;
        let mut record = self.read_record(id, entry)?;

        record.apply_patch(patch);
        record.validate()?;
        self.check_duplicate(&index, &record)?;

        self.write_record(&record)?;
        index.upsert(id, self.entry_for(&record));
        index.save(&self.index_path())?;

        tracing::debug!(kind = R::KIND, id, "updated record");
        Ok(record)
    }

    /// Delete a batch of records.
    ///
    /// Every id must be indexed or nothing is removed. The index is committed
    /// once with all entries gone, then record and backup files are removed
    /// best effort. Returns the number of records deleted.
    pub fn delete<S: AsRef<str>>(&self, ids: &[S]) -> Result<usize, StoreError> {
        let _lock = self.lock_index()?;
        let mut index = self.index()?;

        if let Some(unknown) = ids.iter().find(|id| !index.contains(id.as_ref())) {
            return Err(self.not_found(unknown.as_ref()));
        }

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = index.remove(id.as_ref()) {
                removed.push(entry);
            }
        }
        index.save(&self.index_path())?;

        for entry in &removed {
            let path = self.dir.join(&entry.reference_file);
            for file in [path.clone(), atomic::backup_path_for(&path)] {
                if let Err(e) = atomic::remove_if_exists(&file) {
                    tracing::warn!(
                        kind = R::KIND,
                        path = %file.display(),
                        error = %e,
                        "failed to remove record file, leaving orphan"
                    );
                }
            }
        }

        tracing::debug!(kind = R::KIND, count = removed.len(), "deleted records");
        Ok(removed.len())
    }

    /// Delete stale `*.tmp` files left by interrupted writes.
    ///
    /// Only files older than one hour are removed and at most 1000 entries
    /// are scanned. Returns `(deleted, scanned, hit_limit)`.
    pub fn cleanup_stale_temps(&self) -> Result<(usize, usize, bool), StoreError> {
        if !self.dir.exists() {
            return Ok((0, 0, false));
        }

        let mut scanned = 0;
        let mut deleted = 0;
        let now = SystemTime::now();

        for entry in walkdir::WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if scanned >= CLEANUP_SCAN_LIMIT {
                tracing::warn!(
                    kind = R::KIND,
                    limit = CLEANUP_SCAN_LIMIT,
                    "hit cleanup scan limit"
                );
                return Ok((deleted, scanned, true));
            }

            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            scanned += 1;

            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(atomic::TEMP_SUFFIX));
            if !is_temp {
                continue;
            }

            let age = fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age > CLEANUP_AGE_THRESHOLD) {
                match fs::remove_file(path) {
                    Ok(()) => deleted += 1,
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to delete stale temp file"
                    ),
                }
            }
        }

        Ok((deleted, scanned, false))
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            kind: R::KIND,
            id: id.to_string(),
        }
    }

    fn entry_for(&self, record: &R) -> IndexEntry {
        let keys = record.index_keys();
        IndexEntry {
            name: keys.name,
            root_path: keys.root_path,
            tags: keys.tags,
            dedup_key: record.dedup_key().map(|key| hash_key(&key)),
            reference_file: Self::reference_file(record.id()),
            updated_at: record.updated_at(),
        }
    }

    fn check_duplicate(&self, index: &RecordIndex, record: &R) -> Result<(), StoreError> {
        let Some(key) = record.dedup_key() else {
            return Ok(());
        };
        match index.find_duplicate(&hash_key(&key), record.id()) {
            Some(existing) => Err(ValidationError::Duplicate {
                kind: R::KIND,
                key,
                existing_id: existing.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn write_record(&self, record: &R) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let bytes = self.encode(record)?;
        atomic::atomic_write(&self.record_path(record.id()), &bytes)
    }

    fn encode(&self, record: &R) -> Result<Vec<u8>, StoreError> {
        let json = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialize {
            kind: R::KIND,
            source: e,
        })?;

        match &self.passphrase {
            Some(passphrase) => crypto::encrypt(&json, passphrase)
                .map(String::into_bytes)
                .map_err(|e| StoreError::Crypto {
                    path: self.record_path(record.id()),
                    source: e,
                }),
            None => Ok(json),
        }
    }

    fn read_record(&self, id: &str, entry: &IndexEntry) -> Result<R, StoreError> {
        let path = self.dir.join(&entry.reference_file);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(kind = R::KIND, id, "index entry points at missing file");
                return Err(self.not_found(id));
            }
            Err(e) => return Err(StoreError::storage("read record", &path, e)),
        };

        let record = self.decode(&path, &contents)?;
        if record.id() != id {
            return Err(StoreError::Corrupt {
                path,
                message: format!("file holds record {} but index says {}", record.id(), id),
            });
        }
        Ok(record)
    }

    fn decode(&self, path: &Path, contents: &str) -> Result<R, StoreError> {
        let plaintext = if crypto::is_encrypted(contents) {
            let passphrase = self.passphrase.as_deref().ok_or_else(|| StoreError::Crypto {
                path: path.to_path_buf(),
                source: CryptoError::CryptoFailure(
                    "record is encrypted but no passphrase is configured".to_string(),
                ),
            })?;
            crypto::decrypt(contents, passphrase).map_err(|e| StoreError::Crypto {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            contents.as_bytes().to_vec()
        };

        serde_json::from_slice(&plaintext).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Drop index entries whose record file is gone (re-checked under the lock)
    fn prune_missing(&self, ids: &[String]) -> Result<(), StoreError> {
        let _lock = self.lock_index()?;
        let mut index = self.index()?;
        let mut pruned = 0;

        for id in ids {
            let gone = index
                .get(id)
                .is_some_and(|entry| !self.dir.join(&entry.reference_file).exists());
            if gone {
                index.remove(id);
                pruned += 1;
            }
        }

        if pruned > 0 {
            index.save(&self.index_path())?;
            tracing::info!(kind = R::KIND, pruned, "pruned index entries with missing files");
        }
        Ok(())
    }
}

/// Ids name the record file, so they must stay inside the kind directory
fn check_id<R: Record>(id: &str) -> Result<(), StoreError> {
    let plain = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            kind: R::KIND,
            field: "id",
            reason: format!("{:?} is not a plain file-name token", id),
        }
        .into())
    }
}

fn hash_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}
