//! Atomic write protocol used for every record file and index file
//!
//! 1. serialize (and optionally encrypt) to bytes (caller)
//! 2. write bytes to `<target>.tmp` and fsync
//! 3. copy an existing `<target>` to `<target>.bak` (best effort)
//! 4. rename `<target>.tmp` over `<target>`
//!
//! Steps 1-2 are [`stage`], steps 3-4 are [`StagedWrite::commit`].

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Suffix of the staged temp file
pub const TEMP_SUFFIX: &str = ".tmp";
/// Suffix of the pre-write backup copy
pub const BACKUP_SUFFIX: &str = ".bak";

/// `<target>.tmp`
pub fn temp_path_for(target: &Path) -> PathBuf {
    with_suffix(target, TEMP_SUFFIX)
}

/// `<target>.bak`
pub fn backup_path_for(target: &Path) -> PathBuf {
    with_suffix(target, BACKUP_SUFFIX)
}

fn with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// A temp file that has been fully written but not yet renamed into place.
///
/// Dropping it without calling [`commit`](Self::commit) leaves the target
/// untouched and the temp file on disk, the same state a crash would leave.
#[derive(Debug)]
#[must_use = "a staged write does nothing until committed"]
pub struct StagedWrite {
    target: PathBuf,
    temp: PathBuf,
}

/// Write `contents` to `<target>.tmp` with 0600 permissions and fsync it
pub fn stage(target: &Path, contents: &[u8]) -> Result<StagedWrite, StoreError> {
    let temp = temp_path_for(target);

    let mut file =
        fs::File::create(&temp).map_err(|e| StoreError::storage("create temp file", &temp, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| StoreError::storage("set temp permissions", &temp, e))?;
    }

    file.write_all(contents)
        .map_err(|e| StoreError::storage("write temp file", &temp, e))?;
    file.sync_all()
        .map_err(|e| StoreError::storage("fsync temp file", &temp, e))?;

    Ok(StagedWrite {
        target: target.to_path_buf(),
        temp,
    })
}

impl StagedWrite {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Back up the current target (best effort) and rename the temp file over it
    pub fn commit(self) -> Result<(), StoreError> {
        if self.target.exists() {
            let backup = backup_path_for(&self.target);
            if let Err(e) = fs::copy(&self.target, &backup) {
                tracing::warn!(
                    path = %self.target.display(),
                    error = %e,
                    "failed to back up file before overwrite, continuing"
                );
            }
        }

        fs::rename(&self.temp, &self.target)
            .map_err(|e| StoreError::storage("rename temp file", &self.target, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Ensure final file has correct permissions (in case rename didn't preserve)
            fs::set_permissions(&self.target, fs::Permissions::from_mode(0o600))
                .map_err(|e| StoreError::storage("set file permissions", &self.target, e))?;
        }

        Ok(())
    }
}

/// Run the whole protocol for `target`
pub fn atomic_write(target: &Path, contents: &[u8]) -> Result<(), StoreError> {
    stage(target, contents)?.commit()
}

/// Remove a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
