// Environment configuration helpers
// Handles the data directory layout and whether record writes are encrypted

use std::path::{Path, PathBuf};

use crate::store::Record;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "DEVSESSION_DATA_DIR";
/// Environment variable carrying the encryption passphrase
pub const PASSPHRASE_ENV: &str = "DEVSESSION_PASSPHRASE";
/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "DEVSESSION_LOG";

const DEFAULT_LOG_FILTER: &str = "info";

/// Configuration for store paths and settings
#[derive(Clone)]
pub struct Config {
    /// Root directory holding one subdirectory per record kind
    pub data_dir: PathBuf,
    /// Passphrase used to encrypt record files; `None` writes plaintext JSON
    pub encryption_passphrase: Option<String>,
    /// `tracing-subscriber` env-filter directive
    pub log_filter: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field("encryption_enabled", &self.encryption_enabled())
            .field("log_filter", &self.log_filter)
            .finish()
    }
}

impl Config {
    /// Create configuration using default paths
    pub fn default_paths() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            encryption_passphrase: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    /// Configuration rooted at an explicit directory (tests, embedding)
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            encryption_passphrase: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default_paths();

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        config.encryption_passphrase = std::env::var(PASSPHRASE_ENV)
            .ok()
            .filter(|p| !p.is_empty());

        if let Ok(filter) = std::env::var(LOG_ENV) {
            if !filter.trim().is_empty() {
                config.log_filter = filter;
            }
        }

        config
    }

    /// Builder-style passphrase setter
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        let passphrase = passphrase.into();
        self.encryption_passphrase = if passphrase.is_empty() {
            None
        } else {
            Some(passphrase)
        };
        self
    }

    /// Get the default data directory
    fn default_data_dir() -> PathBuf {
        // All platforms: ~/.devsession/ (or <tmp>/devsession if home unavailable)
        dirs::home_dir()
            .map(|h| h.join(".devsession"))
            .unwrap_or_else(|| std::env::temp_dir().join("devsession"))
    }

    /// Get the data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Whether record writes go through the encryption codec
    pub fn encryption_enabled(&self) -> bool {
        self.encryption_passphrase.is_some()
    }

    /// Directory for a record kind (`<data_dir>/<kind>`)
    pub fn kind_dir(&self, kind: &str) -> PathBuf {
        self.data_dir.join(kind)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.kind_dir(<crate::records::Script as Record>::KIND)
    }

    pub fn terminals_dir(&self) -> PathBuf {
        self.kind_dir(<crate::records::TerminalCollection as Record>::KIND)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.kind_dir(<crate::records::Session as Record>::KIND)
    }

    /// Ensure the data directory exists with 0700 permissions on Unix
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.data_dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(())
    }
}
