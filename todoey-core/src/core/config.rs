//! Store configuration.
//!
//! Read from a JSON file next to the application's other preferences. Every
//! field has a default, so an empty object (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{PurgeStrategy, Result};

/// Tunables for an opened [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// How long a connection waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
    /// Maximum number of idle reader connections kept for reuse.
    pub reader_pool_size: usize,
    /// Commit journal retention.
    pub journal: JournalConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            reader_pool_size: 4,
            journal: JournalConfig::default(),
        }
    }
}

/// Retention settings for the commit journal.
///
/// `retention_days` wins over `keep_last` when both are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JournalConfig {
    pub keep_last: Option<usize>,
    pub retention_days: Option<u32>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            keep_last: Some(1_000),
            retention_days: None,
        }
    }
}

impl JournalConfig {
    /// Returns the purge strategy these settings describe, or `None` to keep everything.
    #[must_use]
    pub fn purge_strategy(&self) -> Option<PurgeStrategy> {
        match (self.retention_days, self.keep_last) {
            (Some(days), _) => Some(PurgeStrategy::RetainDays(days)),
            (None, Some(n)) => Some(PurgeStrategy::KeepLast(n)),
            (None, None) => None,
        }
    }
}

impl StoreConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TodoeyError::Json`] if `json` is not a valid config object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads settings from `path`; returns defaults if the file is missing or corrupt.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable store config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Writes the configuration to `path` as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TodoeyError::Io`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
