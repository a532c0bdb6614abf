//! Database configuration
//!
//! Loaded from a JSON file; every field is optional.
//!
//! ```json
//! { "sync": true, "pretty": true, "log_level": "warn" }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{DbError, DbResult};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::storage::StorageFile;

/// Options shared by every session opened with them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    /// fsync the temp file and the parent directory on every write
    #[serde(default = "default_sync")]
    pub sync: bool,

    /// Indent the JSON file
    #[serde(default = "default_pretty")]
    pub pretty: bool,

    /// trace, info, warn, error or fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_sync() -> bool {
    true
}
fn default_pretty() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            sync: default_sync(),
            pretty: default_pretty(),
            log_level: default_log_level(),
        }
    }
}

impl DbConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> DbResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DbError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: DbConfig = serde_json::from_str(&content)
            .map_err(|e| DbError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        let display = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", display.as_str())]);

        Ok(config)
    }

    pub fn validate(&self) -> DbResult<()> {
        self.severity().map(|_| ())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> DbResult<Severity> {
        self.log_level
            .parse::<Severity>()
            .map_err(|e| DbError::Config(format!("Invalid log_level: {}", e)))
    }

    /// Sets the process-wide log level from `log_level`
    pub fn apply_log_level(&self) -> DbResult<()> {
        Logger::set_min_severity(self.severity()?);
        Ok(())
    }

    /// Storage handle for `path` honoring these options
    pub(crate) fn storage_for(&self, path: &Path) -> StorageFile {
        StorageFile::new(path)
            .with_sync(self.sync)
            .with_pretty(self.pretty)
    }
}
