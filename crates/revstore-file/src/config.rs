use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FileError, Result};

/// Configuration for [`LocalFile`](crate::LocalFile) engines.
///
/// Every field has a default, so a TOML file only needs the keys it wants to
/// override:
///
/// ```toml
/// flush_delay_msec = 1000
/// sync_writes = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Debounce between a change and the write-behind flush that persists it.
    pub flush_delay_msec: u64,
    /// Timeout applied to transactions that carry no `timeout` op.
    pub default_timeout_msec: u64,
    /// Lower clamp for explicit timeouts.
    pub min_timeout_msec: u64,
    /// Upper clamp for explicit timeouts.
    pub max_timeout_msec: u64,
    /// `fsync` each revision file before it is renamed into place.
    pub sync_writes: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            flush_delay_msec: 5_000,
            default_timeout_msec: 5 * 60 * 1000,
            min_timeout_msec: 1_000,
            max_timeout_msec: 5 * 60 * 1000,
            sync_writes: false,
        }
    }
}

impl FileConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| FileError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_timeout_msec > self.max_timeout_msec {
            return Err(FileError::Serialization(format!(
                "min_timeout_msec ({}) exceeds max_timeout_msec ({})",
                self.min_timeout_msec, self.max_timeout_msec
            )));
        }
        Ok(())
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_msec)
    }

    /// Resolve a transaction's requested timeout to the budget actually used.
    pub fn clamp_timeout_msec(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_timeout_msec)
            .max(self.min_timeout_msec)
            .min(self.max_timeout_msec)
    }
}
