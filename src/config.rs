//! Store configuration.
//!
//! [`MemDbConfig`] carries the runtime knobs of a [`MemDb`](crate::MemDb).
//! It can be built in code, through [`MemDbBuilder`](crate::MemDbBuilder),
//! or loaded from toml:
//!
//! ```toml
//! write_timeout_ms = 500
//! watch_limit = 2048
//! track_changes = true
//! ```
//!
//! Every key is optional; missing keys take the [`Default`] values.

use memdb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default cap on channels per watch set.
pub const DEFAULT_WATCH_LIMIT: usize = 2048;

/// Runtime configuration of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemDbConfig {
    /// How long `write()` waits for the write lock; `None` waits forever
    pub write_timeout_ms: Option<u64>,

    /// Channels a watch set takes before queries fall back to the table
    /// channel
    pub watch_limit: usize,

    /// Record per-object changes in every write transaction
    pub track_changes: bool,
}

impl Default for MemDbConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: None,
            watch_limit: DEFAULT_WATCH_LIMIT,
            track_changes: false,
        }
    }
}

impl MemDbConfig {
    /// Parse and validate configuration from a toml string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MemDbConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a toml file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.watch_limit == 0 {
            return Err(Error::Config("watch_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// Write lock timeout as a [`Duration`]
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}
