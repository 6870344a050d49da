//! Server configuration loaded from TOML.
//!
//! ```toml
//! [validator]
//! max_simultaneous = 2
//! log_threshold = 1000000
//! poll_interval_ms = 1000
//!
//! [mail]
//! admin = "admin@example.org"
//!
//! [storage]
//! root = "data"
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use subval_ingest::DEFAULT_LOG_THRESHOLD;
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_MAX_SIMULTANEOUS: usize = 1;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub validator: ValidatorConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Cap on validations running at the same time.
    pub max_simultaneous: usize,
    /// Rows between progress log lines.
    pub log_threshold: u64,
    pub poll_interval_ms: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_simultaneous: DEFAULT_MAX_SIMULTANEOUS,
            log_threshold: DEFAULT_LOG_THRESHOLD,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ValidatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    /// Receives a copy of every ERROR resolution.
    pub admin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
        }
    }
}

impl ServerConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ServerConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validator.max_simultaneous == 0 {
            return Err(ConfigError::Invalid(
                "validator.max_simultaneous must be at least 1".to_string(),
            ));
        }
        if self.validator.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "validator.poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.validator.log_threshold == 0 {
            return Err(ConfigError::Invalid(
                "validator.log_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
