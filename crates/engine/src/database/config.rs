//! Database configuration via `recordlayer.toml`
//!
//! Every setting has a default, so an empty file (or no file at all) yields
//! a working configuration. Values are validated eagerly on load.

use std::path::Path;
use std::time::Duration;

use recordlayer_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::transactions::RetryConfig;

/// Config file name looked up by the demo binary.
pub const CONFIG_FILE_NAME: &str = "recordlayer.toml";

fn default_transaction_timeout_ms() -> u64 {
    5000
}

fn default_scan_batch_size() -> usize {
    128
}

/// Database configuration loaded from `recordlayer.toml`.
///
/// # Example
///
/// ```toml
/// transaction_timeout_ms = 5000
/// scan_batch_size = 128
///
/// [retry]
/// max_retries = 5
/// base_delay_ms = 2
/// max_delay_ms = 50
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Retry policy used by `Database::run`.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Commits attempted later than this after begin fail as too old.
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
    /// Page size used by query cursors when reading ranges.
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            transaction_timeout_ms: default_transaction_timeout_ms(),
            scan_batch_size: default_scan_batch_size(),
        }
    }
}

impl DatabaseConfig {
    /// Transaction timeout as a `Duration`
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    /// Reject values that would make the database unusable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.scan_batch_size == 0 {
            return Err(Error::config("scan_batch_size must be at least 1"));
        }
        if self.transaction_timeout_ms == 0 {
            return Err(Error::config("transaction_timeout_ms must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# recordlayer configuration
#
# Commits attempted later than this many milliseconds after the transaction
# began fail as "too old" and are retried with a fresh transaction.
transaction_timeout_ms = 5000

# Number of key-value pairs fetched per substrate read by query cursors.
scan_batch_size = 128

[retry]
# Retries after the first attempt when a commit conflicts (0 = no retries)
max_retries = 5
# Exponential backoff: base_delay_ms * 2^attempt, capped at max_delay_ms
base_delay_ms = 2
max_delay_ms = 50
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not valid TOML for this
    /// structure or a value is out of range.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DatabaseConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
