//! Database builder for fluent configuration
//!
//! Provides a builder pattern for opening a database over a chosen substrate
//! with individual settings overridden.

use std::path::Path;
use std::sync::Arc;

use recordlayer_core::{Result, Storage};
use recordlayer_storage::MemoryStore;

use super::{Database, DatabaseConfig, RetryConfig};

// ============================================================================
// Database Builder Pattern
// ============================================================================

/// Builder for Database configuration
///
/// ```ignore
/// use recordlayer_engine::{Database, RetryConfig};
///
/// // 1. In-memory with defaults
/// let db = Database::in_memory();
///
/// // 2. Builder for custom settings
/// let db = Database::builder()
///     .retry(RetryConfig::no_retry())
///     .scan_batch_size(16)
///     .open()?;
///
/// // 3. Settings from a file, then one override
/// let db = Database::builder()
///     .config_file("recordlayer.toml")?
///     .transaction_timeout_ms(500)
///     .open()?;
/// ```
///
/// Without `.storage()`, `open()` uses a fresh in-memory store.
#[derive(Default)]
pub struct DatabaseBuilder {
    storage: Option<Arc<dyn Storage>>,
    config: DatabaseConfig,
}

impl DatabaseBuilder {
    /// Create new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `storage` as the substrate
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from `path`, writing defaults there if missing
    ///
    /// # Errors
    /// `Error::Config` if the file cannot be written, read or parsed.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        DatabaseConfig::write_default_if_missing(path)?;
        self.config = DatabaseConfig::from_file(path)?;
        Ok(self)
    }

    /// Retry policy for `Database::run`
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Commit deadline measured from begin
    pub fn transaction_timeout_ms(mut self, ms: u64) -> Self {
        self.config.transaction_timeout_ms = ms;
        self
    }

    /// Keys fetched per cursor batch
    pub fn scan_batch_size(mut self, size: usize) -> Self {
        self.config.scan_batch_size = size;
        self
    }

    /// Open the database
    ///
    /// # Errors
    /// `Error::Config` if the assembled configuration is invalid.
    pub fn open(self) -> Result<Arc<Database>> {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        Database::open(storage, self.config)
    }
}

impl std::fmt::Debug for DatabaseBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseBuilder")
            .field("custom_storage", &self.storage.is_some())
            .field("config", &self.config)
            .finish()
    }
}
