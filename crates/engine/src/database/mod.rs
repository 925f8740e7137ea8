//! Database struct and the transaction API
//!
//! This module provides the main Database struct that ties together:
//! - the ordered key-value substrate (any `Storage`)
//! - the transaction manager (snapshots, validation, commit ordering)
//! - configuration (retry policy, timeout, scan batch size)
//!
//! ## Transaction API
//!
//! The Database provides three ways to execute transactions:
//!
//! 1. **Retrying closure API** (recommended): `db.run(|txn| { ... })`
//!    - Commit on success, abort on error
//!    - Conflicts and expired transactions re-run the closure from scratch
//!      with a fresh transaction, up to the configured retry budget
//!
//! 2. **Single-attempt closure API**: `db.transaction(|txn| { ... })`
//!    - Same commit/abort handling, no retry
//!
//! 3. **Manual API**: `begin_transaction()` + `commit_transaction()`
//!    - For cases requiring external control over commit timing
//!
//! Dropping a `TransactionContext` without committing discards its writes.

mod builder;
pub mod config;
mod transactions;

pub use builder::DatabaseBuilder;
pub use config::{DatabaseConfig, CONFIG_FILE_NAME};
pub use transactions::RetryConfig;

use std::path::Path;
use std::sync::Arc;

use recordlayer_concurrency::{TransactionContext, TransactionManager};
use recordlayer_core::{Error, Result, Storage, Subspace};
use recordlayer_storage::MemoryStore;
use tracing::{debug, error, info, warn};

use crate::metadata::RecordMetaData;
use crate::store::RecordStore;

/// Shared handle to a transactional key-value substrate
///
/// `Database` is `Send + Sync`; share it with `Arc` and run any number of
/// transactions from any number of threads. Each `TransactionContext` is
/// owned by the unit of work that began it.
pub struct Database {
    storage: Arc<dyn Storage>,
    manager: TransactionManager,
    config: DatabaseConfig,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("current_version", &self.storage.current_version())
            .field("config", &self.config)
            .finish()
    }
}

impl Database {
    /// Open a database over `storage` with `config`
    ///
    /// # Errors
    /// `Error::Config` if the configuration is invalid.
    pub fn open(storage: Arc<dyn Storage>, config: DatabaseConfig) -> Result<Arc<Self>> {
        config.validate()?;
        info!(
            version = storage.current_version(),
            max_retries = config.retry.max_retries,
            transaction_timeout_ms = config.transaction_timeout_ms,
            scan_batch_size = config.scan_batch_size,
            "Opened database"
        );
        Ok(Arc::new(Self {
            manager: TransactionManager::with_timeout(config.transaction_timeout()),
            storage,
            config,
        }))
    }

    /// Fluent builder for less common configurations
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Fresh in-memory database with default configuration
    pub fn in_memory() -> Arc<Self> {
        let config = DatabaseConfig::default();
        Arc::new(Self {
            manager: TransactionManager::with_timeout(config.transaction_timeout()),
            storage: Arc::new(MemoryStore::new()),
            config,
        })
    }

    /// Fresh in-memory database with `config`
    ///
    /// # Errors
    /// `Error::Config` if the configuration is invalid.
    pub fn in_memory_with_config(config: DatabaseConfig) -> Result<Arc<Self>> {
        Self::open(Arc::new(MemoryStore::new()), config)
    }

    /// Fresh in-memory database configured from the file at `path`
    ///
    /// A default config file is written first if none exists.
    ///
    /// # Errors
    /// `Error::Config` if the file cannot be written, read or parsed, or
    /// holds invalid values.
    pub fn in_memory_from_config_file(path: &Path) -> Result<Arc<Self>> {
        DatabaseConfig::write_default_if_missing(path)?;
        Self::in_memory_with_config(DatabaseConfig::from_file(path)?)
    }

    /// Active configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Underlying substrate
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Highest committed version
    pub fn current_version(&self) -> u64 {
        self.storage.current_version()
    }

    /// Record store over `root`, paging cursors by the configured batch size
    pub fn open_record_store(&self, metadata: Arc<RecordMetaData>, root: Subspace) -> RecordStore {
        RecordStore::new(metadata, root).with_scan_batch_size(self.config.scan_batch_size)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Execute one transaction attempt: commit on success, abort on error.
    ///
    /// Returns `(closure_result, commit_version)` on success.
    fn run_single_attempt<T>(
        &self,
        txn: &mut TransactionContext,
        result: Result<T>,
    ) -> Result<(T, u64)> {
        match result {
            Ok(value) => {
                let commit_version = self.commit_transaction(txn)?;
                Ok((value, commit_version))
            }
            Err(e) => {
                if txn.can_rollback() {
                    let _ = txn.mark_aborted(format!("Closure error: {}", e));
                }
                Err(e)
            }
        }
    }

    /// Execute a transaction with the given closure, once
    ///
    /// # Returns
    /// * `Ok(T)` - Closure return value on successful commit
    /// * `Err` - On conflict (not retried) or closure error
    ///
    /// # Example
    /// ```ignore
    /// let previous = db.transaction(|txn| store.save_record(txn, order.clone()))?;
    /// ```
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TransactionContext) -> Result<T>,
    {
        self.transaction_with_version(f).map(|(value, _)| value)
    }

    /// Like `transaction()` but also returns the commit version
    ///
    /// Read-only transactions report the version they read at.
    pub fn transaction_with_version<F, T>(&self, f: F) -> Result<(T, u64)>
    where
        F: FnOnce(&mut TransactionContext) -> Result<T>,
    {
        let mut txn = self.begin_transaction();
        let result = f(&mut txn);
        self.run_single_attempt(&mut txn, result)
    }

    /// Execute a unit of work with the configured retry policy
    ///
    /// See [`Database::run_with_retry`].
    pub fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnMut(&mut TransactionContext) -> Result<T>,
    {
        self.run_with_retry(&self.config.retry, f)
    }

    /// Execute a unit of work, retrying it from scratch on retryable errors
    ///
    /// The closure is called with a fresh transaction until either:
    /// - The transaction commits successfully
    /// - A non-retryable error occurs (returned as is)
    /// - The retry budget is spent (`Error::TransactionFailed` carrying the
    ///   last error)
    ///
    /// The closure must not have side effects outside the transaction.
    pub fn run_with_retry<F, T>(&self, config: &RetryConfig, mut f: F) -> Result<T>
    where
        F: FnMut(&mut TransactionContext) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            let mut txn = self.begin_transaction();
            let result = f(&mut txn);
            match self.run_single_attempt(&mut txn, result) {
                Ok((value, _)) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    let delay = config.calculate_delay(attempt);
                    warn!(
                        txn_id = txn.txn_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying transaction"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    error!(
                        txn_id = txn.txn_id,
                        attempts = attempt + 1,
                        error = %e,
                        "Transaction failed, retries exhausted"
                    );
                    return Err(Error::TransactionFailed {
                        attempts: attempt + 1,
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Begin a new transaction (for manual control)
    ///
    /// The transaction reads from the current committed snapshot. Commit it
    /// with `commit_transaction()`; dropping it discards its writes.
    pub fn begin_transaction(&self) -> TransactionContext {
        let txn = self.manager.begin(self.storage.as_ref());
        debug!(txn_id = txn.txn_id, start_version = txn.start_version, "Began transaction");
        txn
    }

    /// Commit a transaction
    ///
    /// # Returns
    /// * `Ok(commit_version)` - version assigned to all writes (the read
    ///   version for read-only transactions)
    ///
    /// # Errors
    /// - `Error::Conflict` - a key or range it read changed since its snapshot
    /// - `Error::TransactionTooOld` - the transaction outlived its timeout
    /// - `Error::TransactionNotActive` - already committed or aborted
    pub fn commit_transaction(&self, txn: &mut TransactionContext) -> Result<u64> {
        self.manager
            .commit_or_rollback(txn, self.storage.as_ref())
            .map_err(Error::from)
    }

    /// Abort a transaction, discarding its writes
    pub fn abort_transaction(&self, txn: &mut TransactionContext, reason: &str) -> Result<()> {
        self.manager.abort(txn, reason.to_string())
    }
}
