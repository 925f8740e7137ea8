//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating:
//! 1. Timeout check
//! 2. Validation (first-committer-wins)
//! 3. Storage application (visibility)
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. is_expired()          - too old? abort with TooOld (retryable)
//! 2. acquire commit lock   - serializes validate + apply
//! 3. txn.commit(store)     - Active → Validating → Committed | Aborted
//! 4. commit_version = current_version + 1
//! 5. store.apply(mutations, commit_version) - all keys, one version
//! 6. release lock, return Ok(commit_version)
//! ```
//!
//! Holding the lock across validation and apply closes the window in which
//! two transactions could both validate against the same state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use recordlayer_core::{Result, Storage};
use tracing::{debug, error};

use crate::{CommitError, TransactionContext, TransactionStatus};

/// Manages transaction lifecycle and atomic commits
///
/// The global version lives in the substrate; the manager only allocates
/// transaction IDs and serializes commits.
#[derive(Debug)]
pub struct TransactionManager {
    next_txn_id: AtomicU64,
    commit_lock: Mutex<()>,
    timeout: Option<Duration>,
}

impl TransactionManager {
    /// Create a manager without a transaction timeout
    pub fn new() -> Self {
        TransactionManager {
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
            timeout: None,
        }
    }

    /// Create a manager that rejects commits older than `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        TransactionManager {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    /// Configured transaction timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Begin a transaction reading from the current snapshot of `store`
    pub fn begin<S: Storage + ?Sized>(&self, store: &S) -> TransactionContext {
        TransactionContext::with_snapshot(self.next_txn_id(), store.snapshot())
    }

    /// Commit a transaction atomically
    ///
    /// # Returns
    /// - Ok(commit_version) on success; read-only transactions return the
    ///   current version without writing
    /// - Err(CommitError) if the transaction is too old, conflicts, is not
    ///   active, or the substrate fails. Nothing is applied in every error case.
    pub fn commit<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> std::result::Result<u64, CommitError> {
        if let Some(timeout) = self.timeout {
            if txn.is_active() && txn.is_expired(timeout) {
                let elapsed = txn.elapsed();
                txn.status = TransactionStatus::Aborted {
                    reason: format!("transaction too old: {:?} elapsed", elapsed),
                };
                return Err(CommitError::TooOld {
                    txn_id: txn.txn_id,
                    elapsed,
                });
            }
        }

        let _guard = self.commit_lock.lock();

        txn.commit(store)?;

        if txn.is_read_only() {
            return Ok(store.current_version());
        }

        let commit_version = store.current_version() + 1;
        let mutations = txn.to_mutations();
        if let Err(e) = store.apply(&mutations, commit_version) {
            error!(
                txn_id = txn.txn_id,
                commit_version,
                error = %e,
                "Storage application failed, transaction discarded"
            );
            txn.status = TransactionStatus::Aborted {
                reason: format!("apply failed: {}", e),
            };
            return Err(CommitError::Storage(e.to_string()));
        }

        debug!(
            txn_id = txn.txn_id,
            commit_version,
            mutations = mutations.len(),
            "committed"
        );
        Ok(commit_version)
    }

    /// Explicitly abort a transaction
    ///
    /// All buffered operations are discarded and the transaction is marked
    /// as Aborted.
    pub fn abort(&self, txn: &mut TransactionContext, reason: String) -> Result<()> {
        txn.mark_aborted(reason)
    }

    /// Commit with automatic rollback on failure
    ///
    /// Ensures transaction is properly cleaned up if commit fails.
    pub fn commit_or_rollback<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> std::result::Result<u64, CommitError> {
        match self.commit(txn, store) {
            Ok(version) => Ok(version),
            Err(e) => {
                if txn.can_rollback() {
                    let _ = txn.mark_aborted(format!("Commit failed: {}", e));
                }
                Err(e)
            }
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
