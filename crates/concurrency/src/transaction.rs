//! Transaction context for OCC
//!
//! This module implements the core transaction data structure for optimistic
//! concurrency control. TransactionContext tracks all point reads, range
//! reads, writes and clears for a transaction, enabling validation at commit
//! time.
//!
//! Writes are buffered in the context and never touch the substrate until the
//! `TransactionManager` commits them. Dropping a context without committing
//! discards everything it buffered.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

use recordlayer_core::{Error, KeyValue, Mutation, Result, SnapshotView, Storage};
use rustc_hash::FxHashSet;

use crate::validation::{validate_transaction, ValidationResult};

/// Error type for commit failures
#[derive(Debug, Clone)]
pub enum CommitError {
    /// Transaction aborted due to validation conflicts
    ValidationFailed(ValidationResult),

    /// Transaction was not in correct state for commit
    InvalidState(String),

    /// Transaction outlived the configured timeout
    TooOld {
        /// Transaction identifier
        txn_id: u64,
        /// Time since begin
        elapsed: Duration,
    },

    /// Substrate failed during validation or apply
    Storage(String),
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::ValidationFailed(result) => {
                write!(f, "Commit failed: {} conflict(s)", result.conflict_count())
            }
            CommitError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            CommitError::TooOld { txn_id, elapsed } => {
                write!(f, "Transaction {} too old: {:?} elapsed", txn_id, elapsed)
            }
            CommitError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => {
                let reason = match result.conflicts.first() {
                    Some(first) if result.conflict_count() > 1 => {
                        format!("{} (+{} more)", first, result.conflict_count() - 1)
                    }
                    Some(first) => first.to_string(),
                    None => "validation failed".to_string(),
                };
                Error::Conflict { reason }
            }
            CommitError::InvalidState(state) => Error::TransactionNotActive { state },
            CommitError::TooOld { txn_id, elapsed } => Error::TransactionTooOld {
                txn_id,
                elapsed_ms: elapsed.as_millis().min(u64::MAX as u128) as u64,
            },
            CommitError::Storage(msg) => Error::Storage(msg),
        }
    }
}

/// Summary of pending operations that would be rolled back on abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperations {
    /// Number of pending set operations
    pub sets: usize,
    /// Number of pending clear operations
    pub clears: usize,
}

impl PendingOperations {
    /// Total number of pending operations
    pub fn total(&self) -> usize {
        self.sets + self.clears
    }

    /// Check if there are no pending operations
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (user abort or error)
///
/// Terminal states (no transitions allowed):
/// - `Committed`
/// - `Aborted`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// A half-open key range `[begin, end)` read by the transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRange {
    /// Inclusive start
    pub begin: Vec<u8>,
    /// Exclusive end
    pub end: Vec<u8>,
}

/// Transaction context for OCC
///
/// # Lifecycle
///
/// 1. **BEGIN**: Created by `TransactionManager::begin`, status is `Active`
/// 2. **READ/WRITE**: Use `get()`, `get_range()`, `set()`, `clear()`
/// 3. **VALIDATE**: `commit()` moves through `Validating`
/// 4. **COMMIT/ABORT**: ends in `Committed` or `Aborted`
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,

    /// Version at transaction start (snapshot version)
    ///
    /// All reads see data as of this version. Used for conflict detection.
    pub start_version: u64,

    snapshot: Box<dyn SnapshotView>,

    /// Keys read from the snapshot
    ///
    /// At commit time, any of these written after `start_version` is a
    /// read-write conflict. Reads served from our own writes are not tracked.
    read_set: FxHashSet<Vec<u8>>,

    /// Ranges scanned from the snapshot (phantom protection)
    read_ranges: Vec<ReadRange>,

    /// Buffered writes, ordered for range merging
    write_set: BTreeMap<Vec<u8>, Vec<u8>>,

    /// Buffered clears
    delete_set: BTreeSet<Vec<u8>>,

    /// Current transaction status
    pub status: TransactionStatus,

    start_time: Instant,
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("start_version", &self.start_version)
            .field("status", &self.status)
            .field("reads", &self.read_set.len())
            .field("read_ranges", &self.read_ranges.len())
            .field("pending", &self.pending_operations())
            .finish()
    }
}

impl TransactionContext {
    /// Create a new transaction context reading from `snapshot`
    pub fn with_snapshot(txn_id: u64, snapshot: Box<dyn SnapshotView>) -> Self {
        let start_version = snapshot.version();
        TransactionContext {
            txn_id,
            start_version,
            snapshot,
            read_set: FxHashSet::default(),
            read_ranges: Vec::new(),
            write_set: BTreeMap::new(),
            delete_set: BTreeSet::new(),
            status: TransactionStatus::Active,
            start_time: Instant::now(),
        }
    }

    // === Read Operations ===

    /// Get a value from the transaction
    ///
    /// Implements read-your-writes semantics:
    /// 1. Check write_set (uncommitted writes from this txn) - NO read_set entry
    /// 2. Check delete_set (uncommitted clears from this txn) - NO read_set entry
    /// 3. Read from snapshot - tracks in read_set
    ///
    /// A key that does not exist in the snapshot is still tracked: if someone
    /// creates it before we commit, we have a conflict.
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if the transaction is not active, or a
    /// substrate error.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_active()?;

        if let Some(value) = self.write_set.get(key) {
            return Ok(Some(value.clone()));
        }
        if self.delete_set.contains(key) {
            return Ok(None);
        }

        let value = self.snapshot.get(key)?;
        self.read_set.insert(key.to_vec());
        Ok(value)
    }

    /// Read `[begin, end)` in ascending key order, at most `limit` pairs
    ///
    /// Merges the snapshot with this transaction's own writes and clears.
    /// The scanned range is recorded for phantom detection; when the result
    /// is cut short by `limit`, only the part actually covered is recorded.
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if the transaction is not active, or a
    /// substrate error.
    pub fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        limit: Option<usize>,
    ) -> Result<Vec<KeyValue>> {
        self.ensure_active()?;
        if begin >= end || limit == Some(0) {
            return Ok(Vec::new());
        }

        // Buffered clears can hide snapshot keys, so over-fetch by that many.
        let cleared_in_range = self
            .delete_set
            .range::<[u8], _>((
                std::ops::Bound::Included(begin),
                std::ops::Bound::Excluded(end),
            ))
            .count();
        let fetch_limit = limit.map(|n| n.saturating_add(cleared_in_range));
        let from_snapshot = self.snapshot.get_range(begin, end, fetch_limit)?;

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = from_snapshot
            .into_iter()
            .filter(|(k, _)| !self.delete_set.contains(k))
            .collect();
        for (k, v) in self.write_set.range::<[u8], _>((
            std::ops::Bound::Included(begin),
            std::ops::Bound::Excluded(end),
        )) {
            merged.insert(k.clone(), v.clone());
        }

        let mut results: Vec<KeyValue> = merged.into_iter().collect();
        let covered_end = match limit {
            Some(n) if results.len() >= n => {
                results.truncate(n);
                // Everything up to and including the last returned key.
                let mut after_last = results[n - 1].0.clone();
                after_last.push(0x00);
                after_last
            }
            _ => end.to_vec(),
        };
        self.read_ranges.push(ReadRange {
            begin: begin.to_vec(),
            end: covered_end,
        });
        Ok(results)
    }

    // === Write Operations ===

    /// Buffer a write operation
    ///
    /// Writes are "blind" - no read_set entry unless you explicitly read first.
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if the transaction is not active.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ensure_active()?;
        self.delete_set.remove(&key);
        self.write_set.insert(key, value);
        Ok(())
    }

    /// Buffer a clear operation
    ///
    /// Clearing an absent key is allowed; it still becomes a tombstone at
    /// commit.
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if the transaction is not active.
    pub fn clear(&mut self, key: &[u8]) -> Result<()> {
        self.ensure_active()?;
        self.write_set.remove(key);
        self.delete_set.insert(key.to_vec());
        Ok(())
    }

    /// Buffer clears for every key in `[begin, end)` visible to this transaction
    ///
    /// The snapshot scan here is not recorded as a read range.
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if the transaction is not active, or a
    /// substrate error.
    pub fn clear_range(&mut self, begin: &[u8], end: &[u8]) -> Result<usize> {
        self.ensure_active()?;
        if begin >= end {
            return Ok(0);
        }
        let buffered: Vec<Vec<u8>> = self
            .write_set
            .range::<[u8], _>((
                std::ops::Bound::Included(begin),
                std::ops::Bound::Excluded(end),
            ))
            .map(|(k, _)| k.clone())
            .collect();
        let mut cleared = 0;
        for key in buffered {
            self.write_set.remove(&key);
            self.delete_set.insert(key);
            cleared += 1;
        }
        for (key, _) in self.snapshot.get_range(begin, end, None)? {
            if self.delete_set.insert(key) {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    // === State Management ===

    /// Check if transaction is in Active state
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if transaction is committed
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// Check if transaction is aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Check if transaction can be rolled back
    ///
    /// A transaction can be rolled back if it's in Active or Validating state.
    pub fn can_rollback(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Active | TransactionStatus::Validating
        )
    }

    /// Check if this transaction has exceeded the given timeout
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.start_time.elapsed() > timeout
    }

    /// Get the elapsed time since transaction started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Check if transaction can accept operations
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if not in `Active` state.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::TransactionNotActive {
                state: format!("transaction {} is {:?}", self.txn_id, self.status),
            })
        }
    }

    /// Transition to Validating state
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if not in `Active` state.
    pub fn mark_validating(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.status = TransactionStatus::Validating;
        Ok(())
    }

    /// Transition to Committed state
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if not in `Validating` state.
    pub fn mark_committed(&mut self) -> Result<()> {
        match &self.status {
            TransactionStatus::Validating => {
                self.status = TransactionStatus::Committed;
                Ok(())
            }
            _ => Err(Error::TransactionNotActive {
                state: format!(
                    "cannot commit transaction {} from state {:?}",
                    self.txn_id, self.status
                ),
            }),
        }
    }

    /// Abort the transaction and discard all buffered operations
    ///
    /// Can be called from `Active` (user abort) or `Validating` (conflict
    /// detected). The read set is kept for diagnostics.
    ///
    /// # Errors
    /// `Error::TransactionNotActive` if already `Committed` or `Aborted`.
    pub fn mark_aborted(&mut self, reason: String) -> Result<()> {
        match &self.status {
            TransactionStatus::Committed => Err(Error::TransactionNotActive {
                state: format!("cannot abort committed transaction {}", self.txn_id),
            }),
            TransactionStatus::Aborted { .. } => Err(Error::TransactionNotActive {
                state: format!("transaction {} already aborted", self.txn_id),
            }),
            _ => {
                self.status = TransactionStatus::Aborted { reason };
                self.write_set.clear();
                self.delete_set.clear();
                Ok(())
            }
        }
    }

    /// Get summary of pending operations
    pub fn pending_operations(&self) -> PendingOperations {
        PendingOperations {
            sets: self.write_set.len(),
            clears: self.delete_set.len(),
        }
    }

    // === Commit Operation ===

    /// Validate against `store` and move to `Committed` or `Aborted`
    ///
    /// This performs validation and state transitions only; the
    /// `TransactionManager` applies the writes under its commit lock.
    pub fn commit<S: Storage + ?Sized>(&mut self, store: &S) -> std::result::Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!(
                "Cannot commit transaction {} from {:?} state - must be Active",
                self.txn_id, self.status
            )));
        }
        self.status = TransactionStatus::Validating;

        // Snapshot reads cannot be invalidated for a transaction that writes
        // nothing.
        if self.is_read_only() {
            self.status = TransactionStatus::Committed;
            return Ok(());
        }

        let validation_result = match validate_transaction(self, store) {
            Ok(result) => result,
            Err(e) => {
                self.status = TransactionStatus::Aborted {
                    reason: format!("validation failed: {}", e),
                };
                return Err(CommitError::Storage(e.to_string()));
            }
        };

        if !validation_result.is_valid() {
            self.status = TransactionStatus::Aborted {
                reason: format!(
                    "Commit failed: {} conflict(s) detected",
                    validation_result.conflict_count()
                ),
            };
            return Err(CommitError::ValidationFailed(validation_result));
        }

        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Buffered operations as substrate mutations, in key order
    pub fn to_mutations(&self) -> Vec<Mutation> {
        let mut mutations: Vec<Mutation> = self
            .write_set
            .iter()
            .map(|(key, value)| Mutation::Set {
                key: key.clone(),
                value: value.clone(),
            })
            .chain(
                self.delete_set
                    .iter()
                    .map(|key| Mutation::Clear { key: key.clone() }),
            )
            .collect();
        mutations.sort_by(|a, b| a.key().cmp(b.key()));
        mutations
    }

    // === Introspection ===

    /// Keys read from the snapshot
    pub fn read_set(&self) -> impl Iterator<Item = &[u8]> {
        self.read_set.iter().map(Vec::as_slice)
    }

    /// Ranges read from the snapshot
    pub fn read_ranges(&self) -> &[ReadRange] {
        &self.read_ranges
    }

    /// Number of point reads tracked
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of buffered sets
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Number of buffered clears
    pub fn delete_count(&self) -> usize {
        self.delete_set.len()
    }

    /// True if there are buffered writes or clears
    pub fn has_pending_operations(&self) -> bool {
        !self.pending_operations().is_empty()
    }

    /// True if the transaction buffered nothing
    pub fn is_read_only(&self) -> bool {
        !self.has_pending_operations()
    }

    /// Reason recorded when the transaction aborted
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.status {
            TransactionStatus::Aborted { reason } => Some(reason),
            _ => None,
        }
    }
}
