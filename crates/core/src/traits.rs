//! Substrate traits
//!
//! This module defines the narrow interface to the ordered key-value
//! substrate. Everything above it (transactions, record stores, queries)
//! talks only to these traits, so the substrate can be swapped without
//! touching upper layers.
//!
//! The substrate provides:
//! - point-in-time snapshots (`SnapshotView`) for reads
//! - per-key and per-range write versions for commit-time conflict checks
//! - atomic application of a batch of mutations under one commit version

use crate::error::Result;

/// A key-value pair as returned by range reads
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// A single buffered write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Set `key` to `value`
    Set {
        /// Target key
        key: Vec<u8>,
        /// New value
        value: Vec<u8>,
    },
    /// Remove `key`
    Clear {
        /// Target key
        key: Vec<u8>,
    },
}

impl Mutation {
    /// Key this mutation targets
    pub fn key(&self) -> &[u8] {
        match self {
            Mutation::Set { key, .. } | Mutation::Clear { key } => key,
        }
    }
}

/// Storage abstraction for the ordered key-value substrate
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait Storage: Send + Sync {
    /// Consistent read view as of the current committed version
    fn snapshot(&self) -> Box<dyn SnapshotView>;

    /// Highest committed version
    fn current_version(&self) -> u64;

    /// Version of the latest committed set or clear of `key`
    ///
    /// Returns 0 if the key was never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn last_write_version(&self, key: &[u8]) -> Result<u64>;

    /// First key in `[begin, end)` written after `after_version`
    ///
    /// Returns the key together with its latest write version. Clears count
    /// as writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn first_write_in_range_after(
        &self,
        begin: &[u8],
        end: &[u8],
        after_version: u64,
    ) -> Result<Option<(Vec<u8>, u64)>>;

    /// Apply all mutations atomically under `version`
    ///
    /// Readers observe either none or all of the batch. `version` must be
    /// greater than `current_version()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails; nothing is applied.
    fn apply(&self, mutations: &[Mutation], version: u64) -> Result<()>;
}

/// Snapshot view abstraction for snapshot isolation
///
/// Provides a version-bounded read view of storage: writes committed after
/// the snapshot's version are invisible.
pub trait SnapshotView: Send + Sync {
    /// Value of `key` as of the snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Pairs in `[begin, end)` in ascending key order, at most `limit` of them
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_range(&self, begin: &[u8], end: &[u8], limit: Option<usize>) -> Result<Vec<KeyValue>>;

    /// Version this snapshot reads at
    fn version(&self) -> u64;
}
