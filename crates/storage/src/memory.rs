//! MemoryStore: in-memory MVCC ordered key-value substrate
//!
//! This module implements the `Storage` trait using:
//! - `BTreeMap<Vec<u8>, VersionChain>` for ordered keys with full version history
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for the committed version watermark
//!
//! # Visibility
//!
//! `apply` inserts every entry of a batch and only then publishes the new
//! version, all while holding the write lock. Snapshots read at the version
//! they captured, so a batch is either entirely visible to a snapshot or
//! not at all.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use recordlayer_core::{Error, KeyValue, Mutation, Result, SnapshotView, Storage};
use tracing::trace;

use crate::version_chain::{StoredEntry, VersionChain};

#[derive(Debug, Default)]
struct Inner {
    data: RwLock<BTreeMap<Vec<u8>, VersionChain>>,
    version: AtomicU64,
}

/// In-memory MVCC storage backend
///
/// Cloning is cheap and yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create a new empty store at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot as a concrete type
    pub fn memory_snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            version: self.inner.version.load(Ordering::Acquire),
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of keys with a live value at the current version
    pub fn live_key_count(&self) -> usize {
        let version = self.current_version();
        self.inner
            .data
            .read()
            .values()
            .filter(|chain| chain.value_at_version(version).is_some())
            .count()
    }

    /// Total number of stored versions across all keys
    pub fn total_versions(&self) -> usize {
        self.inner
            .data
            .read()
            .values()
            .map(VersionChain::version_count)
            .sum()
    }
}

fn range_bounds<'a>(begin: &'a [u8], end: &'a [u8]) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
    (Bound::Included(begin), Bound::Excluded(end))
}

impl Storage for MemoryStore {
    fn snapshot(&self) -> Box<dyn SnapshotView> {
        Box::new(self.memory_snapshot())
    }

    fn current_version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    fn last_write_version(&self, key: &[u8]) -> Result<u64> {
        Ok(self
            .inner
            .data
            .read()
            .get(key)
            .and_then(VersionChain::latest)
            .map_or(0, |e| e.version))
    }

    fn first_write_in_range_after(
        &self,
        begin: &[u8],
        end: &[u8],
        after_version: u64,
    ) -> Result<Option<(Vec<u8>, u64)>> {
        if begin >= end {
            return Ok(None);
        }
        let data = self.inner.data.read();
        Ok(data
            .range::<[u8], _>(range_bounds(begin, end))
            .find_map(|(key, chain)| {
                chain
                    .latest()
                    .filter(|e| e.version > after_version)
                    .map(|e| (key.clone(), e.version))
            }))
    }

    fn apply(&self, mutations: &[Mutation], version: u64) -> Result<()> {
        let mut data = self.inner.data.write();
        let current = self.inner.version.load(Ordering::Acquire);
        if version <= current {
            return Err(Error::storage(format!(
                "commit version {} is not newer than current version {}",
                version, current
            )));
        }

        // A key touched twice in one batch keeps only its last mutation.
        let mut last: BTreeMap<&[u8], &Mutation> = BTreeMap::new();
        for mutation in mutations {
            last.insert(mutation.key(), mutation);
        }

        for mutation in last.into_values() {
            let entry = match mutation {
                Mutation::Set { value, .. } => StoredEntry {
                    version,
                    value: Some(value.clone()),
                },
                Mutation::Clear { .. } => StoredEntry {
                    version,
                    value: None,
                },
            };
            match data.get_mut(mutation.key()) {
                Some(chain) => chain.push(entry),
                None => {
                    // A clear of a never-written key still records a tombstone
                    // so range conflict checks see it.
                    data.insert(mutation.key().to_vec(), VersionChain::new(entry));
                }
            }
        }

        self.inner.version.store(version, Ordering::Release);
        trace!(version, mutations = mutations.len(), "applied batch");
        Ok(())
    }
}

// ============================================================================
// MemorySnapshot
// ============================================================================

/// Read view of a `MemoryStore` at a fixed version
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    version: u64,
    inner: Arc<Inner>,
}

impl SnapshotView for MemorySnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .inner
            .data
            .read()
            .get(key)
            .and_then(|chain| chain.value_at_version(self.version))
            .cloned())
    }

    fn get_range(&self, begin: &[u8], end: &[u8], limit: Option<usize>) -> Result<Vec<KeyValue>> {
        if begin >= end {
            return Ok(Vec::new());
        }
        let data = self.inner.data.read();
        let visible = data
            .range::<[u8], _>(range_bounds(begin, end))
            .filter_map(|(key, chain)| {
                chain
                    .value_at_version(self.version)
                    .map(|value| (key.clone(), value.clone()))
            });
        Ok(match limit {
            Some(n) => visible.take(n).collect(),
            None => visible.collect(),
        })
    }

    fn version(&self) -> u64 {
        self.version
    }
}
