//! Per-key version chains for MVCC
//!
//! Each key keeps every committed write, newest first. A write is either a
//! value or a tombstone (clear), and carries the commit version that produced
//! it. Snapshot reads pick the newest entry at or below their version.

use std::collections::VecDeque;

/// One committed write of a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Commit version that produced this entry
    pub version: u64,
    /// Value, or `None` for a tombstone
    pub value: Option<Vec<u8>>,
}

/// Version chain for MVCC - stores multiple versions of a value
///
/// Versions are stored in descending order (newest first) for efficient
/// snapshot reads - we typically want the most recent version <= snapshot_version.
#[derive(Debug, Clone, Default)]
pub struct VersionChain {
    versions: VecDeque<StoredEntry>,
}

impl VersionChain {
    /// Create a new version chain with a single entry
    pub fn new(entry: StoredEntry) -> Self {
        let mut versions = VecDeque::with_capacity(4);
        versions.push_front(entry);
        Self { versions }
    }

    /// Add a new entry (must be newer than existing entries)
    #[inline]
    pub fn push(&mut self, entry: StoredEntry) {
        debug_assert!(
            self.versions
                .front()
                .map_or(true, |latest| latest.version < entry.version),
            "version chain entries must be pushed in increasing version order"
        );
        self.versions.push_front(entry);
    }

    /// Entry visible at `max_version`, tombstones included
    pub fn get_at_version(&self, max_version: u64) -> Option<&StoredEntry> {
        self.versions.iter().find(|e| e.version <= max_version)
    }

    /// Live value visible at `max_version`
    pub fn value_at_version(&self, max_version: u64) -> Option<&Vec<u8>> {
        self.get_at_version(max_version)
            .and_then(|e| e.value.as_ref())
    }

    /// Newest entry
    #[inline]
    pub fn latest(&self) -> Option<&StoredEntry> {
        self.versions.front()
    }

    /// Number of versions stored
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}
