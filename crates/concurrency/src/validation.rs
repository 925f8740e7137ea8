//! Transaction validation for OCC
//!
//! Key rules:
//! - First-committer-wins based on the READ-SET and READ-RANGES, not the write-set
//! - Blind writes (write without read) do NOT conflict
//! - A read range conflicts when any key inside it was written (or cleared)
//!   after the transaction's snapshot, which catches phantoms
//! - Write skew is ALLOWED (do not try to prevent it)

use std::fmt;

use recordlayer_core::{Result, Storage};

use crate::transaction::{ReadRange, TransactionContext};

/// Types of conflicts that can occur during transaction validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// A key read from the snapshot was written after the snapshot
    ReadWriteConflict {
        /// The key that has a conflict
        key: Vec<u8>,
        /// Snapshot version of the reader
        read_version: u64,
        /// Version of the newer write
        write_version: u64,
    },

    /// A key inside a scanned range was written after the snapshot
    RangeConflict {
        /// Inclusive start of the scanned range
        begin: Vec<u8>,
        /// Exclusive end of the scanned range
        end: Vec<u8>,
        /// First key found written inside it
        key: Vec<u8>,
        /// Version of that write
        write_version: u64,
    },
}

/// Printable form of a binary key: ASCII kept, everything else as `\xNN`
pub fn printable(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len());
    for &b in key {
        if (0x20..0x7f).contains(&b) && b != b'\\' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{:02x}", b));
        }
    }
    out
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictType::ReadWriteConflict {
                key,
                read_version,
                write_version,
            } => write!(
                f,
                "key {} read at version {} was written at version {}",
                printable(key),
                read_version,
                write_version
            ),
            ConflictType::RangeConflict {
                begin,
                end,
                key,
                write_version,
            } => write!(
                f,
                "range [{}, {}) changed: key {} written at version {}",
                printable(begin),
                printable(end),
                printable(key),
                write_version
            ),
        }
    }
}

/// Result of transaction validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Create a validation result with a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Validate point reads against the latest write version of each key
///
/// # Errors
/// Substrate errors abort validation; a commit must not proceed on a
/// partial check.
pub fn validate_read_set<'a, S, I>(read_set: I, start_version: u64, store: &S) -> Result<ValidationResult>
where
    S: Storage + ?Sized,
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut result = ValidationResult::ok();
    for key in read_set {
        let write_version = store.last_write_version(key)?;
        if write_version > start_version {
            result.conflicts.push(ConflictType::ReadWriteConflict {
                key: key.to_vec(),
                read_version: start_version,
                write_version,
            });
        }
    }
    Ok(result)
}

/// Validate scanned ranges: any write inside one after `start_version` conflicts
///
/// # Errors
/// Substrate errors abort validation.
pub fn validate_read_ranges<S: Storage + ?Sized>(
    ranges: &[ReadRange],
    start_version: u64,
    store: &S,
) -> Result<ValidationResult> {
    let mut result = ValidationResult::ok();
    for range in ranges {
        if let Some((key, write_version)) =
            store.first_write_in_range_after(&range.begin, &range.end, start_version)?
        {
            result.conflicts.push(ConflictType::RangeConflict {
                begin: range.begin.clone(),
                end: range.end.clone(),
                key,
                write_version,
            });
        }
    }
    Ok(result)
}

/// Full validation of a transaction against the current committed state
///
/// # Errors
/// Substrate errors abort validation.
pub fn validate_transaction<S: Storage + ?Sized>(
    txn: &TransactionContext,
    store: &S,
) -> Result<ValidationResult> {
    let mut result = validate_read_set(txn.read_set(), txn.start_version, store)?;
    result.merge(validate_read_ranges(txn.read_ranges(), txn.start_version, store)?);
    Ok(result)
}
