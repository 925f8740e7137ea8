//! Per-index entry derivation and diff-based updates

use std::fmt;

use recordlayer_concurrency::TransactionContext;
use recordlayer_core::{CodecError, Error, Record, Result, Subspace, Tuple};
use tracing::trace;

use crate::metadata::Index;

/// One decoded index entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    /// Index the entry belongs to
    pub index_name: String,
    /// Indexed column values
    pub values: Tuple,
    /// Primary key of the record the entry points to
    pub primary_key: Tuple,
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} -> {}", self.index_name, self.values, self.primary_key)
    }
}

/// Outcome of comparing an index against the records it covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCheckReport {
    /// Entries a live record requires but the index lacks
    pub missing: Vec<IndexEntry>,
    /// Entries present in the index that no live record produces
    pub dangling: Vec<IndexEntry>,
}

impl IndexCheckReport {
    /// True when the index holds exactly the entries its records produce
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.dangling.is_empty()
    }
}

/// Derives and maintains the entries of one index
#[derive(Debug, Clone)]
pub struct IndexMaintainer<'a> {
    index: &'a Index,
    subspace: Subspace,
}

impl<'a> IndexMaintainer<'a> {
    /// Maintainer for `index`, whose entries live under `index_root`/`index.name()`
    pub fn new(index: &'a Index, index_root: &Subspace) -> Self {
        Self {
            index,
            subspace: index_root.child(index.name()),
        }
    }

    /// The index being maintained
    pub fn index(&self) -> &Index {
        self.index
    }

    /// Subspace holding this index's entries
    pub fn subspace(&self) -> &Subspace {
        &self.subspace
    }

    /// Indexed column values of `record`; missing fields become null
    pub fn entry_values(&self, record: &Record) -> Result<Tuple> {
        self.index
            .root_expression()
            .evaluate(record)
            .iter()
            .map(|value| {
                value.to_tuple_element().ok_or_else(|| {
                    Error::schema(format!(
                        "index '{}' evaluated to a non-scalar value",
                        self.index.name()
                    ))
                })
            })
            .collect()
    }

    /// Full entry key for `record` stored under `primary_key`
    pub fn entry_key(&self, record: &Record, primary_key: &Tuple) -> Result<Vec<u8>> {
        let values = self.entry_values(record)?;
        Ok(self.subspace.pack(&values.concat(primary_key)))
    }

    /// Bring this index in line with a record change
    ///
    /// `old` is the record previously stored under `primary_key` (if any),
    /// `new` the record replacing it (`None` for a delete). Nothing is
    /// written when both produce the same entry.
    pub fn update(
        &self,
        txn: &mut TransactionContext,
        primary_key: &Tuple,
        old: Option<&Record>,
        new: Option<&Record>,
    ) -> Result<()> {
        let old_key = old.map(|r| self.entry_key(r, primary_key)).transpose()?;
        let new_key = new.map(|r| self.entry_key(r, primary_key)).transpose()?;
        if old_key == new_key {
            trace!(index = self.index.name(), pk = %primary_key, "index entry unchanged");
            return Ok(());
        }
        if let Some(key) = old_key {
            txn.clear(&key)?;
        }
        if let Some(key) = new_key {
            txn.set(key, Vec::new())?;
        }
        Ok(())
    }

    /// Decode a raw entry key of this index
    ///
    /// # Errors
    /// `Error::Codec` if the key is outside the index or too short to hold
    /// the indexed columns.
    pub fn decode_entry(&self, key: &[u8]) -> Result<IndexEntry> {
        decode_entry_key(
            &self.subspace,
            self.index.name(),
            self.index.column_count(),
            key,
        )
    }
}

/// Split a raw entry key into indexed values and primary key
pub(crate) fn decode_entry_key(
    subspace: &Subspace,
    index_name: &str,
    columns: usize,
    key: &[u8],
) -> Result<IndexEntry> {
    let tuple = subspace.unpack(key)?;
    if tuple.len() <= columns {
        return Err(CodecError::Shape(format!(
            "index '{}' entry has {} element(s), expected more than {}",
            index_name,
            tuple.len(),
            columns
        ))
        .into());
    }
    let (values, primary_key) = tuple.split_at(columns)?;
    Ok(IndexEntry {
        index_name: index_name.to_string(),
        values,
        primary_key,
    })
}
