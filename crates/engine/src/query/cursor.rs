//! Lazy, forward-only record cursors
//!
//! A cursor borrows the transaction that created it, so it cannot outlive
//! that transaction or be restarted after it ends. Keys are pulled from the
//! transaction in batches of `scan_batch_size`; each batch read is recorded
//! in the transaction's read ranges, so a commit after iterating conflicts
//! with concurrent writes into the part of the range actually read.

use std::collections::VecDeque;

use recordlayer_concurrency::TransactionContext;
use recordlayer_core::{Error, KeyValue, Result, Subspace};
use tracing::trace;

use super::filter::QueryComponent;
use crate::index::decode_entry_key;
use crate::store::{decode_record, StoredRecord};

/// Where a cursor's keys come from
#[derive(Debug, Clone)]
pub(crate) enum CursorSource {
    /// Record keys of one type; values are the records
    Records {
        /// `records / record_type`
        subspace: Subspace,
        /// Type name expected in every payload
        record_type: String,
    },
    /// Index entry keys; records are fetched by primary key
    Index {
        /// `indexes / index_name`
        subspace: Subspace,
        /// Index name, for errors
        index_name: String,
        /// Indexed columns before the primary key
        columns: usize,
        /// `records / record_type`
        records: Subspace,
        /// Type name expected in every payload
        record_type: String,
    },
}

/// Lazy sequence of records produced by a scan or query
///
/// Yields `Result<StoredRecord>`; after the first error the cursor is fused
/// and yields nothing more.
pub struct RecordCursor<'t> {
    txn: &'t mut TransactionContext,
    source: CursorSource,
    next_begin: Vec<u8>,
    end: Vec<u8>,
    batch: VecDeque<KeyValue>,
    batch_size: usize,
    exhausted: bool,
    residual: Option<QueryComponent>,
    remaining: Option<usize>,
    failed: bool,
}

impl<'t> RecordCursor<'t> {
    pub(crate) fn new(
        txn: &'t mut TransactionContext,
        source: CursorSource,
        (begin, end): (Vec<u8>, Vec<u8>),
        batch_size: usize,
        residual: Option<QueryComponent>,
        limit: Option<usize>,
    ) -> Self {
        Self {
            txn,
            source,
            next_begin: begin,
            end,
            batch: VecDeque::new(),
            batch_size: batch_size.max(1),
            exhausted: false,
            residual,
            remaining: limit,
            failed: false,
        }
    }

    /// Drain the cursor into a vector, stopping at the first error
    pub fn collect_records(self) -> Result<Vec<StoredRecord>> {
        self.collect()
    }

    fn fill(&mut self) -> Result<()> {
        if self.next_begin >= self.end {
            self.exhausted = true;
            return Ok(());
        }
        let page = self
            .txn
            .get_range(&self.next_begin, &self.end, Some(self.batch_size))?;
        trace!(txn_id = self.txn.txn_id, fetched = page.len(), "cursor batch");
        if page.len() < self.batch_size {
            self.exhausted = true;
        } else if let Some((last, _)) = page.last() {
            let mut next = last.clone();
            next.push(0x00);
            self.next_begin = next;
        }
        self.batch.extend(page);
        Ok(())
    }

    fn materialize(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<StoredRecord> {
        match &self.source {
            CursorSource::Records {
                subspace,
                record_type,
            } => decode_record(subspace, record_type, &key, &value),
            CursorSource::Index {
                subspace,
                index_name,
                columns,
                records,
                record_type,
            } => {
                let entry = decode_entry_key(subspace, index_name, *columns, &key)?;
                let record_key = records.pack(&entry.primary_key);
                let payload = self.txn.get(&record_key)?.ok_or_else(|| {
                    Error::corruption(format!(
                        "index '{}' entry {} points to a missing record",
                        index_name, entry
                    ))
                })?;
                decode_record(records, record_type, &record_key, &payload)
            }
        }
    }
}

impl Iterator for RecordCursor<'_> {
    type Item = Result<StoredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed || self.remaining == Some(0) {
                return None;
            }
            let (key, value) = match self.batch.pop_front() {
                Some(kv) => kv,
                None if self.exhausted => return None,
                None => {
                    if let Err(e) = self.fill() {
                        self.failed = true;
                        return Some(Err(e));
                    }
                    continue;
                }
            };
            let stored = match self.materialize(key, value) {
                Ok(stored) => stored,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            if self
                .residual
                .as_ref()
                .map_or(true, |filter| filter.eval(&stored.record))
            {
                if let Some(n) = self.remaining.as_mut() {
                    *n -= 1;
                }
                return Some(Ok(stored));
            }
        }
    }
}

impl std::fmt::Debug for RecordCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCursor")
            .field("txn_id", &self.txn.txn_id)
            .field("source", &self.source)
            .field("buffered", &self.batch.len())
            .field("exhausted", &self.exhausted)
            .field("remaining", &self.remaining)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{KeyExpression, RecordMetaData};
    use crate::query::{Query, RecordQuery};
    use crate::store::RecordStore;
    use crate::Database;
    use recordlayer_core::{FieldType, Record, Tuple};

    fn store() -> RecordStore {
        let metadata = RecordMetaData::builder()
            .add_record_type("Item", [("id", FieldType::Int), ("rank", FieldType::Int)])
            .set_primary_key("Item", KeyExpression::field("id"))
            .add_index("Item", "rankIndex", KeyExpression::field("rank"))
            .build()
            .unwrap();
        RecordStore::new(metadata, Subspace::new(&Tuple::new().with("cursor")))
            .with_scan_batch_size(2)
    }

    fn item(id: i64, rank: i64) -> Record {
        Record::new("Item").with("id", id).with("rank", rank)
    }

    #[test]
    fn test_scan_crosses_batches_in_key_order() {
        let db = Database::in_memory();
        let store = store();
        let mut txn = db.begin_transaction();
        for id in [5, 1, 4, 2, 3] {
            store.save_record(&mut txn, item(id, 10 - id)).unwrap();
        }
        let keys: Vec<Tuple> = store
            .scan_records(&mut txn, "Item")
            .unwrap()
            .map(|r| r.unwrap().primary_key)
            .collect();
        let expected: Vec<Tuple> = (1..=5i64).map(|id| Tuple::new().with(id)).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_limit_stops_early() {
        let db = Database::in_memory();
        let store = store();
        let mut txn = db.begin_transaction();
        for id in 0..7 {
            store.save_record(&mut txn, item(id, id)).unwrap();
        }
        let query = RecordQuery::new("Item")
            .with_filter(Query::field("rank").ge(2))
            .with_limit(3);
        let found = store.execute_query(&mut txn, &query).unwrap().collect_records().unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].primary_key, Tuple::new().with(2i64));

        let none = RecordQuery::new("Item").with_limit(0);
        assert_eq!(store.execute_query(&mut txn, &none).unwrap().count(), 0);
    }

    #[test]
    fn test_undecodable_payload_fuses_cursor() {
        let db = Database::in_memory();
        let store = store();
        let mut txn = db.begin_transaction();
        store.save_record(&mut txn, item(1, 1)).unwrap();
        store.save_record(&mut txn, item(3, 3)).unwrap();
        let garbage = store.record_subspace("Item").pack(&Tuple::new().with(2i64));
        txn.set(garbage, vec![0xc1]).unwrap();

        let mut cursor = store.scan_records(&mut txn, "Item").unwrap();
        assert!(cursor.next().unwrap().is_ok());
        assert!(matches!(cursor.next(), Some(Err(_))));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let db = Database::in_memory();
        let store = store();
        let mut txn = db.begin_transaction();
        store.save_record(&mut txn, item(1, 5)).unwrap();
        let query = RecordQuery::new("Item").with_filter(Query::and([
            Query::field("rank").gt(8),
            Query::field("rank").lt(3),
        ]));
        assert!(store
            .execute_query(&mut txn, &query)
            .unwrap()
            .collect_records()
            .unwrap()
            .is_empty());
    }
}
