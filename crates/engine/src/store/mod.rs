//! RecordStore: the primary store for typed records
//!
//! ## Design
//!
//! RecordStore is a stateless facade: it holds the shared metadata and the
//! subspaces it writes under, never any data. Every operation takes the
//! caller's `TransactionContext` and none of them commit; the surrounding
//! `Database::run` (or manual commit) decides that.
//!
//! ## Key layout
//!
//! ```text
//! (root..., 1, record_type, primary_key...)                 -> record (MessagePack)
//! (root..., 2, index_name, indexed_value..., primary_key...) -> ''
//! ```
//!
//! Record types sharing a store are disjoint because the type name is part
//! of every record key, and indexes because index names are unique.

mod maintenance;

use std::sync::Arc;

use recordlayer_concurrency::TransactionContext;
use recordlayer_core::{Error, Record, Result, Subspace, Tuple, Value};
use tracing::trace;

use crate::index::IndexMaintainer;
use crate::metadata::{RecordMetaData, RecordType};
use crate::query::{self, AccessPath, CursorSource, QueryPlan, RecordCursor, RecordQuery};

/// Tuple element selecting the record subspace under the root
pub const RECORDS_KEY: i64 = 1;
/// Tuple element selecting the index subspace under the root
pub const INDEXES_KEY: i64 = 2;

/// Default number of keys fetched per cursor batch
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 128;

/// A record together with where it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Record type name
    pub record_type: String,
    /// Primary key the record is stored under
    pub primary_key: Tuple,
    /// The record itself
    pub record: Record,
}

/// Decode a stored record from its key and payload
pub(crate) fn decode_record(
    subspace: &Subspace,
    record_type: &str,
    key: &[u8],
    value: &[u8],
) -> Result<StoredRecord> {
    let primary_key = subspace.unpack(key)?;
    let record: Record = rmp_serde::from_slice(value)?;
    if record.type_name() != record_type {
        return Err(Error::corruption(format!(
            "record under {} has type '{}', expected '{}'",
            primary_key,
            record.type_name(),
            record_type
        )));
    }
    Ok(StoredRecord {
        record_type: record_type.to_string(),
        primary_key,
        record,
    })
}

/// Primary store and query entry point over one key-space root
#[derive(Debug, Clone)]
pub struct RecordStore {
    metadata: Arc<RecordMetaData>,
    root: Subspace,
    records: Subspace,
    indexes: Subspace,
    scan_batch_size: usize,
}

impl RecordStore {
    /// Store rooted at `root` using `metadata`
    pub fn new(metadata: Arc<RecordMetaData>, root: Subspace) -> Self {
        Self {
            records: root.child(RECORDS_KEY),
            indexes: root.child(INDEXES_KEY),
            metadata,
            root,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }

    /// Override the number of keys fetched per cursor batch
    pub fn with_scan_batch_size(mut self, scan_batch_size: usize) -> Self {
        self.scan_batch_size = scan_batch_size.max(1);
        self
    }

    /// Schema this store validates against
    pub fn metadata(&self) -> &Arc<RecordMetaData> {
        &self.metadata
    }

    /// Key-space root
    pub fn root(&self) -> &Subspace {
        &self.root
    }

    /// Subspace holding the records of `record_type`
    pub fn record_subspace(&self, record_type: &str) -> Subspace {
        self.records.child(record_type)
    }

    /// Subspace holding the entries of `index_name`
    pub fn index_subspace(&self, index_name: &str) -> Subspace {
        self.indexes.child(index_name)
    }

    /// Primary key of a (validated) record
    pub fn primary_key_of(&self, record: &Record) -> Result<Tuple> {
        let record_type = self.metadata.record_type(record.type_name())?;
        record_type
            .primary_key()
            .evaluate(record)
            .iter()
            .map(|value| {
                value.to_tuple_element().ok_or_else(|| {
                    Error::validation(record_type.name(), "primary key component is a message")
                })
            })
            .collect()
    }

    /// Check the arity of `primary_key` and coerce each component to its
    /// column type, so `1u64` finds a record saved with an `int` key
    fn check_primary_key(&self, record_type: &RecordType, primary_key: &Tuple) -> Result<Tuple> {
        let paths = record_type.primary_key().column_paths();
        if primary_key.len() != paths.len() {
            return Err(Error::schema(format!(
                "primary key of '{}' has {} column(s), got {}",
                record_type.name(),
                paths.len(),
                primary_key.len()
            )));
        }
        paths
            .iter()
            .zip(primary_key.iter())
            .map(|(path, element)| {
                let ty = self.metadata.resolve_path(record_type.name(), path.as_slice())?;
                Value::from_tuple_element(element)
                    .coerce_to(ty)
                    .and_then(|value| value.to_tuple_element())
                    .ok_or_else(|| {
                        Error::validation(
                            record_type.name(),
                            format!("primary key component {} is not a {}", element, ty),
                        )
                    })
            })
            .collect()
    }

    // ========== Record lifecycle ==========

    /// Save `record`, replacing any record with the same primary key
    ///
    /// Returns the record previously stored under that key. Index entries
    /// are diffed against the previous record and updated in `txn`.
    ///
    /// # Errors
    /// - `Error::Schema` if the record type is not registered
    /// - `Error::Validation` if the record does not fit its type; nothing is
    ///   written in that case
    pub fn save_record(&self, txn: &mut TransactionContext, record: Record) -> Result<Option<Record>> {
        txn.ensure_active()?;
        let record = self.metadata.validate_record(record)?;
        let record_type = record.type_name().to_string();
        let primary_key = self.primary_key_of(&record)?;
        let subspace = self.record_subspace(&record_type);
        let key = subspace.pack(&primary_key);

        let previous = match txn.get(&key)? {
            Some(bytes) => Some(decode_record(&subspace, &record_type, &key, &bytes)?.record),
            None => None,
        };

        let payload = rmp_serde::to_vec_named(&record)?;
        txn.set(key, payload)?;
        for index in self.metadata.indexes_for(&record_type) {
            IndexMaintainer::new(index, &self.indexes).update(
                txn,
                &primary_key,
                previous.as_ref(),
                Some(&record),
            )?;
        }
        trace!(
            txn_id = txn.txn_id,
            record_type = record_type.as_str(),
            pk = %primary_key,
            replaced = previous.is_some(),
            "saved record"
        );
        Ok(previous)
    }

    /// Load the record of `record_type` stored under `primary_key`
    ///
    /// Absence is `Ok(None)`, never an error.
    pub fn load_record(
        &self,
        txn: &mut TransactionContext,
        record_type: &str,
        primary_key: &Tuple,
    ) -> Result<Option<StoredRecord>> {
        let ty = self.metadata.record_type(record_type)?;
        let primary_key = self.check_primary_key(ty, primary_key)?;
        let subspace = self.record_subspace(record_type);
        let key = subspace.pack(&primary_key);
        txn.get(&key)?
            .map(|bytes| decode_record(&subspace, record_type, &key, &bytes))
            .transpose()
    }

    /// Delete the record of `record_type` stored under `primary_key`
    ///
    /// Returns whether a record existed. Deleting an absent record is a
    /// no-op.
    pub fn delete_record(
        &self,
        txn: &mut TransactionContext,
        record_type: &str,
        primary_key: &Tuple,
    ) -> Result<bool> {
        let Some(existing) = self.load_record(txn, record_type, primary_key)? else {
            return Ok(false);
        };
        let primary_key = &existing.primary_key;
        txn.clear(&self.record_subspace(record_type).pack(primary_key))?;
        for index in self.metadata.indexes_for(record_type) {
            IndexMaintainer::new(index, &self.indexes).update(
                txn,
                primary_key,
                Some(&existing.record),
                None,
            )?;
        }
        trace!(txn_id = txn.txn_id, record_type, pk = %primary_key, "deleted record");
        Ok(true)
    }

    // ========== Scans and queries ==========

    /// Every record of `record_type`, in primary key order
    pub fn scan_records<'t>(
        &self,
        txn: &'t mut TransactionContext,
        record_type: &str,
    ) -> Result<RecordCursor<'t>> {
        self.execute_plan(txn, &self.plan_query(&RecordQuery::new(record_type))?)
    }

    /// Choose an access path for `query` without executing it
    pub fn plan_query(&self, query: &RecordQuery) -> Result<QueryPlan> {
        query::plan(&self.metadata, query)
    }

    /// Plan and execute `query`
    pub fn execute_query<'t>(
        &self,
        txn: &'t mut TransactionContext,
        query: &RecordQuery,
    ) -> Result<RecordCursor<'t>> {
        let plan = self.plan_query(query)?;
        self.execute_plan(txn, &plan)
    }

    /// Execute a plan produced by [`RecordStore::plan_query`]
    pub fn execute_plan<'t>(
        &self,
        txn: &'t mut TransactionContext,
        plan: &QueryPlan,
    ) -> Result<RecordCursor<'t>> {
        txn.ensure_active()?;
        let record_type = plan.access().record_type();
        let records = self.record_subspace(record_type);
        let (source, range) = match plan.access() {
            AccessPath::Scan { .. } => {
                let range = records.range();
                (
                    CursorSource::Records {
                        subspace: records,
                        record_type: record_type.to_string(),
                    },
                    range,
                )
            }
            AccessPath::Index { index_name, .. } => {
                let index = self.metadata.index(index_name)?;
                let subspace = self.index_subspace(index_name);
                let range = plan.access().index_key_range(&subspace)?;
                (
                    CursorSource::Index {
                        subspace,
                        index_name: index_name.clone(),
                        columns: index.column_count(),
                        records,
                        record_type: record_type.to_string(),
                    },
                    range,
                )
            }
        };
        Ok(RecordCursor::new(
            txn,
            source,
            range,
            self.scan_batch_size,
            plan.residual().cloned(),
            plan.limit(),
        ))
    }
}
