//! Record layer engine
//!
//! This crate builds typed records on top of the lower layers:
//! - Database: substrate handle, transaction scoping and retry
//! - Metadata: record types, primary keys and index declarations
//! - RecordStore: save/load/delete of records (the primary store)
//! - Index maintenance: entries kept in step with every record change
//! - Query engine: filters, access path planning, lazy cursors
//!
//! None of the store operations commit; they all run inside a
//! `TransactionContext` owned by the caller, usually via `Database::run`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod index;
pub mod metadata;
pub mod query;
pub mod store;

pub use database::{Database, DatabaseBuilder, DatabaseConfig, RetryConfig, CONFIG_FILE_NAME};
pub use index::{IndexCheckReport, IndexEntry, IndexMaintainer};
pub use metadata::{FieldDef, Index, KeyExpression, MessageType, RecordMetaData, RecordMetaDataBuilder, RecordType};
pub use query::{
    AccessPath, Comparison, Field, Query, QueryComponent, QueryPlan, RecordCursor, RecordQuery,
};
pub use store::{RecordStore, StoredRecord};

pub use recordlayer_concurrency::TransactionContext;
pub use recordlayer_core::{Error, FieldType, Record, Result, Subspace, Tuple, TupleElement, Value};
