//! recordlayer - typed records over an ordered transactional key-value store
//!
//! Records are declared in a [`RecordMetaData`], stored by primary key under
//! a [`Subspace`], indexed by secondary key expressions, and queried through
//! a planner that picks an index or falls back to a full scan.
//!
//! # Quick Start
//!
//! ```
//! use recordlayer::{Database, FieldType, KeyExpression, Query, Record, RecordMetaData,
//!     RecordQuery, Subspace, Tuple};
//!
//! let metadata = RecordMetaData::builder()
//!     .add_record_type("Order", [("order_id", FieldType::Int), ("price", FieldType::Int)])
//!     .set_primary_key("Order", KeyExpression::field("order_id"))
//!     .add_index("Order", "priceIndex", KeyExpression::field("price"))
//!     .build()?;
//!
//! let db = Database::in_memory();
//! let store = db.open_record_store(metadata, Subspace::new(&Tuple::new().with("shop")));
//!
//! db.run(|txn| {
//!     store.save_record(txn, Record::new("Order").with("order_id", 1).with("price", 40))?;
//!     Ok(())
//! })?;
//!
//! let cheap = RecordQuery::new("Order").with_filter(Query::field("price").lt(50));
//! let found = db.run(|txn| store.execute_query(txn, &cheap)?.collect_records())?;
//! assert_eq!(found.len(), 1);
//! # Ok::<(), recordlayer::Error>(())
//! ```
//!
//! # Architecture
//!
//! Store operations never commit on their own. They run inside a
//! [`TransactionContext`] handed out by [`Database::run`] (retried on
//! conflict) or [`Database::transaction`] (single attempt).

pub use recordlayer_core::{CodecError, KeyValue, Mutation, SnapshotView, Storage};
pub use recordlayer_engine::*;
