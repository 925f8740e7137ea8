//! Concurrency layer for recordlayer
//!
//! This crate implements optimistic concurrency control (OCC) with:
//! - TransactionContext: read set, read ranges and buffered writes
//! - Snapshot isolation via the substrate's `SnapshotView`
//! - Conflict detection at commit time (point reads and phantoms)
//! - TransactionManager: serialized validate-and-apply commits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::TransactionManager;
pub use transaction::{
    CommitError, PendingOperations, ReadRange, TransactionContext, TransactionStatus,
};
pub use validation::{printable, ConflictType, ValidationResult};
