//! Core types and traits for recordlayer
//!
//! This crate defines the foundational types used throughout the system:
//! - Tuple / TupleElement: order-preserving key codec
//! - Subspace: prefixed key namespaces
//! - Value / FieldType: dynamic field values and their declared types
//! - Record: dynamic instance of a message type
//! - Error: error taxonomy
//! - Traits: substrate interface (Storage, SnapshotView)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod subspace;
pub mod traits;
pub mod tuple;
pub mod value;

pub use error::{CodecError, Error, Result};
pub use record::Record;
pub use subspace::Subspace;
pub use traits::{KeyValue, Mutation, SnapshotView, Storage};
pub use tuple::{strinc, Tuple, TupleElement};
pub use value::{FieldType, Value};
