//! Storage layer for recordlayer
//!
//! This crate implements the ordered key-value substrate the record layer
//! runs on:
//! - MemoryStore: BTreeMap-based MVCC storage behind a RwLock
//! - VersionChain: per-key committed write history
//! - MemorySnapshot: version-bounded read view
//!
//! Version management uses a single AtomicU64 watermark that is published
//! only after a whole batch is in place.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod version_chain;

pub use memory::{MemorySnapshot, MemoryStore};
pub use version_chain::{StoredEntry, VersionChain};
