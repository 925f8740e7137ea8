//! Error types for recordlayer
//!
//! This module defines the error taxonomy shared by every layer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Taxonomy
//!
//! | Variant | Meaning | Retried? |
//! |---------|---------|----------|
//! | `Schema` | unknown type/field, duplicate index, missing primary key | never |
//! | `Codec` | malformed key bytes | never |
//! | `Validation` | record rejected before any write | never |
//! | `Conflict` | commit lost a read-write race | yes |
//! | `TransactionTooOld` | transaction outlived its timeout | yes |
//! | `TransactionFailed` | retries exhausted | terminal |
//!
//! "Not found" is never an error: loads return `Option`.

use thiserror::Error;

/// Result type alias for recordlayer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures decoding (or encoding) ordered keys
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before an element was complete
    #[error("truncated key: needed {needed} more byte(s) at offset {offset}")]
    Truncated {
        /// Offset of the element being decoded
        offset: usize,
        /// Bytes still required
        needed: usize,
    },

    /// Unknown element type code
    #[error("unknown type code 0x{code:02x} at offset {offset}")]
    UnknownTypeCode {
        /// The offending code byte
        code: u8,
        /// Offset of the code byte
        offset: usize,
    },

    /// A string element did not contain valid UTF-8
    #[error("invalid UTF-8 in string element at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string element
        offset: usize,
    },

    /// A `0x00` byte inside an escaped payload was followed by something other than `0xFF`
    #[error("unterminated or badly escaped element at offset {offset}")]
    BadEscape {
        /// Offset of the element
        offset: usize,
    },

    /// Key does not start with the expected subspace prefix
    #[error("key is outside the subspace")]
    SubspaceMismatch,

    /// Decoded tuple has the wrong shape for the caller
    #[error("unexpected tuple shape: {0}")]
    Shape(String),
}

/// Error types for recordlayer
#[derive(Debug, Error)]
pub enum Error {
    /// Metadata is invalid or references something undeclared
    #[error("Schema error: {0}")]
    Schema(String),

    /// Ordered key encoding/decoding failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Record failed schema constraints on save
    #[error("Validation error for {record_type}: {reason}")]
    Validation {
        /// Record type being saved
        record_type: String,
        /// Why the record was rejected
        reason: String,
    },

    /// Transaction aborted due to a conflicting concurrent commit
    #[error("Transaction conflict: {reason}")]
    Conflict {
        /// Human-readable conflict summary
        reason: String,
    },

    /// Transaction exceeded its time budget before commit
    #[error("Transaction {txn_id} too old: {elapsed_ms}ms elapsed")]
    TransactionTooOld {
        /// Transaction identifier
        txn_id: u64,
        /// Elapsed milliseconds since begin
        elapsed_ms: u64,
    },

    /// Retry budget exhausted
    #[error("Transaction failed after {attempts} attempt(s): {source}")]
    TransactionFailed {
        /// Number of attempts made
        attempts: usize,
        /// The last retryable error observed
        #[source]
        source: Box<Error>,
    },

    /// Operation on a transaction that is no longer active
    #[error("Transaction not active: {state}")]
    TransactionNotActive {
        /// Description of the current state
        state: String,
    },

    /// Stored data is inconsistent (e.g. index entry without a record)
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Record payload serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Substrate failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Build a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    /// Build a validation error
    pub fn validation(record_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            record_type: record_type.into(),
            reason: reason.into(),
        }
    }

    /// Build a conflict error
    pub fn conflict(reason: impl Into<String>) -> Self {
        Error::Conflict {
            reason: reason.into(),
        }
    }

    /// Build a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage(message.into())
    }

    /// Build a corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Error::Corruption(message.into())
    }

    /// Build a config error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// True if this error is a commit conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// True if re-running the whole unit of work may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict { .. } | Error::TransactionTooOld { .. })
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
