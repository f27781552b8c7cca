//! Error types for filegen-store

use filegen_api::Hash;
use thiserror::Error;

/// Errors that can occur while reading or writing objects
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Content does not hash to the hash it was offered under
    #[error("hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch {
        /// Hash supplied by the caller
        expected: Hash,
        /// Hash of the supplied data
        actual: Hash,
    },

    /// Object is not in the store
    #[error("object not found: {0}")]
    NotFound(Hash),

    /// I/O error while accessing the backing storage
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::IoError(e.to_string())
    }
}
