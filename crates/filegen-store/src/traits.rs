//! Object store trait

use async_trait::async_trait;
use filegen_api::Hash;

use crate::error::StoreError;

/// Content-addressed object storage
///
/// Objects are immutable and keyed by the SHA-512 of their content.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data`, returning its hash
    ///
    /// When `expected` is given the data must hash to it, otherwise nothing is
    /// stored. Adding an object that is already present is a no-op.
    async fn add_object(&self, data: &[u8], expected: Option<&Hash>) -> Result<Hash, StoreError>;

    /// Report the stored length of each hash, `None` for absent objects
    async fn check_objects(&self, hashes: &[Hash]) -> Result<Vec<Option<u64>>, StoreError>;

    /// Read an object's content
    async fn get_object(&self, hash: &Hash) -> Result<Vec<u8>, StoreError>;

    fn store_type(&self) -> &'static str;
}

/// Hash `data` and check it against the caller's expectation
pub(crate) fn verify(data: &[u8], expected: Option<&Hash>) -> Result<Hash, StoreError> {
    let actual = Hash::of(data);
    match expected {
        Some(expected) if *expected != actual => Err(StoreError::HashMismatch {
            expected: *expected,
            actual,
        }),
        _ => Ok(actual),
    }
}
