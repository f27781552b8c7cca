//! In-memory object store

use std::collections::HashMap;

use async_trait::async_trait;
use filegen_api::Hash;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{ObjectStore, verify};

/// Object store holding every object in process memory
///
/// Suitable for tests and for daemons that can refetch everything on restart.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn add_object(&self, data: &[u8], expected: Option<&Hash>) -> Result<Hash, StoreError> {
        let hash = verify(data, expected)?;

        let mut objects = self.objects.write().await;
        if !objects.contains_key(&hash) {
            debug!(hash = %hash, length = data.len(), "storing object");
            objects.insert(hash, data.to_vec());
        }

        Ok(hash)
    }

    async fn check_objects(&self, hashes: &[Hash]) -> Result<Vec<Option<u64>>, StoreError> {
        let objects = self.objects.read().await;
        Ok(hashes
            .iter()
            .map(|hash| objects.get(hash).map(|data| data.len() as u64))
            .collect())
    }

    async fn get_object(&self, hash: &Hash) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or(StoreError::NotFound(*hash))
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
