//! On-disk object store using `tokio::fs`

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use filegen_api::Hash;
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::traits::{ObjectStore, verify};

/// Object store keeping one file per object
///
/// Objects live at `<root>/<first two hex digits>/<remaining hex digits>`.
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a partial object.
#[derive(Debug)]
pub struct DirectoryObjectStore {
    root: PathBuf,
    next_temp: AtomicU64,
}

impl DirectoryObjectStore {
    /// Open (creating if needed) a store rooted at `root`
    ///
    /// # Errors
    /// Returns an error if the root directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            next_temp: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, hash: &Hash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    async fn object_len(&self, hash: &Hash) -> Result<Option<u64>, StoreError> {
        match fs::metadata(self.object_path(hash)).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    #[instrument(skip(self, data), fields(length = data.len()), level = "debug")]
    async fn add_object(&self, data: &[u8], expected: Option<&Hash>) -> Result<Hash, StoreError> {
        let hash = verify(data, expected)?;

        if self.object_len(&hash).await?.is_some() {
            return Ok(hash);
        }

        let path = self.object_path(&hash);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let seq = self.next_temp.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("tmp{}-{seq}", std::process::id()));
        fs::write(&temp, data).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(hash = %hash, path = %path.display(), "stored object");

        Ok(hash)
    }

    async fn check_objects(&self, hashes: &[Hash]) -> Result<Vec<Option<u64>>, StoreError> {
        let mut sizes = Vec::with_capacity(hashes.len());
        for hash in hashes {
            sizes.push(self.object_len(hash).await?);
        }
        Ok(sizes)
    }

    async fn get_object(&self, hash: &Hash) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.object_path(hash)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(*hash)),
            Err(e) => Err(e.into()),
        }
    }

    fn store_type(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_objects_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let hash = {
            let store = DirectoryObjectStore::open(dir.path()).await.unwrap();
            store.add_object(b"persisted", None).await.unwrap()
        };

        let store = DirectoryObjectStore::open(dir.path()).await.unwrap();
        assert_eq!(store.check_objects(&[hash]).await.unwrap(), vec![Some(9)]);
        assert_eq!(store.get_object(&hash).await.unwrap(), b"persisted");
    }

    #[tokio::test]
    async fn test_layout_is_sharded_by_hash_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::open(dir.path()).await.unwrap();

        let hash = store.add_object(b"layout", None).await.unwrap();
        let hex = hash.to_hex();

        assert!(dir.path().join(&hex[..2]).join(&hex[2..]).is_file());
    }

    #[tokio::test]
    async fn test_mismatch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::open(dir.path()).await.unwrap();
        let wrong = Hash::of(b"other");

        let result = store.add_object(b"data", Some(&wrong)).await;

        assert!(matches!(result, Err(StoreError::HashMismatch { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::open(dir.path()).await.unwrap();
        let hash = Hash::of(b"absent");

        assert_eq!(store.check_objects(&[hash]).await.unwrap(), vec![None]);
        assert!(matches!(
            store.get_object(&hash).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
