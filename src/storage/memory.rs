//! In-memory [`BlobStore`] used for development and tests.

use super::{BlobRef, BlobStore, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

struct StoredBlob {
    bytes: Vec<u8>,
    media_type: String,
}

/// Blob store keeping objects in a process-local map.
///
/// Production deployments point [`BlobStore`] at a real object store; this
/// implementation backs local runs and the integration suite.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently retained. Used by tests to assert release.
    pub fn blob_count(&self) -> usize {
        self.blobs.read().expect("blob lock poisoned").len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, bytes: Vec<u8>, media_type: &str) -> Result<BlobRef, StorageError> {
        let id = Uuid::new_v4().to_string();
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| StorageError::Backend("blob lock poisoned".into()))?;
        blobs.insert(
            id.clone(),
            StoredBlob {
                bytes,
                media_type: media_type.to_string(),
            },
        );
        Ok(BlobRef(id))
    }

    async fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>, StorageError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| StorageError::Backend("blob lock poisoned".into()))?;
        blobs
            .get(&blob_ref.0)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(blob_ref.0.clone()))
    }

    async fn get_url(&self, blob_ref: &BlobRef) -> Result<String, StorageError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| StorageError::Backend("blob lock poisoned".into()))?;
        let blob = blobs
            .get(&blob_ref.0)
            .ok_or_else(|| StorageError::NotFound(blob_ref.0.clone()))?;
        Ok(format!("memory://blobs/{}?type={}", blob_ref.0, blob.media_type))
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<(), StorageError> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| StorageError::Backend("blob lock poisoned".into()))?;
        blobs
            .remove(&blob_ref.0)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(blob_ref.0.clone()))
    }

    async fn size_of(&self, blob_ref: &BlobRef) -> Result<u64, StorageError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| StorageError::Backend("blob lock poisoned".into()))?;
        blobs
            .get(&blob_ref.0)
            .map(|blob| blob.bytes.len() as u64)
            .ok_or_else(|| StorageError::NotFound(blob_ref.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_get_and_size_round_trip() {
        let store = MemoryBlobStore::new();
        let blob_ref = store
            .store(vec![1, 2, 3], "application/pdf")
            .await
            .expect("store");

        assert_eq!(store.get(&blob_ref).await.expect("get"), vec![1, 2, 3]);
        assert_eq!(store.size_of(&blob_ref).await.expect("size"), 3);
        let url = store.get_url(&blob_ref).await.expect("url");
        assert!(url.contains(&blob_ref.0));
    }

    #[tokio::test]
    async fn delete_releases_the_blob() {
        let store = MemoryBlobStore::new();
        let blob_ref = store.store(vec![9], "text/plain").await.expect("store");
        assert_eq!(store.blob_count(), 1);

        store.delete(&blob_ref).await.expect("delete");
        assert_eq!(store.blob_count(), 0);
        assert!(matches!(
            store.get(&blob_ref).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
