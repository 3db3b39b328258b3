//! Blob storage abstraction for original upload bytes.
//!
//! The pipeline stores every upload before extraction so strategies can
//! reference the object by URL, and releases the blob again when extraction
//! fails or the content turns out to be a duplicate.

mod memory;

pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use thiserror::Error;

/// Opaque reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobRef(pub String);

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised by blob store backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No blob exists for the supplied reference.
    #[error("Blob not found: {0}")]
    NotFound(String),
    /// Backend failed to complete the operation.
    #[error("Blob store request failed: {0}")]
    Backend(String),
}

/// Interface implemented by blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist raw bytes and return a reference to the stored object.
    async fn store(&self, bytes: Vec<u8>, media_type: &str) -> Result<BlobRef, StorageError>;

    /// Fetch the raw bytes behind a reference.
    async fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>, StorageError>;

    /// Produce a retrievable URL for the stored object.
    async fn get_url(&self, blob_ref: &BlobRef) -> Result<String, StorageError>;

    /// Release the stored object.
    async fn delete(&self, blob_ref: &BlobRef) -> Result<(), StorageError>;

    /// Report the stored object's size in bytes.
    async fn size_of(&self, blob_ref: &BlobRef) -> Result<u64, StorageError>;
}
