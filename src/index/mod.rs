//! Vector index integration for tenant-namespaced entries.
//!
//! The pipeline talks to the index through the [`EntryIndex`] trait: one
//! collection per tenant namespace, one point per entry. [`HttpEntryIndex`]
//! speaks the REST protocol of the backing engine; [`MemoryEntryIndex`] backs
//! the integration suite.

pub mod http;
pub mod memory;
pub mod payload;
mod types;

pub use http::HttpEntryIndex;
pub use memory::MemoryEntryIndex;
pub use types::{
    ClaimOutcome, EntryMetadata, EntryPage, EntryRecord, EntryStatus, IndexError, NamespaceId,
    ScoredEntry,
};

use async_trait::async_trait;

/// Narrow interface to the vector-search engine.
///
/// Implementations must keep namespaces fully isolated: nothing written under
/// one namespace is ever visible from another.
#[async_trait]
pub trait EntryIndex: Send + Sync {
    /// Create the namespace's collection when it does not exist yet.
    async fn ensure_namespace(
        &self,
        namespace: &NamespaceId,
        vector_size: u64,
    ) -> Result<(), IndexError>;

    /// Whether the namespace's collection exists.
    async fn namespace_exists(&self, namespace: &NamespaceId) -> Result<bool, IndexError>;

    /// Fetch a single entry by id.
    async fn get_entry(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
    ) -> Result<Option<EntryRecord>, IndexError>;

    /// Conditionally write an entry point keyed by its id.
    ///
    /// Inserts when no point exists, replaces a point in the `error` state,
    /// and refuses when a live point already holds the id. Concurrent claims
    /// for the same id must elect exactly one [`ClaimOutcome::Claimed`]
    /// caller; everyone else observes [`ClaimOutcome::Occupied`].
    async fn claim_entry(
        &self,
        namespace: &NamespaceId,
        record: EntryRecord,
        vector: Vec<f32>,
    ) -> Result<ClaimOutcome, IndexError>;

    /// Update the lifecycle status of an existing entry.
    async fn set_status(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
        status: EntryStatus,
    ) -> Result<(), IndexError>;

    /// Return one page of entries in stable insertion order.
    ///
    /// `cursor` is the opaque continuation string from a previous page, or
    /// `None` for the first page.
    async fn list_page(
        &self,
        namespace: &NamespaceId,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<EntryPage, IndexError>;

    /// Remove an entry and its index data.
    async fn delete_entry(&self, namespace: &NamespaceId, entry_id: &str)
    -> Result<(), IndexError>;

    /// Rank ready entries against a query vector.
    async fn query(
        &self,
        namespace: &NamespaceId,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, IndexError>;
}
