//! Tenant namespace store and entry repository.
//!
//! Owns the mapping from tenants to isolated index namespaces and the
//! idempotent entry lifecycle on top of the [`EntryIndex`] seam. Entry ids
//! are derived deterministically from `(namespace, content hash)`, so
//! concurrent ingestions of identical content converge on one point and the
//! dedup check never needs an application-level lock.

use crate::config::get_config;
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::fingerprint;
use crate::index::payload::current_timestamp_rfc3339;
use crate::index::{
    ClaimOutcome, EntryIndex, EntryMetadata, EntryPage, EntryRecord, EntryStatus, IndexError,
    NamespaceId, ScoredEntry,
};
use crate::tenant::TenantContext;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors emitted by repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Vector index interaction failed.
    #[error("Index request failed: {0}")]
    Index(#[from] IndexError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
}

/// Result of an idempotent entry upsert.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// Identity of the entry holding this content.
    pub entry_id: String,
    /// `false` when identical content was already indexed in the namespace.
    pub created: bool,
    /// Storage reference of an errored record this write replaced. Releasing
    /// that blob is the caller's responsibility.
    pub replaced_storage_ref: Option<String>,
}

/// Namespace-scoped entry repository over a vector index.
pub struct EntryRepository {
    index: Arc<dyn EntryIndex>,
    embeddings: Box<dyn EmbeddingClient>,
}

impl EntryRepository {
    /// Build a repository over the shared index and an embedding client.
    pub fn new(index: Arc<dyn EntryIndex>, embeddings: Box<dyn EmbeddingClient>) -> Self {
        Self { index, embeddings }
    }

    /// Namespace owning a tenant's entries. Pure naming, no side effects.
    pub fn namespace_for(tenant: &TenantContext) -> NamespaceId {
        NamespaceId(format!("kb_{}", tenant.org_id))
    }

    /// Resolve a tenant's namespace, creating it lazily on first use.
    pub async fn get_or_create_namespace(
        &self,
        tenant: &TenantContext,
    ) -> Result<NamespaceId, RepositoryError> {
        let namespace = Self::namespace_for(tenant);
        let vector_size = get_config().embedding_dimension as u64;
        self.index.ensure_namespace(&namespace, vector_size).await?;
        Ok(namespace)
    }

    /// Resolve a tenant's namespace without creating it.
    ///
    /// Listing and search degrade gracefully for tenants that never ingested
    /// anything, so absence is `None`, not an error.
    pub async fn get_namespace(
        &self,
        tenant: &TenantContext,
    ) -> Result<Option<NamespaceId>, RepositoryError> {
        let namespace = Self::namespace_for(tenant);
        if self.index.namespace_exists(&namespace).await? {
            Ok(Some(namespace))
        } else {
            Ok(None)
        }
    }

    /// Idempotently index extracted text under a namespace.
    ///
    /// When a live entry with the same content hash already exists, the call
    /// is a no-op returning the existing identity with `created = false`.
    /// Otherwise the entry is claimed `pending` through the index's
    /// conditional write, then marked `ready`; a failure between the two
    /// leaves it visible as `error`. Concurrent upserts of identical content
    /// race on the claim and exactly one of them reports `created = true`.
    pub async fn upsert_entry(
        &self,
        namespace: &NamespaceId,
        key: &str,
        text: String,
        content_hash: &str,
        metadata: EntryMetadata,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let entry_id = derive_entry_id(namespace, content_hash);

        if let Some(existing) = self.index.get_entry(namespace, &entry_id).await?
            && existing.status == EntryStatus::Ready
        {
            tracing::debug!(collection = %namespace, entry = %entry_id, "Entry already indexed, skipping");
            return Ok(UpsertOutcome {
                entry_id,
                created: false,
                replaced_storage_ref: None,
            });
        }

        let mut vectors = self
            .embeddings
            .generate_embeddings(vec![text.clone()])
            .await?;
        let vector = vectors.pop().ok_or_else(|| {
            EmbeddingClientError::GenerationFailed("provider returned no vectors".to_string())
        })?;

        let record = EntryRecord {
            entry_id: entry_id.clone(),
            key: key.to_string(),
            content_hash: content_hash.to_string(),
            status: EntryStatus::Pending,
            text,
            metadata,
            ingested_at: current_timestamp_rfc3339(),
        };
        let replaced = match self.index.claim_entry(namespace, record, vector).await? {
            ClaimOutcome::Claimed { replaced } => replaced,
            ClaimOutcome::Occupied(existing) => {
                tracing::debug!(collection = %namespace, entry = %entry_id, "Lost claim race, entry already live");
                return Ok(UpsertOutcome {
                    entry_id: existing.entry_id,
                    created: false,
                    replaced_storage_ref: None,
                });
            }
        };

        if let Err(error) = self
            .index
            .set_status(namespace, &entry_id, EntryStatus::Ready)
            .await
        {
            tracing::warn!(collection = %namespace, entry = %entry_id, error = %error, "Marking entry ready failed");
            if let Err(mark_error) = self
                .index
                .set_status(namespace, &entry_id, EntryStatus::Error)
                .await
            {
                tracing::warn!(entry = %entry_id, error = %mark_error, "Marking entry errored also failed");
            }
            return Err(error.into());
        }

        tracing::info!(collection = %namespace, entry = %entry_id, key, "Entry indexed");
        Ok(UpsertOutcome {
            entry_id,
            created: true,
            replaced_storage_ref: replaced.and_then(|record| record.metadata.storage_ref),
        })
    }

    /// Fetch a single entry by id.
    pub async fn get_entry(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
    ) -> Result<Option<EntryRecord>, RepositoryError> {
        Ok(self.index.get_entry(namespace, entry_id).await?)
    }

    /// Return one page of the namespace's entries in insertion order.
    ///
    /// Cursors are opaque strings passed through to the index unmodified.
    pub async fn list_entries(
        &self,
        namespace: &NamespaceId,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<EntryPage, RepositoryError> {
        Ok(self.index.list_page(namespace, cursor, page_size).await?)
    }

    /// Remove an entry and its index data. Blob release stays with the caller.
    pub async fn delete_entry(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
    ) -> Result<(), RepositoryError> {
        self.index.delete_entry(namespace, entry_id).await?;
        tracing::info!(collection = %namespace, entry = entry_id, "Entry removed");
        Ok(())
    }

    /// Rank the namespace's ready entries against a query.
    pub async fn search(
        &self,
        namespace: &NamespaceId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, RepositoryError> {
        let mut vectors = self
            .embeddings
            .generate_embeddings(vec![query_text.to_string()])
            .await?;
        let vector = vectors.pop().ok_or_else(|| {
            EmbeddingClientError::GenerationFailed("provider returned no vectors".to_string())
        })?;

        Ok(self.index.query(namespace, vector, limit).await?)
    }
}

/// Derive the stable entry id for content within a namespace.
///
/// The id is a UUIDv5 over `namespace:content_hash`, which is what makes the
/// dedup invariant hold under concurrency: identical uploads address the same
/// point in the index.
pub fn derive_entry_id(namespace: &NamespaceId, content_hash: &str) -> String {
    let name = format!("{}:{}", namespace.0, content_hash);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Fingerprint raw upload bytes for dedup. Thin re-export point so callers
/// outside the repository do not reach into the hashing module directly.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    fingerprint::content_hash(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG, Config};
    use crate::embedding::get_embedding_client;
    use crate::index::MemoryEntryIndex;
    use std::sync::Once;

    fn ensure_test_config() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = CONFIG.set(Config {
                index_url: "http://127.0.0.1:6333".into(),
                index_api_key: None,
                generation_url: "http://127.0.0.1:11434".into(),
                generation_api_key: None,
                generation_model: "test-model".into(),
                embedding_model: "test-embed".into(),
                embedding_dimension: 16,
                search_result_limit: 5,
                list_page_size: 10,
                server_port: None,
            });
        });
    }

    fn repository() -> EntryRepository {
        EntryRepository::new(Arc::new(MemoryEntryIndex::new()), get_embedding_client())
    }

    fn tenant(org: &str) -> TenantContext {
        TenantContext::new(org).expect("tenant")
    }

    fn metadata(org: &str) -> EntryMetadata {
        EntryMetadata {
            storage_ref: Some("blob-1".into()),
            uploaded_by: org.into(),
            filename: "doc.txt".into(),
            category: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_content_hash() {
        ensure_test_config();
        let repo = repository();
        let namespace = repo
            .get_or_create_namespace(&tenant("org-1"))
            .await
            .expect("namespace");

        let hash = fingerprint_bytes(b"identical bytes");
        let first = repo
            .upsert_entry(&namespace, "doc.txt", "text".into(), &hash, metadata("org-1"))
            .await
            .expect("first upsert");
        let second = repo
            .upsert_entry(&namespace, "doc.txt", "text".into(), &hash, metadata("org-1"))
            .await
            .expect("second upsert");

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.entry_id, second.entry_id);

        let page = repo
            .list_entries(&namespace, None, 10)
            .await
            .expect("page");
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].status, EntryStatus::Ready);
    }

    #[tokio::test]
    async fn same_bytes_in_two_namespaces_make_two_entries() {
        ensure_test_config();
        let repo = repository();
        let first_ns = repo
            .get_or_create_namespace(&tenant("org-1"))
            .await
            .expect("namespace");
        let second_ns = repo
            .get_or_create_namespace(&tenant("org-2"))
            .await
            .expect("namespace");

        let hash = fingerprint_bytes(b"shared content");
        let first = repo
            .upsert_entry(&first_ns, "a.txt", "text".into(), &hash, metadata("org-1"))
            .await
            .expect("upsert");
        let second = repo
            .upsert_entry(&second_ns, "a.txt", "text".into(), &hash, metadata("org-2"))
            .await
            .expect("upsert");

        assert!(first.created);
        assert!(second.created);
        assert_ne!(first.entry_id, second.entry_id);
    }

    #[tokio::test]
    async fn get_namespace_does_not_create() {
        ensure_test_config();
        let repo = repository();
        let absent = repo
            .get_namespace(&tenant("org-none"))
            .await
            .expect("lookup");
        assert!(absent.is_none());

        repo.get_or_create_namespace(&tenant("org-none"))
            .await
            .expect("create");
        let present = repo
            .get_namespace(&tenant("org-none"))
            .await
            .expect("lookup");
        assert!(present.is_some());
    }

    #[tokio::test]
    async fn search_returns_ready_matches() {
        ensure_test_config();
        let repo = repository();
        let namespace = repo
            .get_or_create_namespace(&tenant("org-1"))
            .await
            .expect("namespace");

        repo.upsert_entry(
            &namespace,
            "refunds.txt",
            "Our refund policy allows returns within 30 days.".into(),
            &fingerprint_bytes(b"refund doc"),
            metadata("org-1"),
        )
        .await
        .expect("upsert");

        let results = repo
            .search(&namespace, "refund policy", 5)
            .await
            .expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.key, "refunds.txt");
    }

    #[test]
    fn derived_entry_ids_are_stable_and_namespace_scoped() {
        let ns_a = NamespaceId("kb_org-1".into());
        let ns_b = NamespaceId("kb_org-2".into());
        assert_eq!(derive_entry_id(&ns_a, "hash"), derive_entry_id(&ns_a, "hash"));
        assert_ne!(derive_entry_id(&ns_a, "hash"), derive_entry_id(&ns_b, "hash"));
    }
}
