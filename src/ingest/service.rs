//! Ingestion service coordinating detection, extraction, and indexing.

use crate::config::get_config;
use crate::detect::detect_media_type;
use crate::extraction::ExtractionRouter;
use crate::files::project_entry;
use crate::index::EntryMetadata;
use crate::ingest::types::{
    AddFileOutcome, AddFileRequest, FilePage, IngestError, ListFilesRequest,
};
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::repository::{EntryRepository, derive_entry_id, fingerprint_bytes};
use crate::storage::{BlobRef, BlobStore};
use crate::tenant::TenantContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Coordinates the full upload pipeline: format detection, blob storage,
/// extraction, fingerprinting, and namespace-scoped indexing.
///
/// The service owns long-lived handles to the blob store, extraction router,
/// and repository so that every surface reuses the same components. Construct
/// it once near process start and share it through an `Arc`.
pub struct IngestService {
    blobs: Arc<dyn BlobStore>,
    router: ExtractionRouter,
    repository: Arc<EntryRepository>,
    metrics: Arc<IngestMetrics>,
}

/// Abstraction over the ingestion pipeline used by external surfaces.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Store, extract, fingerprint, and index one upload. Idempotent per
    /// tenant and content hash.
    async fn add_file(
        &self,
        tenant: &TenantContext,
        request: AddFileRequest,
    ) -> Result<AddFileOutcome, IngestError>;

    /// Return one page of the tenant's files as public views.
    async fn list_files(
        &self,
        tenant: &TenantContext,
        request: ListFilesRequest,
    ) -> Result<FilePage, IngestError>;

    /// Remove a file the tenant owns, releasing its blob and index data.
    async fn delete_file(&self, tenant: &TenantContext, entry_id: &str) -> Result<(), IngestError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl IngestService {
    /// Build a new ingestion service over shared components.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        router: ExtractionRouter,
        repository: Arc<EntryRepository>,
    ) -> Self {
        Self {
            blobs,
            router,
            repository,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Ingest one upload for a tenant.
    ///
    /// The blob is stored before extraction so strategies can reference it by
    /// URL, and released again when extraction fails or the content is a
    /// duplicate. The only case a blob is retained is a successful, novel
    /// ingestion (plus the index-failure case, where the entry stays visible
    /// as `error` and the listing still needs the blob).
    pub async fn add_file(
        &self,
        tenant: &TenantContext,
        request: AddFileRequest,
    ) -> Result<AddFileOutcome, IngestError> {
        let AddFileRequest {
            filename,
            media_type,
            bytes,
            category,
        } = request;

        let media_type = media_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| detect_media_type(&filename, &bytes));
        tracing::info!(tenant = %tenant.org_id, filename, media_type, "Processing upload");

        let blob_ref = self.blobs.store(bytes.clone(), &media_type).await?;

        let text = match self
            .router
            .extract(&media_type, &bytes, &filename, &blob_ref)
            .await
        {
            Ok(text) => text,
            Err(error) => {
                self.metrics.record_failure();
                self.release_blob(&blob_ref).await;
                tracing::warn!(tenant = %tenant.org_id, filename, error = %error, "Extraction failed");
                return Err(error.into());
            }
        };

        let content_hash = fingerprint_bytes(&bytes);
        let namespace = self.repository.get_or_create_namespace(tenant).await?;
        let metadata = EntryMetadata {
            storage_ref: Some(blob_ref.0.clone()),
            uploaded_by: tenant.org_id.clone(),
            filename: filename.clone(),
            category,
        };

        let outcome = match self
            .repository
            .upsert_entry(&namespace, &filename, text, &content_hash, metadata)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                self.metrics.record_failure();
                // A failure before anything was written must not strand the
                // blob. When an entry made it into the index (the `error`
                // state keeps the listing honest) the blob stays with it.
                let entry_id = derive_entry_id(&namespace, &content_hash);
                if let Ok(None) = self.repository.get_entry(&namespace, &entry_id).await {
                    self.release_blob(&blob_ref).await;
                }
                return Err(error.into());
            }
        };

        self.metrics.record_ingest(outcome.created);

        if !outcome.created {
            // Duplicate: drop this upload's blob and hand back the original.
            tracing::debug!(entry = %outcome.entry_id, "Entry already exists, releasing duplicate blob");
            self.release_blob(&blob_ref).await;
            let url = self.existing_entry_url(&namespace, &outcome.entry_id).await;
            return Ok(AddFileOutcome {
                entry_id: outcome.entry_id,
                url,
                created: false,
            });
        }

        if let Some(stale_ref) = outcome
            .replaced_storage_ref
            .filter(|value| !value.is_empty() && *value != blob_ref.0)
        {
            // Re-ingesting content whose earlier attempt errored replaces the
            // record; the blob that attempt stored is now unreachable.
            tracing::debug!(blob = %stale_ref, "Releasing blob from replaced errored attempt");
            self.release_blob(&BlobRef(stale_ref)).await;
        }

        let url = self.blobs.get_url(&blob_ref).await.ok();
        Ok(AddFileOutcome {
            entry_id: outcome.entry_id,
            url,
            created: true,
        })
    }

    /// Return one page of the tenant's files, projected for listing UIs.
    ///
    /// Cursors pass through unmodified. A tenant with no namespace gets an
    /// empty, done page rather than an error.
    pub async fn list_files(
        &self,
        tenant: &TenantContext,
        request: ListFilesRequest,
    ) -> Result<FilePage, IngestError> {
        let Some(namespace) = self.repository.get_namespace(tenant).await? else {
            return Ok(FilePage {
                page: Vec::new(),
                is_done: true,
                continue_cursor: String::new(),
            });
        };

        let page_size = request
            .page_size
            .unwrap_or_else(|| get_config().list_page_size);
        let entries = self
            .repository
            .list_entries(&namespace, request.cursor, page_size)
            .await?;

        let mut page = Vec::with_capacity(entries.entries.len());
        for entry in &entries.entries {
            page.push(project_entry(entry, self.blobs.as_ref()).await);
        }

        if let Some(category) = request
            .category
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            page.retain(|file| file.category.as_deref() == Some(category));
        }

        Ok(FilePage {
            page,
            is_done: entries.is_done,
            continue_cursor: entries.continue_cursor,
        })
    }

    /// Remove a file the tenant owns.
    pub async fn delete_file(
        &self,
        tenant: &TenantContext,
        entry_id: &str,
    ) -> Result<(), IngestError> {
        let namespace = self
            .repository
            .get_namespace(tenant)
            .await?
            .ok_or_else(|| IngestError::NotFound("namespace".to_string()))?;

        let entry = self
            .repository
            .get_entry(&namespace, entry_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("entry {entry_id}")))?;

        if entry.metadata.uploaded_by != tenant.org_id {
            return Err(IngestError::Unauthorized(
                "you are not the owner of this file".to_string(),
            ));
        }

        if let Some(storage_ref) = entry
            .metadata
            .storage_ref
            .as_ref()
            .filter(|value| !value.is_empty())
        {
            self.release_blob(&BlobRef(storage_ref.clone())).await;
        }

        self.repository.delete_entry(&namespace, entry_id).await?;
        tracing::info!(tenant = %tenant.org_id, entry = entry_id, "File deleted");
        Ok(())
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shared handle to the activity counters, for surfaces that record
    /// their own events (search).
    pub fn metrics_handle(&self) -> Arc<IngestMetrics> {
        self.metrics.clone()
    }

    async fn release_blob(&self, blob_ref: &BlobRef) {
        if let Err(error) = self.blobs.delete(blob_ref).await {
            tracing::warn!(blob = %blob_ref, error = %error, "Failed to release blob");
        }
    }

    async fn existing_entry_url(
        &self,
        namespace: &crate::index::NamespaceId,
        entry_id: &str,
    ) -> Option<String> {
        let entry = self
            .repository
            .get_entry(namespace, entry_id)
            .await
            .ok()??;
        let storage_ref = entry.metadata.storage_ref?;
        self.blobs.get_url(&BlobRef(storage_ref)).await.ok()
    }
}

#[async_trait]
impl IngestApi for IngestService {
    async fn add_file(
        &self,
        tenant: &TenantContext,
        request: AddFileRequest,
    ) -> Result<AddFileOutcome, IngestError> {
        IngestService::add_file(self, tenant, request).await
    }

    async fn list_files(
        &self,
        tenant: &TenantContext,
        request: ListFilesRequest,
    ) -> Result<FilePage, IngestError> {
        IngestService::list_files(self, tenant, request).await
    }

    async fn delete_file(&self, tenant: &TenantContext, entry_id: &str) -> Result<(), IngestError> {
        IngestService::delete_file(self, tenant, entry_id).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestService::metrics_snapshot(self)
    }
}
