//! Request, outcome, and error types for the ingestion pipeline.

use crate::extraction::ExtractionError;
use crate::files::PublicFile;
use crate::repository::RepositoryError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors emitted by the ingestion orchestrator.
///
/// Duplicate content is deliberately absent: a second upload of identical
/// bytes is a success path reported through [`AddFileOutcome::created`].
#[derive(Debug, Error)]
pub enum IngestError {
    /// Caller is not allowed to act on the target resource.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Entry or namespace does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Extraction routing or strategy failed; no entry was created.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Repository or index interaction failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Blob store interaction failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One upload handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct AddFileRequest {
    /// Original filename.
    pub filename: String,
    /// Declared media type; detected from bytes/extension when absent.
    pub media_type: Option<String>,
    /// Raw file content.
    pub bytes: Vec<u8>,
    /// Optional UI category stored with the entry.
    pub category: Option<String>,
}

/// Result of an `add_file` call.
#[derive(Debug, Clone)]
pub struct AddFileOutcome {
    /// Identity of the entry holding this content.
    pub entry_id: String,
    /// Retrievable URL of the backing blob, when one is resolvable.
    pub url: Option<String>,
    /// `false` when identical content was already indexed for this tenant.
    pub created: bool,
}

/// Pagination and filter options for a file listing.
#[derive(Debug, Clone, Default)]
pub struct ListFilesRequest {
    /// Opaque continuation cursor from a previous page.
    pub cursor: Option<String>,
    /// Page size override; the configured default applies when absent.
    pub page_size: Option<usize>,
    /// Restrict the page to files in this category.
    pub category: Option<String>,
}

/// One page of projected file views.
#[derive(Debug, Clone, Default)]
pub struct FilePage {
    /// Files on this page, in insertion order.
    pub page: Vec<PublicFile>,
    /// Whether this is the final page.
    pub is_done: bool,
    /// Opaque continuation cursor; empty when `is_done`.
    pub continue_cursor: String,
}
