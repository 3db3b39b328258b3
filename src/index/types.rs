//! Shared types used by the entry index implementations.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while interacting with the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid index URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Index responded with an unexpected status code.
    #[error("Unexpected index response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the index.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Backend-specific failure outside the HTTP protocol.
    #[error("Index backend failed: {0}")]
    Backend(String),
}

/// Tenant-scoped isolation boundary; names one collection in the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub String);

impl std::fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an ingested entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Ingestion accepted, index write still in flight.
    Pending,
    /// Indexed and searchable.
    Ready,
    /// Ingestion failed after the entry was recorded.
    Error,
}

impl EntryStatus {
    /// Stable string form stored in index payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Parse the stored string form, treating unknown values as `Error`.
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "ready" => Self::Ready,
            _ => Self::Error,
        }
    }
}

/// Tenant-supplied attributes carried on each entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Reference to the stored original blob.
    pub storage_ref: Option<String>,
    /// Tenant that uploaded the file.
    pub uploaded_by: String,
    /// Original filename as uploaded.
    pub filename: String,
    /// Optional UI category.
    pub category: Option<String>,
}

/// One ingested document as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Stable identifier, unique within the system.
    pub entry_id: String,
    /// Logical name (original filename); human identification, not unique.
    pub key: String,
    /// Fingerprint of the original bytes, used for dedup.
    pub content_hash: String,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Normalized extracted text.
    pub text: String,
    /// Tenant-supplied attributes.
    pub metadata: EntryMetadata,
    /// RFC3339 ingestion timestamp; drives stable listing order.
    pub ingested_at: String,
}

/// Result of a conditional entry write.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The point was written under this caller's record.
    Claimed {
        /// Errored record the write replaced, when one existed. Releasing
        /// the blob it references is the caller's responsibility.
        replaced: Option<EntryRecord>,
    },
    /// A live (`pending` or `ready`) point already holds the id; nothing
    /// was written.
    Occupied(EntryRecord),
}

/// One page of a namespace listing.
#[derive(Debug, Clone, Default)]
pub struct EntryPage {
    /// Entries on this page, in insertion order.
    pub entries: Vec<EntryRecord>,
    /// Whether this is the final page.
    pub is_done: bool,
    /// Opaque continuation cursor; empty when `is_done`.
    pub continue_cursor: String,
}

/// Ranked match returned from a semantic query.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    /// The matched entry.
    pub record: EntryRecord,
    /// Similarity score reported by the index.
    pub score: f32,
}
