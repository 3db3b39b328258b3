//! Read-only file projections for listing UIs.
//!
//! A [`PublicFile`] is derived from an entry per list request and never
//! persisted; size and URL come from the blob store at projection time.

use crate::index::{EntryRecord, EntryStatus};
use crate::storage::{BlobRef, BlobStore};
use serde::Serialize;

/// Listing status shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Entry is indexed and searchable.
    Ready,
    /// Ingestion is still in flight.
    Processing,
    /// Ingestion failed; re-upload is the only recovery.
    Error,
}

/// Derived, read-only view of an entry for file-management UIs.
#[derive(Debug, Clone, Serialize)]
pub struct PublicFile {
    /// Entry identifier.
    pub id: String,
    /// Display name (original filename).
    pub name: String,
    /// Lower-cased filename extension.
    #[serde(rename = "type")]
    pub file_type: String,
    /// Human-formatted size string.
    pub size: String,
    /// Projected lifecycle status.
    pub status: FileStatus,
    /// Retrievable URL of the original blob, when it still exists.
    pub url: Option<String>,
    /// Optional UI category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Project an entry into its public file view.
///
/// Blob-store failures degrade the row (unknown size, no URL) rather than
/// failing the whole listing.
pub async fn project_entry(entry: &EntryRecord, blobs: &dyn BlobStore) -> PublicFile {
    let mut size = "unknown".to_string();
    let mut url = None;

    if let Some(storage_ref) = entry
        .metadata
        .storage_ref
        .as_ref()
        .filter(|value| !value.is_empty())
    {
        let blob_ref = BlobRef(storage_ref.clone());
        match blobs.size_of(&blob_ref).await {
            Ok(bytes) => size = format_file_size(bytes),
            Err(error) => {
                tracing::error!(entry = %entry.entry_id, error = %error, "Failed to get blob size")
            }
        }
        url = blobs.get_url(&blob_ref).await.ok();
    }

    let name = if entry.key.is_empty() {
        "Unknown".to_string()
    } else {
        entry.key.clone()
    };
    let file_type = name
        .rsplit('.')
        .next()
        .filter(|ext| *ext != name)
        .map(str::to_lowercase)
        .unwrap_or_else(|| "txt".to_string());

    let status = match entry.status {
        EntryStatus::Ready => FileStatus::Ready,
        EntryStatus::Pending => FileStatus::Processing,
        EntryStatus::Error => FileStatus::Error,
    };

    PublicFile {
        id: entry.entry_id.clone(),
        name,
        file_type,
        size,
        status,
        url,
        category: entry.metadata.category.clone(),
    }
}

/// Format a byte count as `"{value} {unit}"` with one decimal place.
///
/// The unit is chosen by `floor(log_1024(bytes))`; zero bytes render as
/// `"0.0 B"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0.0 B".to_string();
    }

    let exponent = ((bytes as f64).ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(exponent as i32);
    format!("{:.1} {}", value, UNITS[exponent])
}
