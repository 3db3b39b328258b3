//! Ingestion orchestration: detect, extract, fingerprint, index.

mod service;
mod types;

pub use service::{IngestApi, IngestService};
pub use types::{AddFileOutcome, AddFileRequest, FilePage, IngestError, ListFilesRequest};
