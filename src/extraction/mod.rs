//! Format-aware extraction routing.
//!
//! Dispatches an upload to the extraction strategy for its media family and
//! returns normalized text. Strategies are remote generation calls with a
//! fixed system instruction per family; this module owns prompt selection,
//! never generation itself. Retry policy stays with the ingestion
//! orchestrator.

use crate::generation::{GenerationError, GenerationPart, TextGenerator};
use crate::storage::{BlobRef, BlobStore, StorageError};
use std::sync::Arc;
use thiserror::Error;

/// Raster formats accepted by the image-transcription strategy.
const SUPPORTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// System instruction for the image strategy.
const IMAGE_INSTRUCTION: &str = "You turn images into text. If it is a photo of a document, \
     transcribe it. If it is not a document, describe it.";

/// System instruction for the PDF strategy.
const PDF_INSTRUCTION: &str = "You transform PDF files into text.";

/// System instruction for the markup-normalization strategy.
const MARKUP_INSTRUCTION: &str = "You transform content into markdown.";

const PDF_REQUEST: &str =
    "Extract the text from the PDF and print it without explaining you'll do so.";

const MARKUP_REQUEST: &str =
    "Extract the text and print it in a markdown format without explaining that you'll do so.";

/// Errors raised while routing or running extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No extraction strategy handles the detected media type.
    #[error("Unsupported file type: {media_type}")]
    UnsupportedFormat {
        /// Media type that matched no supported family.
        media_type: String,
    },
    /// Generation backend failed while running a strategy.
    #[error("Extraction failed: {0}")]
    Generation(#[from] GenerationError),
    /// Declared text content did not decode as UTF-8.
    #[error("Extraction failed: file is not valid UTF-8")]
    Decode(#[from] std::string::FromUtf8Error),
    /// Blob store failed to produce a URL for a stored upload.
    #[error("Extraction failed: {0}")]
    Storage(#[from] StorageError),
}

impl ExtractionError {
    /// Whether the error names a media type with no route at all, as opposed
    /// to a transient strategy failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. })
    }
}

/// Routes `(media type, bytes)` pairs to the right extraction strategy.
pub struct ExtractionRouter {
    generator: Arc<dyn TextGenerator>,
    blobs: Arc<dyn BlobStore>,
}

impl ExtractionRouter {
    /// Build a router over the shared generation backend and blob store.
    pub fn new(generator: Arc<dyn TextGenerator>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { generator, blobs }
    }

    /// Convert an upload into normalized text.
    ///
    /// Routing is checked in order, first match wins: raster allow-list,
    /// media types containing `pdf`, media types containing `text`, then
    /// [`ExtractionError::UnsupportedFormat`]. `text/plain` decodes verbatim
    /// with no external call; every other text subtype goes through the
    /// markup-normalization strategy.
    pub async fn extract(
        &self,
        media_type: &str,
        bytes: &[u8],
        filename: &str,
        blob_ref: &BlobRef,
    ) -> Result<String, ExtractionError> {
        let lowered = media_type.to_lowercase();

        if SUPPORTED_IMAGE_TYPES.contains(&media_type) {
            return self.extract_image(blob_ref).await;
        }
        if lowered.contains("pdf") {
            return self.extract_pdf(blob_ref, media_type, filename).await;
        }
        if lowered.contains("text") {
            return self.extract_text(bytes, &lowered).await;
        }

        Err(ExtractionError::UnsupportedFormat {
            media_type: media_type.to_string(),
        })
    }

    async fn extract_image(&self, blob_ref: &BlobRef) -> Result<String, ExtractionError> {
        let url = self.blobs.get_url(blob_ref).await?;
        tracing::debug!(blob = %blob_ref, "Routing upload to image strategy");
        let text = self
            .generator
            .generate(IMAGE_INSTRUCTION, vec![GenerationPart::ImageUrl(url)])
            .await?;
        Ok(text)
    }

    async fn extract_pdf(
        &self,
        blob_ref: &BlobRef,
        media_type: &str,
        filename: &str,
    ) -> Result<String, ExtractionError> {
        let url = self.blobs.get_url(blob_ref).await?;
        tracing::debug!(blob = %blob_ref, filename, "Routing upload to PDF strategy");
        let text = self
            .generator
            .generate(
                PDF_INSTRUCTION,
                vec![
                    GenerationPart::FileUrl {
                        url,
                        media_type: media_type.to_string(),
                        filename: filename.to_string(),
                    },
                    GenerationPart::Text(PDF_REQUEST.to_string()),
                ],
            )
            .await?;
        Ok(text)
    }

    async fn extract_text(
        &self,
        bytes: &[u8],
        lowered_media_type: &str,
    ) -> Result<String, ExtractionError> {
        let text = String::from_utf8(bytes.to_vec())?;

        if lowered_media_type == "text/plain" {
            return Ok(text);
        }

        tracing::debug!(media_type = lowered_media_type, "Normalizing markup to markdown");
        let markdown = self
            .generator
            .generate(
                MARKUP_INSTRUCTION,
                vec![
                    GenerationPart::Text(text),
                    GenerationPart::Text(MARKUP_REQUEST.to_string()),
                ],
            )
            .await?;
        Ok(markdown)
    }
}
