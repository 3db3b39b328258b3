//! Text-generation abstraction used by extraction and answer assembly.
//!
//! The core treats generation as a remote, stateless function: a fixed system
//! instruction plus a list of user-message parts in, text out. Strategies and
//! the retrieval interpreter all go through the same trait so tests can swap
//! in scripted generators.

mod http;

pub use http::HttpGenerator;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by generation backends.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Backend failed to produce a completion for the supplied input.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
}

/// One part of the user message sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationPart {
    /// Inline text content.
    Text(String),
    /// Retrievable URL of an image the model should read.
    ImageUrl(String),
    /// Retrievable URL of a document file, with its declared type and name.
    FileUrl {
        /// URL the backend can fetch the file from.
        url: String,
        /// Declared media type of the file.
        media_type: String,
        /// Original filename, for backends that key parsing off it.
        filename: String,
    },
}

/// Interface implemented by text-generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a completion for the given system instruction and message parts.
    async fn generate(
        &self,
        system_instruction: &str,
        parts: Vec<GenerationPart>,
    ) -> Result<String, GenerationError>;
}
