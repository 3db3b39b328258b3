//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use super::{GenerationError, GenerationPart, TextGenerator};
use crate::config::get_config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Generation client speaking the chat-completions wire format.
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpGenerator {
    /// Construct a client from the loaded configuration.
    ///
    /// Requests carry a hard timeout so a stalled model call surfaces as a
    /// generation failure instead of hanging an ingestion task.
    pub fn new() -> Result<Self, GenerationError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("support-kb/0.3")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| GenerationError::GenerationFailed(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.generation_url.trim_end_matches('/').to_string(),
            api_key: config.generation_api_key.clone(),
            model: config.generation_model.clone(),
        })
    }

    #[cfg(test)]
    fn with_endpoint(base_url: String, model: String) -> Self {
        Self {
            client: Client::builder()
                .user_agent("support-kb-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
            model,
        }
    }

    fn serialize_part(part: GenerationPart) -> Value {
        match part {
            GenerationPart::Text(text) => json!({ "type": "text", "text": text }),
            GenerationPart::ImageUrl(url) => json!({
                "type": "image_url",
                "image_url": { "url": url }
            }),
            GenerationPart::FileUrl {
                url,
                media_type,
                filename,
            } => json!({
                "type": "file",
                "file": {
                    "url": url,
                    "media_type": media_type,
                    "filename": filename
                }
            }),
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(
        &self,
        system_instruction: &str,
        parts: Vec<GenerationPart>,
    ) -> Result<String, GenerationError> {
        let content: Vec<Value> = parts.into_iter().map(Self::serialize_part).collect();
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_instruction },
                { "role": "user", "content": content }
            ]
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| GenerationError::GenerationFailed(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Generation request failed");
            return Err(GenerationError::GenerationFailed(format!(
                "unexpected status {status}: {body}"
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::GenerationFailed(err.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                GenerationError::GenerationFailed("completion contained no choices".to_string())
            })
    }
}
