//! Semantic retrieval and context assembly for the support agent.
//!
//! `search` ranks a tenant's ready entries for a query; `answer_question`
//! is the agent tool path: resolve the thread's tenant, search, assemble a
//! bounded grounding context, generate an interpreted answer, and persist it
//! on the thread.

use crate::config::get_config;
use crate::generation::{GenerationError, GenerationPart, TextGenerator};
use crate::metrics::IngestMetrics;
use crate::repository::{EntryRepository, RepositoryError};
use crate::tenant::TenantContext;
use crate::threads::{ThreadStore, ThreadStoreError};
use std::sync::Arc;
use thiserror::Error;

/// System instruction for the search interpreter.
const INTERPRETER_INSTRUCTION: &str = "You are a customer support agent. Answer the user's \
     question using only the provided search results from the organization's knowledge base. \
     If the results do not contain the answer, say you could not find it and suggest \
     contacting support.";

/// Errors emitted while orchestrating searches and answers.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Thread could not be resolved to a tenant.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Repository or index interaction failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Answer generation failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Thread store interaction failed.
    #[error(transparent)]
    Threads(#[from] ThreadStoreError),
}

/// One ranked match returned to callers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchMatch {
    /// Identity of the matched entry.
    pub entry_id: String,
    /// Entry title (its logical key).
    pub title: String,
    /// Matched text snippet.
    pub text: String,
    /// Similarity score reported by the index.
    pub score: f32,
}

/// Ranked matches plus the pre-concatenated context block.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SearchOutcome {
    /// Up to `limit` ranked matches.
    pub entries: Vec<SearchMatch>,
    /// Matched texts concatenated in rank order.
    pub text: String,
}

/// Retrieval engine and context assembler.
pub struct RetrievalService {
    repository: Arc<EntryRepository>,
    generator: Arc<dyn TextGenerator>,
    threads: Arc<dyn ThreadStore>,
    metrics: Arc<IngestMetrics>,
}

impl RetrievalService {
    /// Build a retrieval service over shared components.
    pub fn new(
        repository: Arc<EntryRepository>,
        generator: Arc<dyn TextGenerator>,
        threads: Arc<dyn ThreadStore>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            repository,
            generator,
            threads,
            metrics,
        }
    }

    /// Rank the tenant's ready entries against a query.
    ///
    /// A tenant with no namespace, or a namespace with no matches, yields an
    /// empty outcome rather than an error.
    pub async fn search(
        &self,
        tenant: &TenantContext,
        query: &str,
        limit: Option<usize>,
    ) -> Result<SearchOutcome, SearchError> {
        self.metrics.record_search();
        let Some(namespace) = self.repository.get_namespace(tenant).await? else {
            tracing::debug!(tenant = %tenant.org_id, "No namespace yet, returning empty result");
            return Ok(SearchOutcome::default());
        };

        let limit = limit.unwrap_or_else(|| get_config().search_result_limit);
        let scored = self.repository.search(&namespace, query, limit).await?;

        let entries: Vec<SearchMatch> = scored
            .into_iter()
            .map(|hit| SearchMatch {
                entry_id: hit.record.entry_id,
                title: hit.record.key,
                text: hit.record.text,
                score: hit.score,
            })
            .collect();
        let text = entries
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        tracing::debug!(tenant = %tenant.org_id, matches = entries.len(), "Search completed");
        Ok(SearchOutcome { entries, text })
    }

    /// Answer a user question on a conversation thread.
    ///
    /// The assembled answer is persisted as an assistant message on the
    /// thread before it is returned. Zero search results still produce a
    /// well-formed answer from an empty context.
    pub async fn answer_question(
        &self,
        thread_id: &str,
        query: &str,
    ) -> Result<String, SearchError> {
        let org_id = self
            .threads
            .tenant_for_thread(thread_id)
            .await?
            .ok_or_else(|| SearchError::NotFound(format!("thread {thread_id}")))?;
        let tenant = TenantContext::new(org_id)
            .ok_or_else(|| SearchError::NotFound(format!("tenant for thread {thread_id}")))?;

        let outcome = self.search(&tenant, query, None).await?;
        let context = assemble_context(&outcome);

        let answer = self
            .generator
            .generate(
                INTERPRETER_INSTRUCTION,
                vec![GenerationPart::Text(format!(
                    "User asked: \"{query}\"\n\nSearch results: {context}"
                ))],
            )
            .await?;

        self.threads
            .append_assistant_message(thread_id, &answer)
            .await?;
        tracing::info!(thread = thread_id, matches = outcome.entries.len(), "Answer persisted");
        Ok(answer)
    }
}

/// Build the bounded grounding context handed to the interpreter.
///
/// Lists distinct, non-empty titles that contributed results, then the
/// concatenated matched text.
fn assemble_context(outcome: &SearchOutcome) -> String {
    let mut titles: Vec<&str> = Vec::new();
    for entry in &outcome.entries {
        let title = entry.title.trim();
        if !title.is_empty() && !titles.contains(&title) {
            titles.push(title);
        }
    }

    format!(
        "Found results in {}. Here is the context:\n\n{}",
        titles.join(","),
        outcome.text
    )
}
