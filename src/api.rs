//! HTTP surface for Support KB.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /files` – Ingest one upload (raw body; filename/category in the query string,
//!   media type from `content-type`, tenant from `x-tenant-id`). Returns the entry identity
//!   and whether it was newly created or deduplicated.
//! - `GET /files` – Page through the tenant's files as public views (`cursor`, `page_size`,
//!   optional `category` filter).
//! - `DELETE /files/{entry_id}` – Remove an owned file, releasing its blob and index data.
//! - `POST /search` – Rank the tenant's entries against a query.
//! - `POST /answers` – Agent tool path: search on behalf of a conversation thread and
//!   persist the generated answer.
//! - `GET /metrics` – Observe ingestion and search counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Every tenant-scoped endpoint trusts the pre-resolved `x-tenant-id` header; resolving
//! identity is an upstream concern.

use crate::ingest::{AddFileRequest, IngestApi, IngestError, ListFilesRequest};
use crate::retrieval::{RetrievalService, SearchError};
use crate::tenant::TenantContext;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared handler state: the ingestion pipeline plus the retrieval engine.
pub struct AppState<S> {
    ingest: Arc<S>,
    retrieval: Arc<RetrievalService>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ingest: self.ingest.clone(),
            retrieval: self.retrieval.clone(),
        }
    }
}

/// Build the HTTP router exposing the ingestion and retrieval surface.
pub fn create_router<S>(ingest: Arc<S>, retrieval: Arc<RetrievalService>) -> Router
where
    S: IngestApi + 'static,
{
    Router::new()
        .route("/files", post(upload_file::<S>).get(list_files::<S>))
        .route("/files/:entry_id", axum::routing::delete(delete_file::<S>))
        .route("/search", post(search::<S>))
        .route("/answers", post(answer::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(AppState { ingest, retrieval })
}

fn resolve_tenant(headers: &HeaderMap) -> Result<TenantContext, AppError> {
    headers
        .get("x-tenant-id")
        .and_then(|value| value.to_str().ok())
        .and_then(TenantContext::new)
        .ok_or_else(|| AppError::Unauthorized("missing or invalid x-tenant-id header".into()))
}

/// Query parameters for the `POST /files` endpoint.
#[derive(Deserialize)]
struct UploadParams {
    /// Original filename of the upload.
    filename: String,
    /// Optional UI category stored with the entry.
    #[serde(default)]
    category: Option<String>,
}

/// Success response for the `POST /files` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    /// Identity of the entry holding this content.
    entry_id: String,
    /// Retrievable URL of the backing blob, when resolvable.
    url: Option<String>,
    /// `false` when identical content was already indexed for this tenant.
    created: bool,
}

/// Ingest one upload for the calling tenant.
async fn upload_file<S>(
    State(state): State<AppState<S>>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError>
where
    S: IngestApi + 'static,
{
    let tenant = resolve_tenant(&headers)?;
    let media_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    // Detached task: blob and index state must not be left half-committed
    // when the uploader disconnects mid-request.
    let ingest = state.ingest.clone();
    let task_tenant = tenant.clone();
    let request = AddFileRequest {
        filename: params.filename,
        media_type,
        bytes: body.to_vec(),
        category: params.category,
    };
    let outcome = tokio::spawn(async move { ingest.add_file(&task_tenant, request).await })
        .await
        .map_err(|err| AppError::Internal(err.to_string()))??;

    tracing::info!(
        tenant = %tenant.org_id,
        entry = %outcome.entry_id,
        created = outcome.created,
        "Upload request completed"
    );
    Ok(Json(UploadResponse {
        entry_id: outcome.entry_id,
        url: outcome.url,
        created: outcome.created,
    }))
}

/// Query parameters for the `GET /files` endpoint.
#[derive(Deserialize)]
struct ListParams {
    /// Opaque continuation cursor from a previous page.
    #[serde(default)]
    cursor: Option<String>,
    /// Page size override.
    #[serde(default)]
    page_size: Option<usize>,
    /// Restrict the page to files in this category.
    #[serde(default)]
    category: Option<String>,
}

/// Response body for `GET /files`.
#[derive(Serialize)]
struct ListResponse {
    page: Vec<crate::files::PublicFile>,
    is_done: bool,
    continue_cursor: String,
}

/// Return one page of the tenant's files.
async fn list_files<S>(
    State(state): State<AppState<S>>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<Json<ListResponse>, AppError>
where
    S: IngestApi,
{
    let tenant = resolve_tenant(&headers)?;
    let page = state
        .ingest
        .list_files(
            &tenant,
            ListFilesRequest {
                cursor: params.cursor,
                page_size: params.page_size,
                category: params.category,
            },
        )
        .await?;

    Ok(Json(ListResponse {
        page: page.page,
        is_done: page.is_done,
        continue_cursor: page.continue_cursor,
    }))
}

/// Remove an owned file.
async fn delete_file<S>(
    State(state): State<AppState<S>>,
    Path(entry_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError>
where
    S: IngestApi,
{
    let tenant = resolve_tenant(&headers)?;
    state.ingest.delete_file(&tenant, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for the `POST /search` endpoint.
#[derive(Deserialize)]
struct SearchBody {
    /// Natural language query.
    query: String,
    /// Optional result-count override.
    #[serde(default)]
    limit: Option<usize>,
}

/// Rank the tenant's entries against a query.
async fn search<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> Result<Json<crate::retrieval::SearchOutcome>, AppError>
where
    S: IngestApi,
{
    let tenant = resolve_tenant(&headers)?;
    let outcome = state
        .retrieval
        .search(&tenant, &body.query, body.limit)
        .await?;
    Ok(Json(outcome))
}

/// Request body for the `POST /answers` endpoint.
#[derive(Deserialize)]
struct AnswerBody {
    /// Conversation thread the question was asked on.
    thread_id: String,
    /// The user's question.
    query: String,
}

/// Response body for `POST /answers`.
#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

/// Search on behalf of a thread and persist the generated answer.
async fn answer<S>(
    State(state): State<AppState<S>>,
    Json(body): Json<AnswerBody>,
) -> Result<Json<AnswerResponse>, AppError>
where
    S: IngestApi,
{
    let answer = state
        .retrieval
        .answer_question(&body.thread_id, &body.query)
        .await?;
    Ok(Json(AnswerResponse { answer }))
}

/// Return a concise metrics snapshot with activity counters.
async fn get_metrics<S>(
    State(state): State<AppState<S>>,
) -> Json<crate::metrics::MetricsSnapshot>
where
    S: IngestApi,
{
    Json(state.ingest.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload_file",
                method: "POST",
                path: "/files",
                description: "Ingest one upload: detect its format, extract text, and index it for the calling tenant. Body is the raw file; filename and category ride the query string.",
                request_example: Some(json!({
                    "query": { "filename": "manual.pdf", "category": "guides" },
                    "headers": { "x-tenant-id": "org-123", "content-type": "application/pdf" }
                })),
            },
            CommandDescriptor {
                name: "list_files",
                method: "GET",
                path: "/files",
                description: "Page through the tenant's files as public views: name, extension, human size, status, URL.",
                request_example: Some(json!({
                    "query": { "cursor": "", "page_size": 10, "category": "guides" }
                })),
            },
            CommandDescriptor {
                name: "delete_file",
                method: "DELETE",
                path: "/files/{entry_id}",
                description: "Remove an owned file, releasing its blob and index data.",
                request_example: None,
            },
            CommandDescriptor {
                name: "search",
                method: "POST",
                path: "/search",
                description: "Rank the tenant's ready entries against a query; returns matches plus a concatenated context block.",
                request_example: Some(json!({ "query": "refund policy", "limit": 5 })),
            },
            CommandDescriptor {
                name: "answer",
                method: "POST",
                path: "/answers",
                description: "Search on behalf of a conversation thread and persist the generated answer as an assistant message.",
                request_example: Some(json!({ "thread_id": "thread-1", "query": "What is the refund policy?" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return activity counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Unauthorized(String),
    Ingest(IngestError),
    Search(SearchError),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            Self::Ingest(IngestError::Unauthorized(message)) => {
                (StatusCode::UNAUTHORIZED, message)
            }
            Self::Ingest(IngestError::NotFound(message)) => (StatusCode::NOT_FOUND, message),
            Self::Ingest(IngestError::Extraction(error)) if error.is_unsupported() => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, error.to_string())
            }
            Self::Search(SearchError::NotFound(message)) => (StatusCode::NOT_FOUND, message),
            Self::Ingest(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
            Self::Search(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        };
        (status, message).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self::Ingest(inner)
    }
}

impl From<SearchError> for AppError {
    fn from(inner: SearchError) -> Self {
        Self::Search(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::config::{CONFIG, Config};
    use crate::embedding::get_embedding_client;
    use crate::files::{FileStatus, PublicFile};
    use crate::generation::{GenerationError, GenerationPart, TextGenerator};
    use crate::index::MemoryEntryIndex;
    use crate::ingest::{
        AddFileOutcome, AddFileRequest, FilePage, IngestApi, IngestError, ListFilesRequest,
    };
    use crate::metrics::{IngestMetrics, MetricsSnapshot};
    use crate::repository::EntryRepository;
    use crate::retrieval::RetrievalService;
    use crate::tenant::TenantContext;
    use crate::threads::MemoryThreadStore;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use std::sync::{Arc, Once};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

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

    struct NullGenerator;

    #[async_trait]
    impl TextGenerator for NullGenerator {
        async fn generate(
            &self,
            _system_instruction: &str,
            _parts: Vec<GenerationPart>,
        ) -> Result<String, GenerationError> {
            Ok(String::new())
        }
    }

    fn retrieval_service() -> Arc<RetrievalService> {
        let repository = Arc::new(EntryRepository::new(
            Arc::new(MemoryEntryIndex::new()),
            get_embedding_client(),
        ));
        Arc::new(RetrievalService::new(
            repository,
            Arc::new(NullGenerator),
            Arc::new(MemoryThreadStore::new()),
            Arc::new(IngestMetrics::new()),
        ))
    }

    #[tokio::test]
    async fn commands_catalog_exposes_upload_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let upload = commands
            .iter()
            .find(|cmd| cmd.name == "upload_file")
            .expect("upload command present");

        assert_eq!(upload.method, "POST");
        assert_eq!(upload.path, "/files");
        assert!(upload.description.to_lowercase().contains("extract"));

        // ensure catalog exposes multiple commands for host discovery
        assert!(commands.len() >= 5);
    }

    #[tokio::test]
    async fn upload_route_forwards_tenant_and_media_type() {
        ensure_test_config();
        let service = Arc::new(StubIngestService::new());
        let app = create_router(service.clone(), retrieval_service());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/files?filename=notes.txt&category=guides")
                    .header("x-tenant-id", "org-42")
                    .header("content-type", "text/plain")
                    .body(Body::from("plain body"))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["entry_id"], "entry-stub");
        assert_eq!(json["created"], true);

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        let (tenant, request) = &calls[0];
        assert_eq!(tenant.org_id, "org-42");
        assert_eq!(request.filename, "notes.txt");
        assert_eq!(request.media_type.as_deref(), Some("text/plain"));
        assert_eq!(request.category.as_deref(), Some("guides"));
        assert_eq!(request.bytes, b"plain body");
    }

    #[tokio::test]
    async fn missing_tenant_header_is_unauthorized() {
        ensure_test_config();
        let service = Arc::new(StubIngestService::new());
        let app = create_router(service.clone(), retrieval_service());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/files")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn list_route_serializes_page_fields() {
        ensure_test_config();
        let service = Arc::new(StubIngestService::new());
        let app = create_router(service.clone(), retrieval_service());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/files?page_size=2&cursor=abc")
                    .header("x-tenant-id", "org-42")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["is_done"], false);
        assert_eq!(json["continue_cursor"], "next-cursor");
        assert_eq!(json["page"][0]["name"], "stub.txt");
        assert_eq!(json["page"][0]["type"], "txt");
        assert_eq!(json["page"][0]["status"], "ready");
    }

    struct StubIngestService {
        calls: Arc<Mutex<Vec<(TenantContext, AddFileRequest)>>>,
    }

    impl StubIngestService {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        async fn recorded_calls(&self) -> Vec<(TenantContext, AddFileRequest)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl IngestApi for StubIngestService {
        async fn add_file(
            &self,
            tenant: &TenantContext,
            request: AddFileRequest,
        ) -> Result<AddFileOutcome, IngestError> {
            let mut guard = self.calls.lock().await;
            guard.push((tenant.clone(), request));
            Ok(AddFileOutcome {
                entry_id: "entry-stub".into(),
                url: Some("memory://blobs/stub".into()),
                created: true,
            })
        }

        async fn list_files(
            &self,
            _tenant: &TenantContext,
            _request: ListFilesRequest,
        ) -> Result<FilePage, IngestError> {
            Ok(FilePage {
                page: vec![PublicFile {
                    id: "entry-stub".into(),
                    name: "stub.txt".into(),
                    file_type: "txt".into(),
                    size: "1.5 KB".into(),
                    status: FileStatus::Ready,
                    url: None,
                    category: None,
                }],
                is_done: false,
                continue_cursor: "next-cursor".into(),
            })
        }

        async fn delete_file(
            &self,
            _tenant: &TenantContext,
            _entry_id: &str,
        ) -> Result<(), IngestError> {
            Ok(())
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                files_ingested: 0,
                duplicates_skipped: 0,
                ingest_failures: 0,
                searches_served: 0,
            }
        }
    }
}
