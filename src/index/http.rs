//! HTTP client wrapper for the backing vector-search engine.

use crate::config::get_config;
use crate::index::payload::{build_entry_payload, parse_entry_payload};
use crate::index::types::{
    ClaimOutcome, EntryPage, EntryRecord, EntryStatus, IndexError, NamespaceId, ScoredEntry,
};
use crate::index::EntryIndex;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Lightweight HTTP client implementing [`EntryIndex`] over a REST engine.
pub struct HttpEntryIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpEntryIndex {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, IndexError> {
        let config = get_config();
        let client = Client::builder().user_agent("support-kb/0.3").build()?;

        let base_url = normalize_base_url(&config.index_url).map_err(IndexError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .index_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized vector index HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.index_api_key.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_endpoint(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .user_agent("support-kb-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), IndexError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Index request failed");
            Err(error)
        }
    }

    /// Ensure payload indexes backing the dedup and listing filters.
    async fn ensure_payload_indexes(&self, namespace: &NamespaceId) -> Result<(), IndexError> {
        let fields: [(&str, &str); 3] = [
            ("content_hash", "keyword"),
            ("status", "keyword"),
            ("ingested_at", "datetime"),
        ];

        for (field, schema) in fields {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(Method::PUT, &format!("collections/{namespace}/index"))
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(collection = %namespace, field, schema, "Payload index ensured");
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = IndexError::UnexpectedStatus { status, body };
                tracing::warn!(collection = %namespace, field, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    /// Fetch a single point's payload by id, `None` when the point is absent.
    async fn fetch_point(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
    ) -> Result<Option<Map<String, Value>>, IndexError> {
        let response = self
            .request(
                Method::GET,
                &format!("collections/{namespace}/points/{entry_id}"),
            )
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::UnexpectedStatus { status, body });
        }

        let point: GetPointResponse = response.json().await?;
        Ok(point.result.payload)
    }
}

#[derive(Deserialize)]
struct RetrieveResponse {
    result: Vec<RetrievePoint>,
}

#[derive(Deserialize)]
struct GetPointResponse {
    result: RetrievePoint,
}

#[derive(Deserialize)]
struct RetrievePoint {
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
struct QueryPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Deserialize)]
struct ScrollResult {
    #[serde(default)]
    points: Vec<ScrollPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[async_trait]
impl EntryIndex for HttpEntryIndex {
    async fn ensure_namespace(
        &self,
        namespace: &NamespaceId,
        vector_size: u64,
    ) -> Result<(), IndexError> {
        if self.namespace_exists(namespace).await? {
            return Ok(());
        }

        tracing::debug!(collection = %namespace, vector_size, "Creating namespace collection");
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{namespace}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %namespace, "Namespace collection created");
        })
        .await?;

        self.ensure_payload_indexes(namespace).await
    }

    async fn namespace_exists(&self, namespace: &NamespaceId) -> Result<bool, IndexError> {
        let response = self
            .request(Method::GET, &format!("collections/{namespace}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = IndexError::UnexpectedStatus { status, body };
                tracing::error!(collection = %namespace, error = %error, "Namespace existence check failed");
                Err(error)
            }
        }
    }

    async fn get_entry(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
    ) -> Result<Option<EntryRecord>, IndexError> {
        let body = json!({
            "ids": [entry_id],
            "with_payload": true,
            "with_vector": false,
        });

        let response = self
            .request(Method::POST, &format!("collections/{namespace}/points"))
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::UnexpectedStatus { status, body });
        }

        let payload: RetrieveResponse = response.json().await?;
        Ok(payload
            .result
            .into_iter()
            .filter_map(|point| point.payload)
            .find_map(|map| parse_entry_payload(&map)))
    }

    async fn claim_entry(
        &self,
        namespace: &NamespaceId,
        record: EntryRecord,
        vector: Vec<f32>,
    ) -> Result<ClaimOutcome, IndexError> {
        let replaced = match self.get_entry(namespace, &record.entry_id).await? {
            Some(existing) if existing.status == EntryStatus::Error => Some(existing),
            Some(existing) => return Ok(ClaimOutcome::Occupied(existing)),
            None => None,
        };

        let entry_id = record.entry_id.clone();
        let payload = build_entry_payload(&record);
        let point = json!({
            "id": entry_id,
            "vector": vector,
            "payload": payload,
        });

        let response = self
            .request(Method::PUT, &format!("collections/{namespace}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": [point] }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %namespace, entry = %entry_id, "Entry point written");
        })
        .await?;

        // Last write wins at the engine, so racers for one id all land on the
        // same point. The read-back settles ownership: only the caller whose
        // payload survived holds the claim.
        match self.fetch_point(namespace, &entry_id).await? {
            Some(current) if payload.as_object() == Some(&current) => {
                Ok(ClaimOutcome::Claimed { replaced })
            }
            Some(current) => parse_entry_payload(&current)
                .map(ClaimOutcome::Occupied)
                .ok_or_else(|| {
                    IndexError::Backend(format!("point {entry_id} holds a foreign payload"))
                }),
            None => Err(IndexError::Backend(format!(
                "point {entry_id} missing after write"
            ))),
        }
    }

    async fn set_status(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
        status: EntryStatus,
    ) -> Result<(), IndexError> {
        let body = json!({
            "payload": { "status": status.as_str() },
            "points": [entry_id],
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{namespace}/points/payload"),
            )
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %namespace, entry = entry_id, status = status.as_str(), "Entry status updated");
        })
        .await
    }

    async fn list_page(
        &self,
        namespace: &NamespaceId,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<EntryPage, IndexError> {
        let mut body = json!({
            "with_payload": true,
            "with_vector": false,
            "limit": page_size,
            "order_by": [
                { "key": "ingested_at", "direction": "asc" }
            ]
        });

        if let Some(cursor) = cursor.filter(|value| !value.is_empty()) {
            body.as_object_mut()
                .expect("scroll body should remain an object")
                .insert("offset".into(), Value::String(cursor));
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{namespace}/points/scroll"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(collection = %namespace, error = %error, "Failed to scroll entries");
            return Err(error);
        }

        let ScrollResponse { result } = response.json().await?;
        let entries: Vec<EntryRecord> = result
            .points
            .into_iter()
            .filter_map(|point| point.payload)
            .filter_map(|map| parse_entry_payload(&map))
            .collect();

        let continue_cursor = result
            .next_page_offset
            .map(stringify_offset)
            .unwrap_or_default();

        Ok(EntryPage {
            entries,
            is_done: continue_cursor.is_empty(),
            continue_cursor,
        })
    }

    async fn delete_entry(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
    ) -> Result<(), IndexError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{namespace}/points/delete"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": [entry_id] }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %namespace, entry = entry_id, "Entry deleted");
        })
        .await
    }

    async fn query(
        &self,
        namespace: &NamespaceId,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, IndexError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": {
                "must": [
                    { "key": "status", "match": { "value": "ready" } }
                ]
            }
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{namespace}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(collection = %namespace, error = %error, "Index query failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .filter_map(|point| {
                let record = point
                    .payload
                    .as_ref()
                    .and_then(|map| parse_entry_payload(map))?;
                Some(ScoredEntry {
                    record,
                    score: point.score,
                })
            })
            .collect();

        Ok(results)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_offset(offset: Value) -> String {
    match offset {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::EntryMetadata;
    use httpmock::{Method::POST, MockServer};

    fn ready_payload(entry_id: &str, key: &str) -> Value {
        json!({
            "entry_id": entry_id,
            "key": key,
            "content_hash": "hash-1",
            "status": "ready",
            "text": "stored text",
            "ingested_at": "2025-01-01T00:00:00Z",
            "uploaded_by": "org-1",
            "filename": key,
        })
    }

    #[tokio::test]
    async fn query_filters_to_ready_entries() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/kb_org-1/points/query")
                    .json_body_partial(
                        r#"{"filter": {"must": [{"key": "status", "match": {"value": "ready"}}]}}"#,
                    );
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": "entry-1",
                            "score": 0.42,
                            "payload": ready_payload("entry-1", "manual.pdf")
                        }
                    ]
                }));
            })
            .await;

        let index = HttpEntryIndex::with_endpoint(server.base_url());
        let results = index
            .query(&NamespaceId("kb_org-1".into()), vec![0.1, 0.2], 5)
            .await
            .expect("query");

        mock.assert();
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert!((hit.score - 0.42).abs() < f32::EPSILON);
        assert_eq!(hit.record.entry_id, "entry-1");
        assert_eq!(hit.record.key, "manual.pdf");
        assert_eq!(hit.record.status, EntryStatus::Ready);
    }

    #[tokio::test]
    async fn list_page_passes_cursor_through_and_reports_done() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/kb_org-1/points/scroll")
                    .json_body_partial(r#"{"offset": "entry-3", "limit": 2}"#);
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            { "id": "entry-3", "payload": ready_payload("entry-3", "faq.md") }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let index = HttpEntryIndex::with_endpoint(server.base_url());
        let page = index
            .list_page(&NamespaceId("kb_org-1".into()), Some("entry-3".into()), 2)
            .await
            .expect("page");

        mock.assert();
        assert_eq!(page.entries.len(), 1);
        assert!(page.is_done);
        assert!(page.continue_cursor.is_empty());
    }

    fn pending_record(storage_ref: &str) -> EntryRecord {
        EntryRecord {
            entry_id: "entry-9".into(),
            key: "notes.txt".into(),
            content_hash: "hash-9".into(),
            status: EntryStatus::Pending,
            text: "body".into(),
            metadata: EntryMetadata {
                storage_ref: Some(storage_ref.into()),
                uploaded_by: "org-1".into(),
                filename: "notes.txt".into(),
                category: None,
            },
            ingested_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn claim_writes_point_and_wins_when_payload_survives() {
        let server = MockServer::start_async().await;
        let record = pending_record("blob-9");
        let payload = build_entry_payload(&record);

        let retrieve = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/kb_org-1/points");
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": [] }));
            })
            .await;
        let write = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PUT)
                    .path("/collections/kb_org-1/points")
                    .query_param("wait", "true");
                then.status(200).json_body(json!({ "status": "ok" }));
            })
            .await;
        let read_back = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET)
                    .path("/collections/kb_org-1/points/entry-9");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "id": "entry-9", "payload": payload }
                }));
            })
            .await;

        let index = HttpEntryIndex::with_endpoint(server.base_url());
        let outcome = index
            .claim_entry(&NamespaceId("kb_org-1".into()), record, vec![0.5, 0.5])
            .await
            .expect("claim");

        retrieve.assert();
        write.assert();
        read_back.assert();
        assert!(matches!(outcome, ClaimOutcome::Claimed { replaced: None }));
    }

    #[tokio::test]
    async fn claim_loses_when_a_racer_payload_survives() {
        let server = MockServer::start_async().await;
        let survivor = build_entry_payload(&pending_record("blob-other"));

        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/kb_org-1/points");
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": [] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PUT)
                    .path("/collections/kb_org-1/points");
                then.status(200).json_body(json!({ "status": "ok" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET)
                    .path("/collections/kb_org-1/points/entry-9");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "id": "entry-9", "payload": survivor }
                }));
            })
            .await;

        let index = HttpEntryIndex::with_endpoint(server.base_url());
        let outcome = index
            .claim_entry(
                &NamespaceId("kb_org-1".into()),
                pending_record("blob-mine"),
                vec![0.5, 0.5],
            )
            .await
            .expect("claim");

        assert!(matches!(
            outcome,
            ClaimOutcome::Occupied(existing)
                if existing.metadata.storage_ref.as_deref() == Some("blob-other")
        ));
    }

    #[tokio::test]
    async fn claim_refuses_live_point_without_writing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/kb_org-1/points");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": [
                        { "id": "entry-9", "payload": ready_payload("entry-9", "notes.txt") }
                    ]
                }));
            })
            .await;
        let write = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PUT)
                    .path("/collections/kb_org-1/points");
                then.status(200).json_body(json!({ "status": "ok" }));
            })
            .await;

        let index = HttpEntryIndex::with_endpoint(server.base_url());
        let outcome = index
            .claim_entry(
                &NamespaceId("kb_org-1".into()),
                pending_record("blob-9"),
                vec![0.5, 0.5],
            )
            .await
            .expect("claim");

        assert!(matches!(
            outcome,
            ClaimOutcome::Occupied(existing) if existing.status == EntryStatus::Ready
        ));
        write.assert_hits(0);
    }
}
