// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Qdrant vector store over the HTTP API.
//!
//! The collection is created at initialization with cosine distance. Point
//! ids must be UUIDs on the wire, so record ids are mapped to their uuid
//! tail (`mem_<uuid>` records) or a uuid-v5 digest; the original record id
//! rides in the payload and is what searches return.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use mnemo_config::QdrantConfig;
use mnemo_core::{
    BackendAdapter, BackendType, HealthStatus, MemoryError, VectorFilter, VectorMatch,
    VectorMetadata, VectorStore,
};

const MAX_RETRIES: u32 = 1;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Payload key carrying the original record id.
const RECORD_ID_KEY: &str = "record_id";

/// Remote Qdrant-backed vector store.
pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dimensions: usize,
    ready: OnceCell<()>,
}

impl QdrantVectorStore {
    /// Builds the HTTP client. The collection is not touched until
    /// [`VectorStore::initialize`] runs.
    pub fn new(config: QdrantConfig, dimensions: usize) -> Result<Self, MemoryError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            headers.insert(
                "api-key",
                HeaderValue::from_str(api_key)
                    .map_err(|e| MemoryError::init_with("invalid qdrant api key", e))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MemoryError::init_with("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection,
            dimensions,
            ready: OnceCell::new(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn ready(&self) -> Result<(), MemoryError> {
        self.ready.get().copied().ok_or(MemoryError::NotInitialized)
    }

    /// Sends a request, retrying transient failures. A 404 response is
    /// returned to the caller: absence is a domain answer here, not a
    /// failure.
    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, MemoryError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                warn!(attempt, path, "retrying qdrant request after transient error");
                tokio::time::sleep(RETRY_DELAY).await;
            }

            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request
                .send()
                .await
                .map_err(|e| MemoryError::query("qdrant", e))?;

            let status = response.status();
            if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
                return Ok(response);
            }

            if is_transient_error(status) && attempt < MAX_RETRIES {
                let body_text = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body_text, "transient qdrant error, will retry");
                last_error = Some(MemoryError::query(
                    "qdrant",
                    format!("{status}: {body_text}"),
                ));
                continue;
            }

            let body_text = response.text().await.unwrap_or_default();
            return Err(MemoryError::query(
                "qdrant",
                format!("{status}: {body_text}"),
            ));
        }

        Err(last_error.unwrap_or_else(|| {
            MemoryError::query("qdrant", "request failed after retries".to_string())
        }))
    }

    async fn ensure_collection(&self) -> Result<(), MemoryError> {
        let path = format!("/collections/{}", self.collection);
        let response = self.request(reqwest::Method::GET, &path, None).await?;
        if response.status().is_success() {
            debug!(collection = %self.collection, "qdrant collection exists");
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": self.dimensions, "distance": "Cosine" }
        });
        let response = self
            .request(reqwest::Method::PUT, &path, Some(&body))
            .await?;
        if !response.status().is_success() {
            return Err(MemoryError::init(format!(
                "cannot create qdrant collection {}",
                self.collection
            )));
        }
        debug!(collection = %self.collection, dimensions = self.dimensions, "qdrant collection created");
        Ok(())
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), MemoryError> {
        if vector.len() != self.dimensions {
            return Err(MemoryError::InvalidInput(format!(
                "vector has {} dimensions, store expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

/// Maps a record id onto a Qdrant point id. `mem_<uuid>` ids reuse their
/// uuid tail; anything else gets a deterministic uuid-v5 digest.
fn point_id(record_id: &str) -> String {
    let tail = record_id.rsplit('_').next().unwrap_or(record_id);
    match Uuid::parse_str(tail) {
        Ok(uuid) => uuid.to_string(),
        Err(_) => Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string(),
    }
}

fn payload_for(record_id: &str, metadata: &VectorMetadata) -> Result<serde_json::Value, MemoryError> {
    let mut payload = serde_json::to_value(metadata)
        .map_err(|e| MemoryError::Internal(format!("serialize vector metadata: {e}")))?;
    if let serde_json::Value::Object(map) = &mut payload {
        map.insert(RECORD_ID_KEY.to_string(), json!(record_id));
    }
    Ok(payload)
}

/// Translates a [`VectorFilter`] into Qdrant `must` clauses. Tag conditions
/// become one clause per tag; a `match` on an array field tests membership,
/// so requiring all clauses yields ALL semantics.
fn filter_to_clauses(filter: &VectorFilter) -> Option<serde_json::Value> {
    if filter.is_empty() {
        return None;
    }
    let mut must = Vec::new();
    let mut push_match =
        |key: &str, value: &str| must.push(json!({ "key": key, "match": { "value": value } }));
    if let Some(value) = &filter.source {
        push_match("source", value);
    }
    if let Some(value) = &filter.kind {
        push_match("type", value);
    }
    if let Some(value) = &filter.session_id {
        push_match("sessionId", value);
    }
    if let Some(value) = &filter.file_path {
        push_match("filePath", value);
    }
    for tag in &filter.tags {
        push_match("tags", tag);
    }
    Some(json!({ "must": must }))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

impl ScoredPoint {
    /// Prefers the record id from the payload; falls back to the raw point
    /// id for points written by other tools.
    fn record_id(&self) -> String {
        self.payload
            .as_ref()
            .and_then(|p| p.get(RECORD_ID_KEY))
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| match &self.id {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

#[async_trait]
impl BackendAdapter for QdrantVectorStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        self.ready()?;
        let path = format!("/collections/{}", self.collection);
        let response = self.request(reqwest::Method::GET, &path, None).await?;
        if response.status().is_success() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(format!(
                "collection {} missing",
                self.collection
            )))
        }
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.ready
            .get_or_try_init(|| self.ensure_collection())
            .await?;
        Ok(())
    }

    async fn add_vector(
        &self,
        id: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<(), MemoryError> {
        self.ready()?;
        self.check_dimensions(vector)?;
        let body = json!({
            "points": [{
                "id": point_id(id),
                "vector": vector,
                "payload": payload_for(id, metadata)?,
            }]
        });
        let path = format!("/collections/{}/points?wait=true", self.collection);
        self.request(reqwest::Method::PUT, &path, Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_vector(&self, id: &str) -> Result<bool, MemoryError> {
        self.ready()?;
        let point = point_id(id);

        let probe_path = format!("/collections/{}/points/{}", self.collection, point);
        let response = self
            .request(reqwest::Method::GET, &probe_path, None)
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let body = json!({ "points": [point] });
        let path = format!("/collections/{}/points/delete?wait=true", self.collection);
        self.request(reqwest::Method::POST, &path, Some(&body))
            .await?;
        Ok(true)
    }

    async fn clear_vectors(&self) -> Result<(), MemoryError> {
        self.ready()?;
        // An empty filter selects every point in the collection.
        let body = json!({ "filter": {} });
        let path = format!("/collections/{}/points/delete?wait=true", self.collection);
        self.request(reqwest::Method::POST, &path, Some(&body))
            .await?;
        Ok(())
    }

    async fn search_similar_vectors(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorMatch>, MemoryError> {
        self.ready()?;
        self.check_dimensions(query)?;

        let mut body = json!({
            "vector": query,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(clauses) = filter.and_then(filter_to_clauses)
            && let serde_json::Value::Object(map) = &mut body
        {
            map.insert("filter".to_string(), clauses);
        }

        let path = format!("/collections/{}/points/search", self.collection);
        let response = self
            .request(reqwest::Method::POST, &path, Some(&body))
            .await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::query("qdrant", e))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|point| VectorMatch {
                id: point.record_id(),
                score: point.score,
            })
            .collect())
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}
