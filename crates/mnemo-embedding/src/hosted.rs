// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hosted embedding client for OpenAI-compatible `/embeddings` endpoints.
//!
//! Used as the fallback batch source when the host supplies no embedding
//! capability of its own but an API key is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mnemo_config::EmbeddingConfig;
use mnemo_core::{
    BackendAdapter, BackendType, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus,
    MemoryError,
};

/// First retry delay; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Batch embedding client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct HostedEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl HostedEmbeddingClient {
    /// Builds the client. Fails with [`MemoryError::EmbeddingUnavailable`]
    /// when no API key is configured.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, MemoryError> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Err(MemoryError::EmbeddingUnavailable {
                message: "no embedding API key configured".into(),
                source: None,
            });
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                MemoryError::EmbeddingUnavailable {
                    message: "invalid embedding API key header value".into(),
                    source: Some(Box::new(e)),
                }
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MemoryError::init_with("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl BackendAdapter for HostedEmbeddingClient {
    fn name(&self) -> &str {
        "hosted-embedding"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MemoryError::query("embedding", e))?;
        if response.status().is_success() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(format!(
                "embedding API returned {}",
                response.status()
            )))
        }
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for HostedEmbeddingClient {
    /// Embeds a batch of texts, retrying transient failures with doubling
    /// backoff.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MemoryError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: 0,
            });
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingsRequest {
            model: &self.model,
            input: &input.texts,
        };

        let mut delay = RETRY_BASE_DELAY;
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying embedding request after transient error");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| MemoryError::query("embedding", e))?;

            let status = response.status();
            debug!(status = %status, attempt, texts = input.texts.len(), "embedding response received");

            if status.is_success() {
                let parsed: EmbeddingsResponse = response
                    .json()
                    .await
                    .map_err(|e| MemoryError::query("embedding", e))?;
                return into_output(parsed, input.texts.len());
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient embedding error, will retry");
                last_error = Some(MemoryError::query(
                    "embedding",
                    format!("{status}: {body}"),
                ));
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::query(
                "embedding",
                format!("{status}: {body}"),
            ));
        }

        Err(last_error.unwrap_or_else(|| {
            MemoryError::query("embedding", "request failed after retries".to_string())
        }))
    }
}

/// Reassembles the response into caller order and validates one vector per
/// input text.
fn into_output(
    mut response: EmbeddingsResponse,
    expected: usize,
) -> Result<EmbeddingOutput, MemoryError> {
    if response.data.len() != expected {
        return Err(MemoryError::query(
            "embedding",
            format!(
                "expected {expected} embeddings, got {}",
                response.data.len()
            ),
        ));
    }
    response.data.sort_by_key(|d| d.index);
    let dimensions = response.data.first().map_or(0, |d| d.embedding.len());
    Ok(EmbeddingOutput {
        embeddings: response.data.into_iter().map(|d| d.embedding).collect(),
        dimensions,
    })
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}
