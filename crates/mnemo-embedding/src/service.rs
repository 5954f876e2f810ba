// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding source resolution and the batching/concurrency wrap around it.
//!
//! The service resolves exactly one source at construction: a host-supplied
//! batch adapter, a host-supplied per-text callback, or the hosted
//! OpenAI-compatible client when an API key is configured. Without any of
//! these the memory engine cannot index vectors, so resolution fails.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use mnemo_config::EmbeddingConfig;
use mnemo_core::{EmbeddingAdapter, EmbeddingInput, MemoryError, TextEmbedder};

use crate::hosted::HostedEmbeddingClient;

/// First retry delay for per-text callbacks; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// The embedding capability the service resolved to.
pub enum EmbeddingSource {
    /// Batch-capable adapter; owns its retry policy.
    Batch(Arc<dyn EmbeddingAdapter>),
    /// Per-text callback; the service adds retry and bounded concurrency.
    PerText(Arc<dyn TextEmbedder>),
}

/// Turns text into vectors for the memory engine.
pub struct EmbeddingService {
    source: EmbeddingSource,
    max_concurrency: usize,
    max_retries: u32,
}

impl EmbeddingService {
    /// Resolves the embedding source in priority order: native batch
    /// adapter, per-text callback, hosted client. Fails with
    /// [`MemoryError::EmbeddingUnavailable`] when none applies.
    pub fn resolve(
        config: &EmbeddingConfig,
        adapter: Option<Arc<dyn EmbeddingAdapter>>,
        embedder: Option<Arc<dyn TextEmbedder>>,
    ) -> Result<Self, MemoryError> {
        let source = if let Some(adapter) = adapter {
            debug!(adapter = adapter.name(), "using native embedding adapter");
            EmbeddingSource::Batch(adapter)
        } else if let Some(embedder) = embedder {
            debug!("using per-text embedding callback");
            EmbeddingSource::PerText(embedder)
        } else if config.api_key.is_some() {
            let client = HostedEmbeddingClient::new(config)?;
            debug!(model = %config.model, "using hosted embedding API");
            EmbeddingSource::Batch(Arc::new(client))
        } else {
            return Err(MemoryError::EmbeddingUnavailable {
                message: "no embedding capability: register an embedding adapter \
                          or configure embedding.api_key"
                    .into(),
                source: None,
            });
        };

        Ok(Self {
            source,
            max_concurrency: config.max_concurrency.max(1),
            max_retries: config.max_retries,
        })
    }

    /// Human-readable name of the resolved source, for startup logs.
    pub fn source_name(&self) -> &str {
        match &self.source {
            EmbeddingSource::Batch(adapter) => adapter.name(),
            EmbeddingSource::PerText(_) => "per-text",
        }
    }

    /// Embeds a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        match &self.source {
            EmbeddingSource::Batch(adapter) => {
                let output = adapter
                    .embed(EmbeddingInput {
                        texts: vec![text.to_string()],
                    })
                    .await?;
                output.embeddings.into_iter().next().ok_or_else(|| {
                    MemoryError::query(
                        "embedding",
                        "adapter returned no vector for query".to_string(),
                    )
                })
            }
            EmbeddingSource::PerText(embedder) => {
                embed_one_with_retry(embedder.as_ref(), text, self.max_retries).await
            }
        }
    }

    /// Embeds a batch of documents, order-preserving.
    ///
    /// Per-text sources run through a `buffered` pipeline so at most
    /// `max_concurrency` callbacks are in flight at once.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match &self.source {
            EmbeddingSource::Batch(adapter) => {
                let output = adapter
                    .embed(EmbeddingInput {
                        texts: texts.to_vec(),
                    })
                    .await?;
                if output.embeddings.len() != texts.len() {
                    return Err(MemoryError::query(
                        "embedding",
                        format!(
                            "expected {} embeddings, got {}",
                            texts.len(),
                            output.embeddings.len()
                        ),
                    ));
                }
                Ok(output.embeddings)
            }
            EmbeddingSource::PerText(embedder) => {
                let max_retries = self.max_retries;
                stream::iter(texts.iter().cloned().map(|text| {
                    let embedder = Arc::clone(embedder);
                    async move {
                        embed_one_with_retry(embedder.as_ref(), &text, max_retries).await
                    }
                }))
                .buffered(self.max_concurrency)
                .try_collect()
                .await
            }
        }
    }
}

/// Calls the per-text callback, retrying degradable failures with doubling
/// backoff.
async fn embed_one_with_retry(
    embedder: &dyn TextEmbedder,
    text: &str,
    max_retries: u32,
) -> Result<Vec<f32>, MemoryError> {
    let mut delay = RETRY_BASE_DELAY;
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            warn!(attempt, "retrying text embedding after failure");
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
        match embedder.embed_text(text).await {
            Ok(vector) => return Ok(vector),
            Err(e) if e.is_degradable() && attempt < max_retries => {
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        MemoryError::query("embedding", "text embedding failed after retries".to_string())
    }))
}
