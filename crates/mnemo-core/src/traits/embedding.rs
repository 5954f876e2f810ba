// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding capabilities consumed by the memory engine.
//!
//! Hosts can supply either a batch-capable [`EmbeddingAdapter`] or a plain
//! per-text [`TextEmbedder`] callback; the embedding service wraps the
//! latter with bounded concurrency and retry.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::traits::adapter::BackendAdapter;

/// A batch of texts to embed, in caller order.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Embeddings for a batch, one vector per input text, order-preserving.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    /// Dimension of every vector in `embeddings`.
    pub dimensions: usize,
}

/// A batch-capable embedding backend (provider-native or hosted).
#[async_trait]
pub trait EmbeddingAdapter: BackendAdapter {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MemoryError>;
}

/// A single-text embedding callback supplied by a host that has no batch
/// endpoint. Must be cheap to call concurrently.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}
