// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedder for tests.
//!
//! `StaticEmbedder` returns preset vectors for known texts and a stable
//! byte-hash vector for everything else, enabling fast, CI-runnable tests
//! without external embedding APIs.

use std::collections::HashMap;

use async_trait::async_trait;

use mnemo_core::{
    BackendAdapter, BackendType, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus,
    MemoryError, TextEmbedder,
};

/// An embedder that produces the same vector for the same text, always.
///
/// Tests that need controlled similarity register presets; unknown texts
/// fall back to a normalized bag-of-bytes vector, which is deterministic
/// but carries no semantics.
pub struct StaticEmbedder {
    dimensions: usize,
    presets: HashMap<String, Vec<f32>>,
}

impl StaticEmbedder {
    /// Create an embedder producing vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            presets: HashMap::new(),
        }
    }

    /// Register an exact vector for an exact text.
    ///
    /// # Panics
    /// Panics when the vector's length does not match the embedder's
    /// dimensionality; a preset that silently disagreed would invalidate
    /// every similarity assertion built on it.
    pub fn with_preset(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        assert_eq!(
            vector.len(),
            self.dimensions,
            "preset vector length must match embedder dimensions"
        );
        self.presets.insert(text.into(), vector);
        self
    }

    /// The vector this embedder produces for `text`. Public so tests can
    /// compute expected scores.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(preset) = self.presets.get(text) {
            return preset.clone();
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            vector[(i + byte as usize) % self.dimensions] += f32::from(byte) / 255.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl TextEmbedder for StaticEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        Ok(self.vector_for(text))
    }
}

#[async_trait]
impl BackendAdapter for StaticEmbedder {
    fn name(&self) -> &str {
        "static-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for StaticEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MemoryError> {
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
            dimensions: self.dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let embedder = StaticEmbedder::new(8);
        assert_eq!(embedder.vector_for("hello"), embedder.vector_for("hello"));
        assert_ne!(embedder.vector_for("hello"), embedder.vector_for("world"));
    }

    #[test]
    fn presets_override_the_hash() {
        let embedder = StaticEmbedder::new(3).with_preset("fox", vec![1.0, 0.0, 0.0]);
        assert_eq!(embedder.vector_for("fox"), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn hashed_vectors_are_unit_length() {
        let embedder = StaticEmbedder::new(16);
        let vector = embedder.vector_for("some text");
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn batch_embedding_preserves_order() {
        let embedder = StaticEmbedder::new(4);
        let output = embedder
            .embed(EmbeddingInput {
                texts: vec!["a".into(), "b".into()],
            })
            .await
            .unwrap();
        assert_eq!(output.embeddings.len(), 2);
        assert_eq!(output.embeddings[0], embedder.vector_for("a"));
        assert_eq!(output.embeddings[1], embedder.vector_for("b"));
        assert_eq!(output.dimensions, 4);
    }
}
