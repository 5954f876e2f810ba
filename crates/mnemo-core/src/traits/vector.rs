// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vector index contract implemented by every similarity backend.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::traits::adapter::BackendAdapter;
use crate::vector::{VectorFilter, VectorMatch, VectorMetadata};

/// Stores `(id, vector, metadata)` triples and answers top-K
/// cosine-similarity queries with optional metadata filtering.
///
/// Scores are cosine similarity in `[-1, 1]`; callers treat them as a
/// relevance proxy. Results come back ordered by descending score.
#[async_trait]
pub trait VectorStore: BackendAdapter {
    /// Prepares the index (opens files, ensures remote collections).
    async fn initialize(&self) -> Result<(), MemoryError>;

    /// Inserts or replaces the vector stored under `id`.
    async fn add_vector(
        &self,
        id: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<(), MemoryError>;

    /// Removes the vector stored under `id`; `false` when absent.
    async fn delete_vector(&self, id: &str) -> Result<bool, MemoryError>;

    /// Removes every stored vector.
    async fn clear_vectors(&self) -> Result<(), MemoryError>;

    /// Returns up to `limit` best matches for `query`, restricted to
    /// vectors whose metadata passes `filter` when one is given.
    async fn search_similar_vectors(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorMatch>, MemoryError>;
}
