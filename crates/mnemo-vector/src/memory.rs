// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory vector store backed by a `RwLock<HashMap>`.
//!
//! Nothing survives a restart. Searches are a linear cosine scan, which is
//! fine for the collection sizes this store is meant for (tests, ephemeral
//! sessions).

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use mnemo_core::vector::cosine_similarity;
use mnemo_core::{
    BackendAdapter, BackendType, HealthStatus, MemoryError, VectorFilter, VectorMatch,
    VectorMetadata, VectorStore,
};

struct StoredVector {
    vector: Vec<f32>,
    metadata: VectorMetadata,
}

/// Volatile vector store. Always ready; `initialize` is a no-op.
pub struct InMemoryVectorStore {
    dimensions: usize,
    vectors: RwLock<HashMap<String, StoredVector>>,
}

impl InMemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: RwLock::new(HashMap::new()),
        }
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

#[async_trait]
impl BackendAdapter for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn add_vector(
        &self,
        id: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<(), MemoryError> {
        self.check_dimensions(vector)?;
        self.vectors.write().await.insert(
            id.to_string(),
            StoredVector {
                vector: vector.to_vec(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn delete_vector(&self, id: &str) -> Result<bool, MemoryError> {
        Ok(self.vectors.write().await.remove(id).is_some())
    }

    async fn clear_vectors(&self) -> Result<(), MemoryError> {
        self.vectors.write().await.clear();
        Ok(())
    }

    async fn search_similar_vectors(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorMatch>, MemoryError> {
        self.check_dimensions(query)?;
        let vectors = self.vectors.read().await;
        let mut matches: Vec<VectorMatch> = vectors
            .iter()
            .filter(|(_, stored)| filter.is_none_or(|f| f.matches(&stored.metadata)))
            .map(|(id, stored)| VectorMatch {
                id: id.clone(),
                score: cosine_similarity(query, &stored.vector),
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(limit);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(3)
    }

    #[tokio::test]
    async fn search_orders_by_descending_similarity() {
        let store = store();
        let meta = VectorMetadata::default();
        store.add_vector("a", &[1.0, 0.0, 0.0], &meta).await.unwrap();
        store.add_vector("b", &[0.7, 0.7, 0.0], &meta).await.unwrap();
        store.add_vector("c", &[0.0, 1.0, 0.0], &meta).await.unwrap();

        let matches = store
            .search_similar_vectors(&[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!((matches[0].score - 1.0).abs() < 1e-6);
        assert!(matches[2].score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn limit_truncates_results() {
        let store = store();
        let meta = VectorMetadata::default();
        for i in 0..5 {
            let v = [1.0, i as f32 * 0.1, 0.0];
            store.add_vector(&format!("v{i}"), &v, &meta).await.unwrap();
        }
        let matches = store
            .search_similar_vectors(&[1.0, 0.0, 0.0], 2, None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn filter_restricts_candidates() {
        let store = store();
        let chat = VectorMetadata {
            source: Some("chat".into()),
            tags: vec!["greeting".into()],
            ..Default::default()
        };
        let file = VectorMetadata {
            source: Some("file".into()),
            ..Default::default()
        };
        store.add_vector("m1", &[1.0, 0.0, 0.0], &chat).await.unwrap();
        store.add_vector("m2", &[1.0, 0.0, 0.0], &file).await.unwrap();

        let filter = VectorFilter {
            source: Some("chat".into()),
            ..Default::default()
        };
        let matches = store
            .search_similar_vectors(&[1.0, 0.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "m1");
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = store();
        store
            .add_vector("m1", &[1.0, 0.0, 0.0], &VectorMetadata::default())
            .await
            .unwrap();
        assert!(store.delete_vector("m1").await.unwrap());
        assert!(!store.delete_vector("m1").await.unwrap());
    }

    #[tokio::test]
    async fn replaces_existing_vector_under_same_id() {
        let store = store();
        let meta = VectorMetadata::default();
        store.add_vector("m1", &[1.0, 0.0, 0.0], &meta).await.unwrap();
        store.add_vector("m1", &[0.0, 1.0, 0.0], &meta).await.unwrap();

        let matches = store
            .search_similar_vectors(&[0.0, 1.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn rejects_mismatched_dimensions() {
        let store = store();
        let err = store
            .add_vector("m1", &[1.0, 0.0], &VectorMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = store();
        store
            .add_vector("m1", &[1.0, 0.0, 0.0], &VectorMetadata::default())
            .await
            .unwrap();
        store.clear_vectors().await.unwrap();
        let matches = store
            .search_similar_vectors(&[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
