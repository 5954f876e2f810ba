// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent vector store on a single SQLite file.
//!
//! Vectors are little-endian f32 BLOBs, metadata is JSON text. Similarity
//! search is a linear scan inside the connection's worker thread; there is
//! no ANN index, so this store suits the embedded default where collections
//! stay in the tens of thousands.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_rusqlite::Connection;
use tracing::debug;

use mnemo_config::VectorSqliteConfig;
use mnemo_core::vector::{blob_to_vec, cosine_similarity, vec_to_blob};
use mnemo_core::{
    BackendAdapter, BackendType, HealthStatus, MemoryError, VectorFilter, VectorMatch,
    VectorMetadata, VectorStore,
};

const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 5000;
";

const DDL: &str = "
    CREATE TABLE IF NOT EXISTS vectors (
        id        TEXT PRIMARY KEY,
        embedding BLOB NOT NULL,
        metadata  TEXT NOT NULL DEFAULT '{}'
    );
";

/// Helper to convert tokio_rusqlite errors into MemoryError::Query.
fn db_err(e: tokio_rusqlite::Error) -> MemoryError {
    MemoryError::query("sqlite", e)
}

/// SQLite-file vector store.
///
/// The file is opened lazily by [`VectorStore::initialize`]; every other
/// operation fails with [`MemoryError::NotInitialized`] until then.
pub struct SqliteVectorStore {
    config: VectorSqliteConfig,
    dimensions: usize,
    conn: OnceCell<Connection>,
}

impl SqliteVectorStore {
    /// Create a new store for the given configuration. No file is touched
    /// until [`VectorStore::initialize`] runs.
    pub fn new(config: VectorSqliteConfig, dimensions: usize) -> Self {
        Self {
            config,
            dimensions,
            conn: OnceCell::new(),
        }
    }

    fn conn(&self) -> Result<&Connection, MemoryError> {
        self.conn.get().ok_or(MemoryError::NotInitialized)
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

    async fn open(config: &VectorSqliteConfig) -> Result<Connection, MemoryError> {
        if let Some(parent) = std::path::Path::new(&config.path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::init_with(
                    format!("cannot create vector store directory for {}", config.path),
                    e,
                )
            })?;
        }

        let conn = Connection::open(&config.path)
            .await
            .map_err(|e| MemoryError::init_with(format!("cannot open {}", config.path), e))?;

        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            conn.execute_batch(DDL)?;
            Ok(())
        })
        .await
        .map_err(db_err)?;

        debug!(path = %config.path, "sqlite vector store initialized");
        Ok(conn)
    }
}

#[async_trait]
impl BackendAdapter for SqliteVectorStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        let conn = self.conn()?;
        conn.call(|conn| {
            conn.execute_batch("SELECT 1;")?;
            Ok(())
        })
        .await
        .map_err(db_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        if let Some(conn) = self.conn.get() {
            conn.call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(db_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.conn
            .get_or_try_init(|| Self::open(&self.config))
            .await?;
        Ok(())
    }

    async fn add_vector(
        &self,
        id: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<(), MemoryError> {
        self.check_dimensions(vector)?;
        let conn = self.conn()?;
        let id = id.to_string();
        let blob = vec_to_blob(vector);
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| MemoryError::Internal(format!("serialize vector metadata: {e}")))?;

        conn.call(move |conn| {
            conn.execute(
                "INSERT INTO vectors (id, embedding, metadata) VALUES (?1, ?2, ?3)
                 ON CONFLICT (id) DO UPDATE SET
                     embedding = excluded.embedding,
                     metadata = excluded.metadata",
                rusqlite::params![id, blob, metadata_json],
            )?;
            Ok(())
        })
        .await
        .map_err(db_err)
    }

    async fn delete_vector(&self, id: &str) -> Result<bool, MemoryError> {
        let conn = self.conn()?;
        let id = id.to_string();
        let changed = conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM vectors WHERE id = ?1", rusqlite::params![id])?)
            })
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    async fn clear_vectors(&self) -> Result<(), MemoryError> {
        let conn = self.conn()?;
        conn.call(|conn| {
            conn.execute("DELETE FROM vectors", [])?;
            Ok(())
        })
        .await
        .map_err(db_err)
    }

    async fn search_similar_vectors(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorMatch>, MemoryError> {
        self.check_dimensions(query)?;
        let conn = self.conn()?;
        let query = query.to_vec();
        let filter = filter.cloned();

        let matches = conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id, embedding, metadata FROM vectors")?;
                let rows = stmt.query_map([], |row| {
                    let id: String = row.get(0)?;
                    let blob: Vec<u8> = row.get(1)?;
                    let metadata_json: String = row.get(2)?;
                    Ok((id, blob, metadata_json))
                })?;

                let mut matches = Vec::new();
                for row in rows {
                    let (id, blob, metadata_json) = row?;
                    // Unreadable metadata means the row cannot satisfy any
                    // filter, but an unfiltered search still scores it.
                    let metadata: VectorMetadata =
                        serde_json::from_str(&metadata_json).unwrap_or_default();
                    if let Some(filter) = &filter
                        && !filter.matches(&metadata)
                    {
                        continue;
                    }
                    let vector = blob_to_vec(&blob);
                    matches.push(VectorMatch {
                        id,
                        score: cosine_similarity(&query, &vector),
                    });
                }
                matches.sort_by(|a, b| {
                    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
                });
                matches.truncate(limit);
                Ok(matches)
            })
            .await
            .map_err(db_err)?;
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> VectorSqliteConfig {
        VectorSqliteConfig {
            path: dir
                .path()
                .join("vectors.db")
                .to_string_lossy()
                .into_owned(),
        }
    }

    async fn open_store(dir: &TempDir) -> SqliteVectorStore {
        let store = SqliteVectorStore::new(config(dir), 3);
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::new(config(&dir), 3);
        let err = store.delete_vector("v1").await.unwrap_err();
        assert!(matches!(err, MemoryError::NotInitialized));
    }

    #[tokio::test]
    async fn add_search_delete_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let meta = VectorMetadata::default();

        store.add_vector("a", &[1.0, 0.0, 0.0], &meta).await.unwrap();
        store.add_vector("b", &[0.0, 1.0, 0.0], &meta).await.unwrap();

        let matches = store
            .search_similar_vectors(&[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(matches[0].id, "a");
        assert!((matches[0].score - 1.0).abs() < 1e-6);

        assert!(store.delete_vector("a").await.unwrap());
        assert!(!store.delete_vector("a").await.unwrap());
    }

    #[tokio::test]
    async fn filter_is_applied_before_scoring() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let tagged = VectorMetadata {
            tags: vec!["rust".into(), "memory".into()],
            ..Default::default()
        };
        store
            .add_vector("tagged", &[1.0, 0.0, 0.0], &tagged)
            .await
            .unwrap();
        store
            .add_vector("plain", &[1.0, 0.0, 0.0], &VectorMetadata::default())
            .await
            .unwrap();

        let filter = VectorFilter {
            tags: vec!["rust".into()],
            ..Default::default()
        };
        let matches = store
            .search_similar_vectors(&[1.0, 0.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "tagged");
    }

    #[tokio::test]
    async fn vectors_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir).await;
            store
                .add_vector(
                    "persisted",
                    &[0.5, 0.5, 0.0],
                    &VectorMetadata {
                        source: Some("file".into()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            store.shutdown().await.unwrap();
        }

        let store = open_store(&dir).await;
        let matches = store
            .search_similar_vectors(&[0.5, 0.5, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "persisted");

        // Metadata survived too: a mismatched filter excludes the row.
        let filter = VectorFilter {
            source: Some("chat".into()),
            ..Default::default()
        };
        let matches = store
            .search_similar_vectors(&[0.5, 0.5, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn rejects_mismatched_dimensions() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let err = store
            .add_vector("v", &[1.0], &VectorMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn clear_empties_the_table() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        store
            .add_vector("v", &[1.0, 0.0, 0.0], &VectorMetadata::default())
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
