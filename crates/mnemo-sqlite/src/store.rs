// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`Database`] trait.
//!
//! All access runs through tokio-rusqlite's single background thread, which
//! serializes writes without table locks. Tags are mirrored into a relational
//! side table inside the same transaction as the record write.

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio::sync::OnceCell;
use tokio_rusqlite::Connection;
use tracing::debug;

use mnemo_config::SqliteConfig;
use mnemo_core::vector::{blob_to_vec, vec_to_blob};
use mnemo_core::{
    BackendAdapter, BackendType, Collection, Database, HealthStatus, MemoryError, MemoryRecord,
    RecordQuery,
};

use crate::schema::{collection_ddl, tag_table, PRAGMAS};
use crate::sql::{build_select, RECORD_COLUMNS};

/// Helper to convert tokio_rusqlite errors into MemoryError::Query.
fn db_err(e: tokio_rusqlite::Error) -> MemoryError {
    MemoryError::query("sqlite", e)
}

/// SQLite-backed record store.
///
/// The connection is opened lazily by [`Database::initialize`]; every other
/// operation fails with [`MemoryError::NotInitialized`] until then.
pub struct SqliteDatabase {
    config: SqliteConfig,
    conn: OnceCell<Connection>,
}

impl SqliteDatabase {
    /// Create a new store for the given configuration. No file is touched
    /// until [`Database::initialize`] runs.
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            conn: OnceCell::new(),
        }
    }

    /// Returns the live connection, or an error if not initialized.
    fn conn(&self) -> Result<&Connection, MemoryError> {
        self.conn.get().ok_or(MemoryError::NotInitialized)
    }

    /// Open the database file, apply PRAGMAs, and ensure every collection.
    async fn open(config: &SqliteConfig) -> Result<Connection, MemoryError> {
        if let Some(parent) = std::path::Path::new(&config.path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::init_with(
                    format!("cannot create database directory for {}", config.path),
                    e,
                )
            })?;
        }

        let conn = Connection::open(&config.path)
            .await
            .map_err(|e| MemoryError::init_with(format!("cannot open {}", config.path), e))?;

        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            for collection in Collection::ALL {
                conn.execute_batch(&collection_ddl(collection))?;
            }
            Ok(())
        })
        .await
        .map_err(db_err)?;

        debug!(path = %config.path, "sqlite database initialized");
        Ok(conn)
    }

    /// Serialize record metadata for storage, with the transient relevance
    /// score stripped.
    fn metadata_json(record: &MemoryRecord) -> Result<String, MemoryError> {
        serde_json::to_string(&record.metadata.persistable())
            .map_err(|e| MemoryError::Internal(format!("serialize metadata: {e}")))
    }
}

#[async_trait]
impl BackendAdapter for SqliteDatabase {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Database
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
impl Database for SqliteDatabase {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.conn
            .get_or_try_init(|| Self::open(&self.config))
            .await?;
        Ok(())
    }

    async fn ensure_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        let conn = self.conn()?;
        let ddl = collection_ddl(collection);
        conn.call(move |conn| {
            conn.execute_batch(&ddl)?;
            Ok(())
        })
        .await
        .map_err(db_err)
    }

    async fn add_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError> {
        let conn = self.conn()?;
        let table = collection.table_name();
        let tags_table = tag_table(collection);

        let id = record.id.clone();
        let content = record.content.clone();
        let metadata = Self::metadata_json(record)?;
        let timestamp = record.timestamp;
        let embedding = record.embedding.as_deref().map(vec_to_blob);
        let tags = record.metadata.tags.clone();

        conn.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO {table} (id, content, metadata, timestamp, embedding) \
                     VALUES (?1, ?2, ?3, ?4, ?5) \
                     ON CONFLICT(id) DO UPDATE SET content = excluded.content, \
                     metadata = excluded.metadata, timestamp = excluded.timestamp, \
                     embedding = excluded.embedding"
                ),
                rusqlite::params![id, content, metadata, timestamp, embedding],
            )?;
            tx.execute(
                &format!("DELETE FROM {tags_table} WHERE record_id = ?1"),
                rusqlite::params![id],
            )?;
            for tag in &tags {
                tx.execute(
                    &format!("INSERT OR IGNORE INTO {tags_table} (record_id, tag) VALUES (?1, ?2)"),
                    rusqlite::params![id, tag],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(db_err)
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        let conn = self.conn()?;
        let table = collection.table_name();
        let id = id.to_string();
        conn.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM {table} WHERE id = ?1"
            ))?;
            let record = stmt
                .query_row(rusqlite::params![id], row_to_record)
                .optional()?;
            Ok(record)
        })
        .await
        .map_err(db_err)
    }

    async fn update_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<bool, MemoryError> {
        let conn = self.conn()?;
        let table = collection.table_name();
        let tags_table = tag_table(collection);

        let id = record.id.clone();
        let content = record.content.clone();
        let metadata = Self::metadata_json(record)?;
        let timestamp = record.timestamp;
        let embedding = record.embedding.as_deref().map(vec_to_blob);
        let tags = record.metadata.tags.clone();

        conn.call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                &format!(
                    "UPDATE {table} SET content = ?2, metadata = ?3, timestamp = ?4, \
                     embedding = ?5 WHERE id = ?1"
                ),
                rusqlite::params![id, content, metadata, timestamp, embedding],
            )?;
            if changed > 0 {
                tx.execute(
                    &format!("DELETE FROM {tags_table} WHERE record_id = ?1"),
                    rusqlite::params![id],
                )?;
                for tag in &tags {
                    tx.execute(
                        &format!(
                            "INSERT OR IGNORE INTO {tags_table} (record_id, tag) VALUES (?1, ?2)"
                        ),
                        rusqlite::params![id, tag],
                    )?;
                }
            }
            tx.commit()?;
            Ok(changed > 0)
        })
        .await
        .map_err(db_err)
    }

    async fn delete_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, MemoryError> {
        let conn = self.conn()?;
        let table = collection.table_name();
        let id = id.to_string();
        conn.call(move |conn| {
            let deleted = conn.execute(
                &format!("DELETE FROM {table} WHERE id = ?1"),
                rusqlite::params![id],
            )?;
            Ok(deleted > 0)
        })
        .await
        .map_err(db_err)
    }

    async fn query_records(
        &self,
        collection: Collection,
        query: &RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let conn = self.conn()?;
        let (sql, params) = build_select(collection, query);
        conn.call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(rusqlite::params_from_iter(params), row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
        .map_err(db_err)
    }

    async fn clear_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        let conn = self.conn()?;
        let table = collection.table_name();
        let tags_table = tag_table(collection);
        conn.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(&format!("DELETE FROM {tags_table}"), [])?;
            tx.execute(&format!("DELETE FROM {table}"), [])?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(db_err)
    }
}

/// Hydrate a [`MemoryRecord`] from a `RECORD_COLUMNS` row.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let metadata_json: String = row.get(2)?;
    let embedding_blob: Option<Vec<u8>> = row.get(4)?;
    Ok(MemoryRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        timestamp: row.get(3)?,
        embedding: embedding_blob.map(|blob| blob_to_vec(&blob)),
    })
}
