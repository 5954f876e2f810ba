// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MySQL implementation of the [`Database`] trait.
//!
//! Records live in JSON rows with LE-f32 BLOB embeddings; tags are mirrored
//! into a side table inside the same transaction as the record write.
//! Requires MySQL 8.0.19+ for the row-alias upsert form.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{AssertSqlSafe, MySqlPool, Row};
use tokio::sync::OnceCell;
use tracing::debug;

use mnemo_config::MysqlConfig;
use mnemo_core::vector::{blob_to_vec, vec_to_blob};
use mnemo_core::{
    BackendAdapter, BackendType, Collection, Database, HealthStatus, MemoryError, MemoryRecord,
    RecordQuery,
};

use crate::schema::{collection_ddl, tag_table};
use crate::sql::{build_select, SqlBind, RECORD_COLUMNS};

/// Helper to convert sqlx errors into MemoryError::Query.
fn db_err(e: sqlx::Error) -> MemoryError {
    MemoryError::query("mysql", e)
}

/// MySQL-backed record store.
///
/// The pool is opened lazily by [`Database::initialize`]; every other
/// operation fails with [`MemoryError::NotInitialized`] until then.
pub struct MysqlDatabase {
    config: MysqlConfig,
    pool: OnceCell<MySqlPool>,
}

impl MysqlDatabase {
    /// Create a new store for the given configuration. No connection is
    /// opened until [`Database::initialize`] runs.
    pub fn new(config: MysqlConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// Returns the live pool, or an error if not initialized.
    fn pool(&self) -> Result<&MySqlPool, MemoryError> {
        self.pool.get().ok_or(MemoryError::NotInitialized)
    }

    /// Connect and ensure every collection's tables.
    async fn connect(config: &MysqlConfig) -> Result<MySqlPool, MemoryError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| MemoryError::init_with("cannot connect to mysql", e))?;

        for collection in Collection::ALL {
            for statement in collection_ddl(collection) {
                sqlx::query(AssertSqlSafe(statement))
                    .execute(&pool)
                    .await
                    .map_err(db_err)?;
            }
        }

        debug!("mysql database initialized");
        Ok(pool)
    }

    /// Refresh the tag side table rows for a record, inside `tx`.
    async fn refresh_tags(
        tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
        collection: Collection,
        id: &str,
        tags: &[String],
    ) -> Result<(), sqlx::Error> {
        let tags_table = tag_table(collection);
        sqlx::query(AssertSqlSafe(format!(
            "DELETE FROM {tags_table} WHERE record_id = ?"
        )))
        .bind(id)
        .execute(&mut **tx)
        .await?;
        for tag in tags {
            sqlx::query(AssertSqlSafe(format!(
                "INSERT IGNORE INTO {tags_table} (record_id, tag) VALUES (?, ?)"
            )))
            .bind(id)
            .bind(tag)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

/// Replay collected bind values onto a query in order.
fn apply_binds<'q>(
    mut query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    binds: Vec<SqlBind>,
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    for bind in binds {
        query = match bind {
            SqlBind::Text(value) => query.bind(value),
            SqlBind::Int(value) => query.bind(value),
        };
    }
    query
}

/// Hydrate a [`MemoryRecord`] from a `RECORD_COLUMNS` row.
fn row_to_record(row: &MySqlRow) -> Result<MemoryRecord, sqlx::Error> {
    let metadata: sqlx::types::Json<mnemo_core::MemoryMetadata> = row.try_get("metadata")?;
    let embedding_blob: Option<Vec<u8>> = row.try_get("embedding")?;
    Ok(MemoryRecord {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        metadata: metadata.0,
        timestamp: row.try_get("timestamp")?,
        embedding: embedding_blob.map(|blob| blob_to_vec(&blob)),
    })
}

#[async_trait]
impl BackendAdapter for MysqlDatabase {
    fn name(&self) -> &str {
        "mysql"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Database
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        let pool = self.pool()?;
        sqlx::query("SELECT 1").execute(pool).await.map_err(db_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            debug!("mysql pool closed");
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MysqlDatabase {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.pool
            .get_or_try_init(|| Self::connect(&self.config))
            .await?;
        Ok(())
    }

    async fn ensure_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        let pool = self.pool()?;
        for statement in collection_ddl(collection) {
            sqlx::query(AssertSqlSafe(statement))
                .execute(pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn add_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError> {
        let pool = self.pool()?;
        let table = collection.table_name();
        let mut tx = pool.begin().await.map_err(db_err)?;

        sqlx::query(AssertSqlSafe(format!(
            "INSERT INTO {table} (id, content, metadata, timestamp, embedding) \
             VALUES (?, ?, ?, ?, ?) AS new \
             ON DUPLICATE KEY UPDATE content = new.content, metadata = new.metadata, \
             timestamp = new.timestamp, embedding = new.embedding"
        )))
        .bind(&record.id)
        .bind(&record.content)
        .bind(sqlx::types::Json(record.metadata.persistable()))
        .bind(record.timestamp)
        .bind(record.embedding.as_deref().map(vec_to_blob))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        Self::refresh_tags(&mut tx, collection, &record.id, &record.metadata.tags)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        let pool = self.pool()?;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE id = ?",
            collection.table_name()
        );
        let row = sqlx::query(AssertSqlSafe(sql))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_record).transpose().map_err(db_err)
    }

    async fn update_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<bool, MemoryError> {
        let pool = self.pool()?;
        let table = collection.table_name();
        let mut tx = pool.begin().await.map_err(db_err)?;

        // MySQL reports zero affected rows for no-op updates, so existence
        // is checked explicitly rather than via rows_affected.
        let exists: i64 = sqlx::query_scalar(AssertSqlSafe(format!(
            "SELECT COUNT(*) FROM {table} WHERE id = ?"
        )))
        .bind(&record.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if exists == 0 {
            return Ok(false);
        }

        sqlx::query(AssertSqlSafe(format!(
            "UPDATE {table} SET content = ?, metadata = ?, timestamp = ?, embedding = ? \
             WHERE id = ?"
        )))
        .bind(&record.content)
        .bind(sqlx::types::Json(record.metadata.persistable()))
        .bind(record.timestamp)
        .bind(record.embedding.as_deref().map(vec_to_blob))
        .bind(&record.id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        Self::refresh_tags(&mut tx, collection, &record.id, &record.metadata.tags)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn delete_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, MemoryError> {
        let pool = self.pool()?;
        let result = sqlx::query(AssertSqlSafe(format!(
            "DELETE FROM {} WHERE id = ?",
            collection.table_name()
        )))
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_records(
        &self,
        collection: Collection,
        query: &RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let pool = self.pool()?;
        let (sql, binds) = build_select(collection, query);
        let rows = apply_binds(sqlx::query(AssertSqlSafe(sql)), binds)
            .fetch_all(pool)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)
    }

    async fn clear_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        let pool = self.pool()?;
        let mut tx = pool.begin().await.map_err(db_err)?;
        sqlx::query(AssertSqlSafe(format!("DELETE FROM {}", tag_table(collection))))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query(AssertSqlSafe(format!("DELETE FROM {}", collection.table_name())))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }
}
