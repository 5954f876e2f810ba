// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Postgres implementation of the [`Database`] trait.
//!
//! Records live in a configurable schema as JSONB rows; embeddings are
//! `REAL[]` columns. Tag filters ride jsonb containment instead of a side
//! table, so every write is a single statement.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{AssertSqlSafe, PgPool, Row};
use tokio::sync::OnceCell;
use tracing::debug;

use mnemo_config::PostgresConfig;
use mnemo_core::{
    BackendAdapter, BackendType, Collection, Database, HealthStatus, MemoryError, MemoryRecord,
    RecordQuery,
};

use crate::schema::{collection_ddl, is_safe_identifier, schema_ddl};
use crate::sql::{build_select, SqlBind, RECORD_COLUMNS};

/// Helper to convert sqlx errors into MemoryError::Query.
fn db_err(e: sqlx::Error) -> MemoryError {
    MemoryError::query("postgres", e)
}

/// Postgres-backed record store.
///
/// The pool is opened lazily by [`Database::initialize`]; every other
/// operation fails with [`MemoryError::NotInitialized`] until then.
pub struct PgDatabase {
    config: PostgresConfig,
    pool: OnceCell<PgPool>,
}

impl PgDatabase {
    /// Create a new store for the given configuration. No connection is
    /// opened until [`Database::initialize`] runs.
    pub fn new(config: PostgresConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// Returns the live pool, or an error if not initialized.
    fn pool(&self) -> Result<&PgPool, MemoryError> {
        self.pool.get().ok_or(MemoryError::NotInitialized)
    }

    /// Schema-qualified table name for a collection.
    fn table(&self, collection: Collection) -> String {
        format!("{}.{}", self.config.schema, collection.table_name())
    }

    /// Connect, create the schema, and ensure every collection's tables.
    async fn connect(config: &PostgresConfig) -> Result<PgPool, MemoryError> {
        if !is_safe_identifier(&config.schema) {
            return Err(MemoryError::init(format!(
                "postgres schema name `{}` is not a valid identifier",
                config.schema
            )));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| MemoryError::init_with("cannot connect to postgres", e))?;

        sqlx::query(AssertSqlSafe(schema_ddl(&config.schema)))
            .execute(&pool)
            .await
            .map_err(db_err)?;
        for collection in Collection::ALL {
            for statement in collection_ddl(&config.schema, collection) {
                sqlx::query(AssertSqlSafe(statement))
                    .execute(&pool)
                    .await
                    .map_err(db_err)?;
            }
        }

        debug!(schema = %config.schema, "postgres database initialized");
        Ok(pool)
    }
}

/// Replay collected bind values onto a query in order.
fn apply_binds<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    binds: Vec<SqlBind>,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for bind in binds {
        query = match bind {
            SqlBind::Text(value) => query.bind(value),
            SqlBind::Int(value) => query.bind(value),
            SqlBind::Json(value) => query.bind(sqlx::types::Json(value)),
        };
    }
    query
}

/// Hydrate a [`MemoryRecord`] from a `RECORD_COLUMNS` row.
fn row_to_record(row: &PgRow) -> Result<MemoryRecord, sqlx::Error> {
    let metadata: sqlx::types::Json<mnemo_core::MemoryMetadata> = row.try_get("metadata")?;
    let embedding: Option<Vec<f32>> = row.try_get("embedding")?;
    Ok(MemoryRecord {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        metadata: metadata.0,
        timestamp: row.try_get("timestamp")?,
        embedding,
    })
}

#[async_trait]
impl BackendAdapter for PgDatabase {
    fn name(&self) -> &str {
        "postgres"
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
            debug!("postgres pool closed");
        }
        Ok(())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.pool
            .get_or_try_init(|| Self::connect(&self.config))
            .await?;
        Ok(())
    }

    async fn ensure_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        let pool = self.pool()?;
        for statement in collection_ddl(&self.config.schema, collection) {
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
        let sql = format!(
            "INSERT INTO {} (id, content, metadata, timestamp, embedding) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET content = EXCLUDED.content, \
             metadata = EXCLUDED.metadata, timestamp = EXCLUDED.timestamp, \
             embedding = EXCLUDED.embedding",
            self.table(collection)
        );
        sqlx::query(AssertSqlSafe(sql))
            .bind(&record.id)
            .bind(&record.content)
            .bind(sqlx::types::Json(record.metadata.persistable()))
            .bind(record.timestamp)
            .bind(record.embedding.as_deref())
            .execute(pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        let pool = self.pool()?;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE id = $1",
            self.table(collection)
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
        let sql = format!(
            "UPDATE {} SET content = $2, metadata = $3, timestamp = $4, embedding = $5 \
             WHERE id = $1",
            self.table(collection)
        );
        let result = sqlx::query(AssertSqlSafe(sql))
            .bind(&record.id)
            .bind(&record.content)
            .bind(sqlx::types::Json(record.metadata.persistable()))
            .bind(record.timestamp)
            .bind(record.embedding.as_deref())
            .execute(pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, MemoryError> {
        let pool = self.pool()?;
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table(collection));
        let result = sqlx::query(AssertSqlSafe(sql))
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
        let (sql, binds) = build_select(&self.table(collection), query);
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
        let sql = format!("DELETE FROM {}", self.table(collection));
        sqlx::query(AssertSqlSafe(sql)).execute(pool).await.map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::MemoryMetadata;

    fn test_config() -> Option<PostgresConfig> {
        let url = std::env::var("MNEMO_TEST_POSTGRES_URL").ok()?;
        Some(PostgresConfig {
            url,
            schema: "mnemo_test".to_string(),
            max_connections: 2,
        })
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let store = PgDatabase::new(PostgresConfig::default());
        let err = store
            .get_record(Collection::Memories, "mem_x")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotInitialized));
    }

    #[tokio::test]
    async fn rejects_unsafe_schema_name() {
        let config = PostgresConfig {
            schema: "bad;drop".to_string(),
            ..PostgresConfig::default()
        };
        let store = PgDatabase::new(config);
        let err = store.initialize().await.unwrap_err();
        assert!(err.to_string().contains("identifier"));
    }

    #[tokio::test]
    #[ignore = "requires a postgres server; set MNEMO_TEST_POSTGRES_URL"]
    async fn live_record_lifecycle() {
        let Some(config) = test_config() else {
            panic!("MNEMO_TEST_POSTGRES_URL must be set for live tests");
        };
        let store = PgDatabase::new(config);
        store.initialize().await.unwrap();
        store.clear_collection(Collection::Memories).await.unwrap();

        let record = MemoryRecord {
            id: "mem_pg_1".to_string(),
            content: "the quick brown fox".to_string(),
            timestamp: 1000,
            metadata: MemoryMetadata {
                source: Some("conversation".to_string()),
                tags: vec!["animal".to_string(), "classic".to_string()],
                ..Default::default()
            },
            embedding: Some(vec![0.5, -0.25]),
        };
        store.add_record(Collection::Memories, &record).await.unwrap();

        let loaded = store
            .get_record(Collection::Memories, "mem_pg_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.content, "the quick brown fox");
        assert_eq!(loaded.embedding, Some(vec![0.5, -0.25]));

        let by_tags = store
            .query_records(
                Collection::Memories,
                &RecordQuery::new().with_tags(["animal", "classic"]),
            )
            .await
            .unwrap();
        assert_eq!(by_tags.len(), 1);

        let by_text = store
            .query_records(Collection::Memories, &RecordQuery::new().with_text("fox"))
            .await
            .unwrap();
        assert_eq!(by_text.len(), 1);

        assert!(store.delete_record(Collection::Memories, "mem_pg_1").await.unwrap());
        assert!(store
            .get_record(Collection::Memories, "mem_pg_1")
            .await
            .unwrap()
            .is_none());
    }
}
