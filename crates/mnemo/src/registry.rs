// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps the `memory.database` / `memory.vector_store` selector strings to
//! backend constructors.
//!
//! Construction is cheap and never touches the network; backends connect
//! lazily inside their own `initialize()`. Unknown selector strings fail
//! here with the full list of valid kinds, before any connection attempt.

use std::sync::Arc;

use mnemo_config::MnemoConfig;
use mnemo_core::{Database, DatabaseKind, MemoryError, VectorStore, VectorStoreKind};
use mnemo_vector::InMemoryVectorStore;

/// Builds the database backend selected by `memory.database`.
pub fn build_database(config: &MnemoConfig) -> Result<Arc<dyn Database>, MemoryError> {
    let kind: DatabaseKind =
        config
            .memory
            .database
            .parse()
            .map_err(|_| MemoryError::UnknownBackend {
                kind: config.memory.database.clone(),
                expected: DatabaseKind::EXPECTED,
            })?;

    match kind {
        #[cfg(feature = "sqlite")]
        DatabaseKind::Sqlite => Ok(Arc::new(mnemo_sqlite::SqliteDatabase::new(
            config.database.sqlite.clone(),
        ))),
        #[cfg(feature = "postgres")]
        DatabaseKind::Postgres => Ok(Arc::new(mnemo_postgres::PgDatabase::new(
            config.database.postgres.clone(),
        ))),
        #[cfg(feature = "mysql")]
        DatabaseKind::Mysql => Ok(Arc::new(mnemo_mysql::MysqlDatabase::new(
            config.database.mysql.clone(),
        ))),
        #[cfg(feature = "mongodb")]
        DatabaseKind::Mongodb => Ok(Arc::new(mnemo_mongodb::MongoDatabase::new(
            config.database.mongodb.clone(),
        ))),
        #[cfg(feature = "redis")]
        DatabaseKind::Redis => Ok(Arc::new(mnemo_redis::RedisDatabase::new(
            config.database.redis.clone(),
        ))),
        #[allow(unreachable_patterns)]
        other => Err(MemoryError::init(format!(
            "database backend `{other}` is not compiled into this build"
        ))),
    }
}

/// Builds the vector store selected by `memory.vector_store`.
pub fn build_vector_store(config: &MnemoConfig) -> Result<Arc<dyn VectorStore>, MemoryError> {
    let kind: VectorStoreKind =
        config
            .memory
            .vector_store
            .parse()
            .map_err(|_| MemoryError::UnknownBackend {
                kind: config.memory.vector_store.clone(),
                expected: VectorStoreKind::EXPECTED,
            })?;
    let dimensions = config.vector.dimensions;

    match kind {
        VectorStoreKind::Memory => Ok(Arc::new(InMemoryVectorStore::new(dimensions))),
        #[cfg(feature = "sqlite")]
        VectorStoreKind::Sqlite => Ok(Arc::new(mnemo_vector::SqliteVectorStore::new(
            config.vector.sqlite.clone(),
            dimensions,
        ))),
        #[cfg(feature = "qdrant")]
        VectorStoreKind::Qdrant => Ok(Arc::new(mnemo_vector::QdrantVectorStore::new(
            config.vector.qdrant.clone(),
            dimensions,
        )?)),
        #[allow(unreachable_patterns)]
        other => Err(MemoryError::init(format!(
            "vector store `{other}` is not compiled into this build"
        ))),
    }
}
