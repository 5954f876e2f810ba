// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis implementation of the [`Database`] trait.
//!
//! Records are JSON strings with SET/ZSET secondary indices maintained in
//! the same MULTI/EXEC pipeline as the record write. Queries hydrate a
//! candidate superset via the planner, then re-check every condition in
//! process.

use std::collections::BTreeSet;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use mnemo_config::RedisConfig;
use mnemo_core::filter::sort_and_truncate;
use mnemo_core::{
    BackendAdapter, BackendType, Collection, Database, HealthStatus, MemoryError, MemoryRecord,
    RecordQuery,
};

use crate::keys::{index_keys_for, KeySpace};
use crate::plan::{plan_query, FetchPlan};

/// Helper to convert driver errors into MemoryError::Query.
fn db_err(e: redis::RedisError) -> MemoryError {
    MemoryError::query("redis", e)
}

/// Redis-backed record store.
///
/// The connection manager is opened lazily by [`Database::initialize`];
/// every other operation fails with [`MemoryError::NotInitialized`] until
/// then.
pub struct RedisDatabase {
    config: RedisConfig,
    manager: OnceCell<ConnectionManager>,
}

impl RedisDatabase {
    /// Create a new store for the given configuration. No connection is
    /// opened until [`Database::initialize`] runs.
    pub fn new(config: RedisConfig) -> Self {
        Self {
            config,
            manager: OnceCell::new(),
        }
    }

    /// Returns a connection handle, or an error if not initialized.
    fn conn(&self) -> Result<ConnectionManager, MemoryError> {
        self.manager
            .get()
            .cloned()
            .ok_or(MemoryError::NotInitialized)
    }

    fn keys(&self, collection: Collection) -> KeySpace {
        KeySpace::new(&self.config.key_prefix, collection)
    }

    async fn connect(config: &RedisConfig) -> Result<ConnectionManager, MemoryError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| MemoryError::init_with("invalid redis url", e))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| MemoryError::init_with("cannot connect to redis", e))?;
        debug!(url = %config.url, "redis database initialized");
        Ok(manager)
    }
}

/// Serialize a record for storage, with the transient relevance stripped.
fn serialize_record(record: &MemoryRecord) -> Result<String, MemoryError> {
    let mut stored = record.clone();
    stored.metadata = stored.metadata.persistable();
    serde_json::to_string(&stored)
        .map_err(|e| MemoryError::Internal(format!("serialize record: {e}")))
}

#[async_trait]
impl BackendAdapter for RedisDatabase {
    fn name(&self) -> &str {
        "redis"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Database
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        let mut conn = self.conn()?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(db_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        // The connection manager has no explicit close; dropping the last
        // clone tears the multiplexed connection down.
        Ok(())
    }
}

#[async_trait]
impl Database for RedisDatabase {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.manager
            .get_or_try_init(|| Self::connect(&self.config))
            .await?;
        Ok(())
    }

    async fn ensure_collection(&self, _collection: Collection) -> Result<(), MemoryError> {
        // Collections exist implicitly through their keys.
        self.conn().map(|_| ())
    }

    async fn add_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError> {
        let keys = self.keys(collection);
        let mut conn = self.conn()?;
        let json = serialize_record(record)?;

        // A replaced record may have carried different source/type/tags;
        // its stale index memberships are removed in the same transaction.
        let old: Option<String> = conn.get(keys.record(&record.id)).await.map_err(db_err)?;
        let stale: Vec<String> = old
            .as_deref()
            .and_then(|json| serde_json::from_str::<MemoryRecord>(json).ok())
            .map(|old| index_keys_for(&keys, &old))
            .unwrap_or_default();
        let fresh = index_keys_for(&keys, record);

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.set(keys.record(&record.id), json).ignore();
        pipe.sadd(keys.ids(), &record.id).ignore();
        pipe.zadd(keys.timestamps(), &record.id, record.timestamp)
            .ignore();
        for key in &stale {
            if !fresh.contains(key) {
                pipe.srem(key, &record.id).ignore();
            }
        }
        for key in &fresh {
            pipe.sadd(key, &record.id).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(db_err)?;
        Ok(())
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        let keys = self.keys(collection);
        let mut conn = self.conn()?;
        let value: Option<String> = conn.get(keys.record(id)).await.map_err(db_err)?;
        value
            .as_deref()
            .map(|json| serde_json::from_str(json).map_err(|e| MemoryError::query("redis", e)))
            .transpose()
    }

    async fn update_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<bool, MemoryError> {
        let keys = self.keys(collection);
        let mut conn = self.conn()?;
        let exists: bool = conn
            .exists(keys.record(&record.id))
            .await
            .map_err(db_err)?;
        if !exists {
            return Ok(false);
        }
        self.add_record(collection, record).await?;
        Ok(true)
    }

    async fn delete_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, MemoryError> {
        let keys = self.keys(collection);
        let mut conn = self.conn()?;

        let old: Option<String> = conn.get(keys.record(id)).await.map_err(db_err)?;
        let Some(json) = old else {
            return Ok(false);
        };
        let index_keys = serde_json::from_str::<MemoryRecord>(&json)
            .map(|record| index_keys_for(&keys, &record))
            .unwrap_or_default();

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(keys.record(id)).ignore();
        pipe.srem(keys.ids(), id).ignore();
        pipe.zrem(keys.timestamps(), id).ignore();
        for key in &index_keys {
            pipe.srem(key, id).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(db_err)?;
        Ok(true)
    }

    async fn query_records(
        &self,
        collection: Collection,
        query: &RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let keys = self.keys(collection);
        let mut conn = self.conn()?;

        let ids: Vec<String> = match plan_query(&keys, query) {
            FetchPlan::Intersect(index_keys) => {
                conn.sinter(index_keys).await.map_err(db_err)?
            }
            FetchPlan::ScoreRange { min, max } => {
                let min = min.map_or_else(|| "-inf".to_string(), |v| v.to_string());
                let max = max.map_or_else(|| "+inf".to_string(), |v| v.to_string());
                conn.zrangebyscore(keys.timestamps(), min, max)
                    .await
                    .map_err(db_err)?
            }
            FetchPlan::All => {
                conn.zrevrange(keys.timestamps(), 0, -1)
                    .await
                    .map_err(db_err)?
            }
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let record_keys: Vec<String> = ids.iter().map(|id| keys.record(id)).collect();
        let values: Vec<Option<String>> = conn.mget(record_keys).await.map_err(db_err)?;

        let mut records = Vec::new();
        for value in values.into_iter().flatten() {
            match serde_json::from_str::<MemoryRecord>(&value) {
                Ok(record) => {
                    if query.matches(&record) {
                        records.push(record);
                    }
                }
                Err(error) => warn!(%error, "skipping unparseable record"),
            }
        }
        Ok(sort_and_truncate(records, query))
    }

    async fn clear_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        let keys = self.keys(collection);
        let mut conn = self.conn()?;

        let ids: Vec<String> = conn.smembers(keys.ids()).await.map_err(db_err)?;
        let mut pipe = redis::pipe();
        pipe.atomic();

        if !ids.is_empty() {
            let record_keys: Vec<String> = ids.iter().map(|id| keys.record(id)).collect();
            let values: Vec<Option<String>> =
                conn.mget(&record_keys).await.map_err(db_err)?;
            let mut index_keys = BTreeSet::new();
            for value in values.into_iter().flatten() {
                if let Ok(record) = serde_json::from_str::<MemoryRecord>(&value) {
                    index_keys.extend(index_keys_for(&keys, &record));
                }
            }
            for key in record_keys {
                pipe.del(key).ignore();
            }
            for key in index_keys {
                pipe.del(key).ignore();
            }
        }

        pipe.del(keys.ids()).ignore();
        pipe.del(keys.timestamps()).ignore();
        let _: () = pipe.query_async(&mut conn).await.map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::MemoryMetadata;

    #[test]
    fn serialization_strips_transient_relevance() {
        let record = MemoryRecord {
            id: "mem_1".to_string(),
            content: "x".to_string(),
            timestamp: 1,
            metadata: MemoryMetadata {
                relevance: Some(0.8),
                ..Default::default()
            },
            embedding: Some(vec![1.0]),
        };

        let json = serialize_record(&record).unwrap();
        assert!(!json.contains("relevance"));
        assert!(json.contains("embedding"));

        let restored: MemoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.metadata.relevance, None);
        assert_eq!(restored.embedding, Some(vec![1.0]));
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let store = RedisDatabase::new(RedisConfig::default());
        let err = store
            .get_record(Collection::Memories, "mem_x")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotInitialized));
    }

    #[tokio::test]
    #[ignore = "requires a redis server; set MNEMO_TEST_REDIS_URL"]
    async fn live_record_lifecycle() {
        let url = std::env::var("MNEMO_TEST_REDIS_URL")
            .expect("MNEMO_TEST_REDIS_URL must be set for live tests");
        let store = RedisDatabase::new(RedisConfig {
            url,
            key_prefix: "mnemo_test:".to_string(),
        });
        store.initialize().await.unwrap();
        store.clear_collection(Collection::Memories).await.unwrap();

        let record = MemoryRecord {
            id: "mem_redis_1".to_string(),
            content: "the quick brown fox".to_string(),
            timestamp: 1000,
            metadata: MemoryMetadata {
                source: Some("conversation".to_string()),
                tags: vec!["animal".to_string()],
                ..Default::default()
            },
            embedding: None,
        };
        store.add_record(Collection::Memories, &record).await.unwrap();

        let by_source = store
            .query_records(
                Collection::Memories,
                &RecordQuery::new().with_source("conversation"),
            )
            .await
            .unwrap();
        assert_eq!(by_source.len(), 1);

        // Replacing with a different source must drop the stale index entry.
        let mut moved = record.clone();
        moved.metadata.source = Some("manual".to_string());
        store.add_record(Collection::Memories, &moved).await.unwrap();

        let by_old_source = store
            .query_records(
                Collection::Memories,
                &RecordQuery::new().with_source("conversation"),
            )
            .await
            .unwrap();
        assert!(by_old_source.is_empty());

        assert!(store
            .delete_record(Collection::Memories, "mem_redis_1")
            .await
            .unwrap());
        store.clear_collection(Collection::Memories).await.unwrap();
    }
}
