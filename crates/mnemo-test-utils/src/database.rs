// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HashMap-backed [`Database`] for fast provider tests.
//!
//! Matches the semantics of the real backends, including transient
//! relevance stripping on write and newest-first default ordering, without
//! touching disk or a server.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use mnemo_core::filter::sort_and_truncate;
use mnemo_core::{
    BackendAdapter, BackendType, Collection, Database, HealthStatus, MemoryError, MemoryRecord,
    RecordQuery,
};

#[derive(Default)]
struct Tables {
    memories: HashMap<String, MemoryRecord>,
    chat_history: HashMap<String, MemoryRecord>,
}

impl Tables {
    fn table(&self, collection: Collection) -> &HashMap<String, MemoryRecord> {
        match collection {
            Collection::Memories => &self.memories,
            Collection::ChatHistory => &self.chat_history,
        }
    }

    fn table_mut(&mut self, collection: Collection) -> &mut HashMap<String, MemoryRecord> {
        match collection {
            Collection::Memories => &mut self.memories,
            Collection::ChatHistory => &mut self.chat_history,
        }
    }
}

/// Volatile in-process database.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

fn stored_copy(record: &MemoryRecord) -> MemoryRecord {
    let mut stored = record.clone();
    stored.metadata = stored.metadata.persistable();
    stored
}

#[async_trait]
impl BackendAdapter for MemoryDatabase {
    fn name(&self) -> &str {
        "memory-database"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Database
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn initialize(&self) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn ensure_collection(&self, _collection: Collection) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn add_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError> {
        self.tables
            .write()
            .await
            .table_mut(collection)
            .insert(record.id.clone(), stored_copy(record));
        Ok(())
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        Ok(self.tables.read().await.table(collection).get(id).cloned())
    }

    async fn update_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<bool, MemoryError> {
        let mut tables = self.tables.write().await;
        let table = tables.table_mut(collection);
        if !table.contains_key(&record.id) {
            return Ok(false);
        }
        table.insert(record.id.clone(), stored_copy(record));
        Ok(true)
    }

    async fn delete_record(&self, collection: Collection, id: &str) -> Result<bool, MemoryError> {
        Ok(self
            .tables
            .write()
            .await
            .table_mut(collection)
            .remove(id)
            .is_some())
    }

    async fn query_records(
        &self,
        collection: Collection,
        query: &RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let tables = self.tables.read().await;
        let records: Vec<MemoryRecord> = tables
            .table(collection)
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        Ok(sort_and_truncate(records, query))
    }

    async fn clear_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        self.tables.write().await.table_mut(collection).clear();
        Ok(())
    }
}
