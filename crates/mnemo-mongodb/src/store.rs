// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MongoDB implementation of the [`Database`] trait.
//!
//! Records are stored one document per record with `_id` as the record id,
//! so upserts and point lookups ride the mandatory unique index. Metadata
//! queries use dotted paths against secondary indices.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, IndexModel};
use tokio::sync::OnceCell;
use tracing::debug;

use mnemo_config::MongodbConfig;
use mnemo_core::{
    BackendAdapter, BackendType, Collection, Database, HealthStatus, MemoryError, MemoryRecord,
    RecordQuery,
};

use crate::filter::{filter_document, sort_document};

/// Helper to convert driver errors into MemoryError::Query.
fn db_err(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> MemoryError {
    MemoryError::query("mongodb", e)
}

struct Handle {
    client: Client,
    database: mongodb::Database,
}

/// MongoDB-backed record store.
///
/// The client is opened lazily by [`Database::initialize`]; every other
/// operation fails with [`MemoryError::NotInitialized`] until then.
pub struct MongoDatabase {
    config: MongodbConfig,
    handle: OnceCell<Handle>,
}

impl MongoDatabase {
    /// Create a new store for the given configuration. No connection is
    /// opened until [`Database::initialize`] runs.
    pub fn new(config: MongodbConfig) -> Self {
        Self {
            config,
            handle: OnceCell::new(),
        }
    }

    fn handle(&self) -> Result<&Handle, MemoryError> {
        self.handle.get().ok_or(MemoryError::NotInitialized)
    }

    /// Returns the driver collection for one of ours.
    fn collection(
        &self,
        collection: Collection,
    ) -> Result<mongodb::Collection<Document>, MemoryError> {
        Ok(self
            .handle()?
            .database
            .collection::<Document>(collection.table_name()))
    }

    /// Connect, verify reachability, and ensure every collection's indices.
    async fn connect(config: &MongodbConfig) -> Result<Handle, MemoryError> {
        let Some(uri) = config.connection_string.as_deref() else {
            return Err(MemoryError::init(
                "database.mongodb.connection_string is not set",
            ));
        };

        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| MemoryError::init_with("cannot create mongodb client", e))?;
        let database = client.database(&config.database);

        // The driver connects lazily; ping so a bad URI fails here, not on
        // the first record write.
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MemoryError::init_with("mongodb ping failed", e))?;

        for collection in Collection::ALL {
            ensure_indices(&database, collection).await?;
        }

        debug!(database = %config.database, "mongodb database initialized");
        Ok(Handle { client, database })
    }
}

/// Create the secondary indices backing metadata, tag, and text queries.
async fn ensure_indices(
    database: &mongodb::Database,
    collection: Collection,
) -> Result<(), MemoryError> {
    let coll = database.collection::<Document>(collection.table_name());
    let keys = [
        doc! { "timestamp": 1 },
        doc! { "metadata.source": 1 },
        doc! { "metadata.type": 1 },
        doc! { "metadata.tags": 1 },
        doc! { "content": "text" },
    ];
    for key in keys {
        coll.create_index(IndexModel::builder().keys(key).build())
            .await
            .map_err(db_err)?;
    }
    Ok(())
}

/// Serialize a record for storage, with the transient relevance stripped
/// and the record id promoted to `_id`.
fn record_to_document(record: &MemoryRecord) -> Result<Document, MemoryError> {
    let metadata = mongodb::bson::to_bson(&record.metadata.persistable())
        .map_err(|e| MemoryError::Internal(format!("serialize metadata: {e}")))?;
    let embedding = match &record.embedding {
        Some(vector) => Bson::Array(vector.iter().map(|v| Bson::Double(f64::from(*v))).collect()),
        None => Bson::Null,
    };
    Ok(doc! {
        "_id": &record.id,
        "content": &record.content,
        "metadata": metadata,
        "timestamp": record.timestamp,
        "embedding": embedding,
    })
}

/// Hydrate a [`MemoryRecord`] from a stored document.
fn document_to_record(document: &Document) -> Result<MemoryRecord, MemoryError> {
    let metadata = document
        .get("metadata")
        .and_then(|bson| mongodb::bson::from_bson(bson.clone()).ok())
        .unwrap_or_default();
    let embedding = document.get_array("embedding").ok().map(|items| {
        items
            .iter()
            .filter_map(Bson::as_f64)
            .map(|v| v as f32)
            .collect()
    });
    Ok(MemoryRecord {
        id: document.get_str("_id").map_err(db_err)?.to_string(),
        content: document.get_str("content").map_err(db_err)?.to_string(),
        timestamp: document.get_i64("timestamp").map_err(db_err)?,
        metadata,
        embedding,
    })
}

#[async_trait]
impl BackendAdapter for MongoDatabase {
    fn name(&self) -> &str {
        "mongodb"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Database
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        let handle = self.handle()?;
        handle
            .database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(db_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        if let Some(handle) = self.handle.get() {
            handle.client.clone().shutdown().await;
            debug!("mongodb client shut down");
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MongoDatabase {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.handle
            .get_or_try_init(|| Self::connect(&self.config))
            .await?;
        Ok(())
    }

    async fn ensure_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        let handle = self.handle()?;
        ensure_indices(&handle.database, collection).await
    }

    async fn add_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError> {
        let coll = self.collection(collection)?;
        let document = record_to_document(record)?;
        coll.replace_one(doc! { "_id": &record.id }, document)
            .upsert(true)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        let coll = self.collection(collection)?;
        let document = coll
            .find_one(doc! { "_id": id })
            .await
            .map_err(db_err)?;
        document.as_ref().map(document_to_record).transpose()
    }

    async fn update_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<bool, MemoryError> {
        let coll = self.collection(collection)?;
        let document = record_to_document(record)?;
        let result = coll
            .replace_one(doc! { "_id": &record.id }, document)
            .await
            .map_err(db_err)?;
        Ok(result.matched_count > 0)
    }

    async fn delete_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, MemoryError> {
        let coll = self.collection(collection)?;
        let result = coll
            .delete_one(doc! { "_id": id })
            .await
            .map_err(db_err)?;
        Ok(result.deleted_count > 0)
    }

    async fn query_records(
        &self,
        collection: Collection,
        query: &RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let coll = self.collection(collection)?;
        let mut find = coll
            .find(filter_document(query))
            .sort(sort_document(query));
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }
        let documents: Vec<Document> = find
            .await
            .map_err(db_err)?
            .try_collect()
            .await
            .map_err(db_err)?;
        documents.iter().map(document_to_record).collect()
    }

    async fn clear_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        let coll = self.collection(collection)?;
        coll.delete_many(doc! {}).await.map_err(db_err)?;
        Ok(())
    }
}
