// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The structured database contract implemented by every storage engine.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::filter::RecordQuery;
use crate::traits::adapter::BackendAdapter;
use crate::types::{Collection, MemoryRecord};

/// CRUD plus filtered/paginated query over named collections.
///
/// Implementations translate [`RecordQuery`] into their native dialect but
/// must preserve identical observable semantics: tag filters use ALL
/// semantics, timestamp bounds are inclusive, default ordering is
/// descending timestamp, and `limit` bounds the result set.
///
/// Missing records are soft: `get_record` returns `None` and
/// `update_record`/`delete_record` return `false`, never an error.
#[async_trait]
pub trait Database: BackendAdapter {
    /// Connects to the engine and ensures every collection in
    /// [`Collection::ALL`] exists with its schema and indices.
    async fn initialize(&self) -> Result<(), MemoryError>;

    /// Creates the collection's tables/indices if absent. Idempotent.
    async fn ensure_collection(&self, collection: Collection) -> Result<(), MemoryError>;

    /// Inserts a record, replacing any existing record with the same id.
    async fn add_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError>;

    /// Fetches one record by id.
    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError>;

    /// Full-replace update; returns `false` when the id does not exist.
    async fn update_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<bool, MemoryError>;

    /// Deletes one record by id; returns `false` when the id does not exist.
    async fn delete_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, MemoryError>;

    /// Runs a filtered query, honoring the query's sort order and limit.
    async fn query_records(
        &self,
        collection: Collection,
        query: &RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Removes every record in the collection.
    async fn clear_collection(&self, collection: Collection) -> Result<(), MemoryError>;
}
