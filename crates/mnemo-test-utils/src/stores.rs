// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fault-injecting and instrumented backend wrappers for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use mnemo_core::{
    BackendAdapter, BackendType, Collection, Database, HealthStatus, MemoryError, MemoryRecord,
    RecordQuery, VectorFilter, VectorMatch, VectorMetadata, VectorStore,
};

fn injected_failure(backend: &'static str) -> MemoryError {
    MemoryError::query(backend, "injected failure".to_string())
}

/// A vector store whose every operation fails after a successful
/// `initialize`. Exercises the provider's degraded fallback paths.
pub struct FailingVectorStore;

#[async_trait]
impl BackendAdapter for FailingVectorStore {
    fn name(&self) -> &str {
        "failing-vector"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        Ok(HealthStatus::Unhealthy("injected failure".into()))
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn initialize(&self) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn add_vector(
        &self,
        _id: &str,
        _vector: &[f32],
        _metadata: &VectorMetadata,
    ) -> Result<(), MemoryError> {
        Err(injected_failure("failing-vector"))
    }

    async fn delete_vector(&self, _id: &str) -> Result<bool, MemoryError> {
        Err(injected_failure("failing-vector"))
    }

    async fn clear_vectors(&self) -> Result<(), MemoryError> {
        Err(injected_failure("failing-vector"))
    }

    async fn search_similar_vectors(
        &self,
        _query: &[f32],
        _limit: usize,
        _filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorMatch>, MemoryError> {
        Err(injected_failure("failing-vector"))
    }
}

/// A database wrapper that can be flipped into a failing state at any
/// point, while delegating to a real store otherwise.
pub struct FlakyDatabase {
    inner: Arc<dyn Database>,
    failing: AtomicBool,
}

impl FlakyDatabase {
    pub fn new(inner: Arc<dyn Database>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    /// Switch failure injection on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), MemoryError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(injected_failure("flaky-database"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BackendAdapter for FlakyDatabase {
    fn name(&self) -> &str {
        "flaky-database"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Database
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        self.guard()?;
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl Database for FlakyDatabase {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.guard()?;
        self.inner.initialize().await
    }

    async fn ensure_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        self.guard()?;
        self.inner.ensure_collection(collection).await
    }

    async fn add_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError> {
        self.guard()?;
        self.inner.add_record(collection, record).await
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        self.guard()?;
        self.inner.get_record(collection, id).await
    }

    async fn update_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<bool, MemoryError> {
        self.guard()?;
        self.inner.update_record(collection, record).await
    }

    async fn delete_record(&self, collection: Collection, id: &str) -> Result<bool, MemoryError> {
        self.guard()?;
        self.inner.delete_record(collection, id).await
    }

    async fn query_records(
        &self,
        collection: Collection,
        query: &RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.guard()?;
        self.inner.query_records(collection, query).await
    }

    async fn clear_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        self.guard()?;
        self.inner.clear_collection(collection).await
    }
}

/// A delegating database that counts calls per operation family.
pub struct CountingDatabase {
    inner: Arc<dyn Database>,
    initializes: AtomicUsize,
    adds: AtomicUsize,
    gets: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    queries: AtomicUsize,
    clears: AtomicUsize,
}

impl CountingDatabase {
    pub fn new(inner: Arc<dyn Database>) -> Self {
        Self {
            inner,
            initializes: AtomicUsize::new(0),
            adds: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }

    pub fn initialize_count(&self) -> usize {
        self.initializes.load(Ordering::SeqCst)
    }

    pub fn add_count(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for CountingDatabase {
    fn name(&self) -> &str {
        "counting-database"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Database
    }

    async fn health_check(&self) -> Result<HealthStatus, MemoryError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), MemoryError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl Database for CountingDatabase {
    async fn initialize(&self) -> Result<(), MemoryError> {
        self.initializes.fetch_add(1, Ordering::SeqCst);
        self.inner.initialize().await
    }

    async fn ensure_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        self.inner.ensure_collection(collection).await
    }

    async fn add_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.inner.add_record(collection, record).await
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_record(collection, id).await
    }

    async fn update_record(
        &self,
        collection: Collection,
        record: &MemoryRecord,
    ) -> Result<bool, MemoryError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_record(collection, record).await
    }

    async fn delete_record(&self, collection: Collection, id: &str) -> Result<bool, MemoryError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_record(collection, id).await
    }

    async fn query_records(
        &self,
        collection: Collection,
        query: &RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query_records(collection, query).await
    }

    async fn clear_collection(&self, collection: Collection) -> Result<(), MemoryError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear_collection(collection).await
    }
}
