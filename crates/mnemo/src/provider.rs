// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory provider: orchestrates the structured database, the vector
//! index, and the embedding service behind one async API.
//!
//! Backends are built lazily on first use. The current service set lives
//! in a generation cell: concurrent first calls collapse into a single
//! initialization, and a settings change that affects connections swaps
//! in a fresh empty generation so the next operation reconnects. The
//! database is the record of truth; the vector index is an acceleration
//! structure that may lag behind it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{OnceCell, broadcast};
use tracing::{debug, info, warn};

use mnemo_config::MnemoConfig;
use mnemo_core::types::{FILE_PATH_KEY, SESSION_ID_KEY, new_memory_id, now_millis};
use mnemo_core::{
    Collection, Database, EmbeddingAdapter, HealthStatus, MemoryError, MemoryMetadata,
    MemoryRecord, RecordQuery, TextEmbedder, VectorFilter, VectorMetadata, VectorStore,
};
use mnemo_embedding::EmbeddingService;

use crate::events::{EVENT_CHANNEL_CAPACITY, MemoryEvent};
use crate::registry;

/// Where the provider is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// No backends connected; the next operation will connect.
    Uninitialized,
    /// A connection attempt is in flight.
    Initializing,
    /// Backends are connected and serving.
    Initialized,
}

/// One connected set of backends. Replaced wholesale on reconfiguration;
/// in-flight operations keep the set they started with.
pub(crate) struct Services {
    pub(crate) database: Arc<dyn Database>,
    pub(crate) vector_store: Arc<dyn VectorStore>,
    pub(crate) embedding: EmbeddingService,
}

/// Explicit backend instances that take precedence over the registry.
#[derive(Default, Clone)]
struct BackendOverrides {
    database: Option<Arc<dyn Database>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    embedding_adapter: Option<Arc<dyn EmbeddingAdapter>>,
    text_embedder: Option<Arc<dyn TextEmbedder>>,
}

/// Tuning knobs for [`MemoryProvider::search_similar_memories`].
#[derive(Debug, Clone, Default)]
pub struct SimilarSearchOptions {
    /// Maximum number of hits; defaults to `memory.context_window_size`.
    pub limit: Option<usize>,
    /// Minimum cosine score. Defaults to `memory.relevance_threshold`;
    /// an explicit value is taken as-is, including values outside [0, 1].
    pub threshold: Option<f32>,
    /// Metadata restriction evaluated inside the vector store.
    pub filter: Option<VectorFilter>,
}

/// The semantic memory engine host applications talk to.
pub struct MemoryProvider {
    config: ArcSwap<MnemoConfig>,
    generation: ArcSwap<OnceCell<Arc<Services>>>,
    overrides: BackendOverrides,
    events: broadcast::Sender<MemoryEvent>,
    initializing: AtomicBool,
}

impl MemoryProvider {
    /// Creates a provider whose backends come from the configuration via
    /// the registry. Nothing connects until the first operation.
    pub fn new(config: MnemoConfig) -> Self {
        Self::with_overrides(config, BackendOverrides::default())
    }

    /// Starts a builder for injecting explicit backend instances.
    pub fn builder(config: MnemoConfig) -> MemoryProviderBuilder {
        MemoryProviderBuilder {
            config,
            overrides: BackendOverrides::default(),
        }
    }

    fn with_overrides(config: MnemoConfig, overrides: BackendOverrides) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        MemoryProvider {
            config: ArcSwap::from_pointee(config),
            generation: ArcSwap::from_pointee(OnceCell::new()),
            overrides,
            events,
            initializing: AtomicBool::new(false),
        }
    }

    /// Connects all backends now instead of on first use. Safe to call
    /// concurrently; every caller awaits the same in-flight attempt.
    pub async fn initialize(&self) -> Result<(), MemoryError> {
        self.services().await.map(|_| ())
    }

    pub fn state(&self) -> ProviderState {
        if self.generation.load().get().is_some() {
            ProviderState::Initialized
        } else if self.initializing.load(Ordering::SeqCst) {
            ProviderState::Initializing
        } else {
            ProviderState::Uninitialized
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == ProviderState::Initialized
    }

    pub fn enabled(&self) -> bool {
        self.config.load().memory.enabled
    }

    /// Snapshot of the live configuration.
    pub fn config(&self) -> Arc<MnemoConfig> {
        self.config.load_full()
    }

    /// Subscribes to change notifications. Each subscriber gets an
    /// independent cursor; see [`EVENT_CHANNEL_CAPACITY`] for backlog.
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    /// Stores a new memory and returns the persisted record, embedding
    /// included. Blank content is rejected before any backend is touched.
    pub async fn add_memory(
        &self,
        content: impl Into<String>,
        metadata: MemoryMetadata,
    ) -> Result<MemoryRecord, MemoryError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MemoryError::InvalidInput(
                "memory content must not be empty".into(),
            ));
        }

        let record = self
            .with_deadline(async {
                let services = self.services().await?;
                let mut record = MemoryRecord {
                    id: new_memory_id(),
                    content,
                    timestamp: now_millis(),
                    metadata: metadata.persistable(),
                    embedding: None,
                };
                record.embedding = Some(services.embedding.embed_query(&record.content).await?);

                services
                    .database
                    .add_record(Collection::Memories, &record)
                    .await?;

                if let Some(vector) = &record.embedding {
                    let pruned = VectorMetadata::from_metadata(&record.metadata);
                    if let Err(error) = services
                        .vector_store
                        .add_vector(&record.id, vector, &pruned)
                        .await
                    {
                        // The database copy is the record of truth; a missing
                        // index entry only costs recall until the next write
                        // of this id.
                        warn!(id = %record.id, error = %error, "vector index write failed");
                    }
                }
                Ok(record)
            })
            .await?;

        metrics::counter!("mnemo_memories_added_total").increment(1);
        self.emit(MemoryEvent::MemoryAdded {
            id: record.id.clone(),
        });
        Ok(record)
    }

    /// Most recent memories, newest first. `limit` defaults to and is
    /// clamped by `memory.max_memories`.
    pub async fn get_memories(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let max = self.config.load().memory.max_memories;
        let limit = limit.map_or(max, |requested| requested.min(max));

        let result = self
            .with_deadline(async {
                let services = self.services().await?;
                let query = RecordQuery::new().with_limit(limit);
                services
                    .database
                    .query_records(Collection::Memories, &query)
                    .await
            })
            .await;
        soften(result, "get_memories")
    }

    /// Fetches one memory by id; `None` on miss.
    pub async fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let result = self
            .with_deadline(async {
                let services = self.services().await?;
                services.database.get_record(Collection::Memories, id).await
            })
            .await;
        soften(result, "get_memory")
    }

    /// Full-replace update keeping the original id and timestamp. The
    /// content is re-embedded and both stores refreshed. Returns `false`
    /// when the id does not exist or the update fails.
    pub async fn update_memory(
        &self,
        id: &str,
        content: impl Into<String>,
        metadata: MemoryMetadata,
    ) -> Result<bool, MemoryError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MemoryError::InvalidInput(
                "memory content must not be empty".into(),
            ));
        }

        let result = self
            .with_deadline(async {
                let services = self.services().await?;
                let Some(existing) = services
                    .database
                    .get_record(Collection::Memories, id)
                    .await?
                else {
                    return Ok(false);
                };

                let mut record = MemoryRecord {
                    id: existing.id,
                    content,
                    timestamp: existing.timestamp,
                    metadata: metadata.persistable(),
                    embedding: None,
                };
                record.embedding = Some(services.embedding.embed_query(&record.content).await?);

                let updated = services
                    .database
                    .update_record(Collection::Memories, &record)
                    .await?;
                if updated && let Some(vector) = &record.embedding {
                    let pruned = VectorMetadata::from_metadata(&record.metadata);
                    if let Err(error) = services
                        .vector_store
                        .add_vector(&record.id, vector, &pruned)
                        .await
                    {
                        warn!(id = %record.id, error = %error, "vector index refresh failed");
                    }
                }
                Ok(updated)
            })
            .await;
        soften(result, "update_memory")
    }

    /// Best-effort delete from both stores. Missing ids are not errors;
    /// returns `false` on miss or query failure.
    pub async fn delete_memory(&self, id: &str) -> Result<bool, MemoryError> {
        let result = self
            .with_deadline(async {
                let services = self.services().await?;
                let deleted = services
                    .database
                    .delete_record(Collection::Memories, id)
                    .await?;
                if let Err(error) = services.vector_store.delete_vector(id).await {
                    warn!(id, error = %error, "vector index delete failed");
                }
                Ok(deleted)
            })
            .await;

        let deleted = soften(result, "delete_memory")?;
        if deleted {
            self.emit(MemoryEvent::MemoryDeleted { id: id.to_string() });
        }
        Ok(deleted)
    }

    /// Empties both stores. Errors propagate; there is no partial-clear
    /// recovery beyond retrying.
    pub async fn clear_memories(&self) -> Result<(), MemoryError> {
        self.with_deadline(async {
            let services = self.services().await?;
            services
                .database
                .clear_collection(Collection::Memories)
                .await?;
            services.vector_store.clear_vectors().await
        })
        .await?;

        self.emit(MemoryEvent::MemoriesCleared);
        Ok(())
    }

    /// Structured search against the database. Free text rides as a
    /// `TextSearch` condition on the query.
    pub async fn search_memories(
        &self,
        query: RecordQuery,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let result = self
            .with_deadline(async {
                let services = self.services().await?;
                services
                    .database
                    .query_records(Collection::Memories, &query)
                    .await
            })
            .await;
        soften(result, "search_memories")
    }

    /// Semantic search: embeds `text`, asks the vector store for the
    /// nearest entries, then hydrates full records from the database.
    ///
    /// Hits scoring below the threshold are dropped; survivors carry
    /// their score in `metadata.relevance` and come back in descending
    /// relevance order. When the vector path fails for any reason the
    /// search falls back to a structured recency query derived from the
    /// metadata filter.
    pub async fn search_similar_memories(
        &self,
        text: &str,
        options: SimilarSearchOptions,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let memory_config = self.config.load().memory.clone();
        let limit = options.limit.unwrap_or(memory_config.context_window_size);
        let threshold = options
            .threshold
            .unwrap_or(memory_config.relevance_threshold);

        let vector_result = self
            .with_deadline(async {
                let services = self.services().await?;
                let embedding = services.embedding.embed_query(text).await?;
                let matches = services
                    .vector_store
                    .search_similar_vectors(&embedding, limit, options.filter.as_ref())
                    .await?;

                let mut results = Vec::with_capacity(matches.len());
                for hit in matches {
                    if hit.score < threshold {
                        continue;
                    }
                    match services
                        .database
                        .get_record(Collection::Memories, &hit.id)
                        .await
                    {
                        Ok(Some(mut record)) => {
                            record.metadata.relevance = Some(hit.score);
                            results.push(record);
                        }
                        Ok(None) => {
                            warn!(id = %hit.id, "similarity hit has no database row, skipping");
                        }
                        Err(error) => {
                            warn!(id = %hit.id, error = %error, "similarity hit failed to hydrate, skipping");
                        }
                    }
                }
                results.sort_by(|a, b| {
                    let left = a.metadata.relevance.unwrap_or(f32::MIN);
                    let right = b.metadata.relevance.unwrap_or(f32::MIN);
                    right.partial_cmp(&left).unwrap_or(std::cmp::Ordering::Equal)
                });
                Ok(results)
            })
            .await;

        match vector_result {
            Ok(results) => {
                metrics::counter!("mnemo_similarity_searches_total").increment(1);
                Ok(results)
            }
            Err(error) => {
                // Recency is a usable stand-in for relevance while the
                // vector path is down.
                warn!(error = %error, "similarity search degraded to structured search");
                metrics::counter!(
                    "mnemo_degraded_fallbacks_total",
                    "operation" => "search_similar_memories"
                )
                .increment(1);
                self.search_memories(fallback_query(options.filter.as_ref(), limit))
                    .await
            }
        }
    }

    /// Validates and swaps the live configuration.
    ///
    /// Backend or connection changes reset the provider so the next
    /// operation reconnects against the new settings; the old backends
    /// get a best-effort background shutdown. Tuning-only changes take
    /// effect immediately. No data moves between backends.
    pub async fn update_memory_settings(&self, config: MnemoConfig) -> Result<(), MemoryError> {
        if let Err(errors) = mnemo_config::validation::validate_config(&config) {
            let rendered = errors
                .iter()
                .map(|error| error.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MemoryError::Config(rendered));
        }

        let current = Arc::new(config);
        let previous = self.config.swap(Arc::clone(&current));

        if requires_reconnect(&previous, &current) {
            let old_generation = self.generation.swap(Arc::new(OnceCell::new()));
            info!(
                database = %current.memory.database,
                vector_store = %current.memory.vector_store,
                "memory backends changed, reconnecting on next use"
            );
            if let Some(services) = old_generation.get() {
                let services = Arc::clone(services);
                tokio::spawn(async move {
                    shutdown_services(&services).await;
                });
            }
        } else {
            debug!("memory settings updated in place");
        }
        Ok(())
    }

    /// Health of the connected backends, keyed by backend name.
    pub async fn health(&self) -> Result<Vec<(String, HealthStatus)>, MemoryError> {
        self.with_deadline(async {
            let services = self.services().await?;
            let mut report = Vec::with_capacity(2);

            let database_status = services
                .database
                .health_check()
                .await
                .unwrap_or_else(|error| HealthStatus::Unhealthy(error.to_string()));
            report.push((services.database.name().to_string(), database_status));

            let vector_status = services
                .vector_store
                .health_check()
                .await
                .unwrap_or_else(|error| HealthStatus::Unhealthy(error.to_string()));
            report.push((services.vector_store.name().to_string(), vector_status));

            Ok(report)
        })
        .await
    }

    /// Disconnects the current backends, if any. The provider returns to
    /// `Uninitialized` and may be used again afterwards.
    pub async fn shutdown(&self) -> Result<(), MemoryError> {
        let generation = self.generation.swap(Arc::new(OnceCell::new()));
        if let Some(services) = generation.get() {
            services.database.shutdown().await?;
            services.vector_store.shutdown().await?;
        }
        Ok(())
    }

    /// Current service set, connecting on first use. Concurrent callers
    /// share one connection attempt; a failed attempt leaves the
    /// generation empty so the next call retries.
    pub(crate) async fn services(&self) -> Result<Arc<Services>, MemoryError> {
        let generation = self.generation.load_full();
        if let Some(services) = generation.get() {
            return Ok(Arc::clone(services));
        }
        let services = generation.get_or_try_init(|| self.connect()).await?;
        Ok(Arc::clone(services))
    }

    async fn connect(&self) -> Result<Arc<Services>, MemoryError> {
        self.initializing.store(true, Ordering::SeqCst);
        let result = self.connect_inner().await;
        self.initializing.store(false, Ordering::SeqCst);
        result
    }

    async fn connect_inner(&self) -> Result<Arc<Services>, MemoryError> {
        let config = self.config.load_full();
        if !config.memory.enabled {
            return Err(MemoryError::init(
                "memory is disabled in configuration (memory.enabled = false)",
            ));
        }

        let database = match &self.overrides.database {
            Some(database) => Arc::clone(database),
            None => registry::build_database(&config)?,
        };
        let vector_store = match &self.overrides.vector_store {
            Some(store) => Arc::clone(store),
            None => registry::build_vector_store(&config)?,
        };
        let embedding = EmbeddingService::resolve(
            &config.embedding,
            self.overrides.embedding_adapter.clone(),
            self.overrides.text_embedder.clone(),
        )?;

        database.initialize().await?;
        if let Err(error) = vector_store.initialize().await {
            // A failed generation must not hold a live database connection.
            if let Err(shutdown_error) = database.shutdown().await {
                warn!(error = %shutdown_error, "database shutdown after failed init failed");
            }
            return Err(error);
        }

        info!(
            database = database.name(),
            vector_store = vector_store.name(),
            embedding = embedding.source_name(),
            "memory provider connected"
        );
        Ok(Arc::new(Services {
            database,
            vector_store,
            embedding,
        }))
    }

    /// Runs `operation` under the configured per-operation deadline.
    pub(crate) async fn with_deadline<T, F>(&self, operation: F) -> Result<T, MemoryError>
    where
        F: Future<Output = Result<T, MemoryError>>,
    {
        let deadline = Duration::from_secs(self.config.load().memory.operation_timeout_secs);
        match tokio::time::timeout(deadline, operation).await {
            Ok(result) => result,
            Err(_) => Err(MemoryError::Timeout { duration: deadline }),
        }
    }

    pub(crate) fn emit(&self, event: MemoryEvent) {
        // Send only fails when nobody subscribes; events are advisory.
        let _ = self.events.send(event);
    }
}

/// Injects explicit backends ahead of the configuration-driven registry.
/// Hosts use this to supply their own embedders; tests use it to swap in
/// in-process fakes.
pub struct MemoryProviderBuilder {
    config: MnemoConfig,
    overrides: BackendOverrides,
}

impl MemoryProviderBuilder {
    pub fn with_database(mut self, database: Arc<dyn Database>) -> Self {
        self.overrides.database = Some(database);
        self
    }

    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.overrides.vector_store = Some(store);
        self
    }

    /// Batch embedding capability; wins over every other embedding source.
    pub fn with_embedding_adapter(mut self, adapter: Arc<dyn EmbeddingAdapter>) -> Self {
        self.overrides.embedding_adapter = Some(adapter);
        self
    }

    /// Per-text embedding callback; used when no batch adapter is given.
    pub fn with_text_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.overrides.text_embedder = Some(embedder);
        self
    }

    pub fn build(self) -> MemoryProvider {
        MemoryProvider::with_overrides(self.config, self.overrides)
    }
}

/// Softens degradable read-path failures into the type's empty value.
pub(crate) fn soften<T: Default>(
    result: Result<T, MemoryError>,
    operation: &'static str,
) -> Result<T, MemoryError> {
    match result {
        Err(error) if error.is_degradable() => {
            warn!(operation, error = %error, "memory operation degraded to empty result");
            metrics::counter!("mnemo_degraded_fallbacks_total", "operation" => operation)
                .increment(1);
            Ok(T::default())
        }
        other => other,
    }
}

/// True when the new configuration selects different backends or changes
/// how any backend or the embedding service connects.
fn requires_reconnect(previous: &MnemoConfig, current: &MnemoConfig) -> bool {
    previous.memory.enabled != current.memory.enabled
        || previous.memory.database != current.memory.database
        || previous.memory.vector_store != current.memory.vector_store
        || previous.database != current.database
        || previous.vector != current.vector
        || previous.embedding != current.embedding
}

/// Rebuilds the nearest structured equivalent of a vector filter.
fn fallback_query(filter: Option<&VectorFilter>, limit: usize) -> RecordQuery {
    let mut query = RecordQuery::new().with_limit(limit);
    let Some(filter) = filter else {
        return query;
    };
    if let Some(source) = &filter.source {
        query = query.with_source(source.clone());
    }
    if let Some(kind) = &filter.kind {
        query = query.with_kind(kind.clone());
    }
    if !filter.tags.is_empty() {
        query = query.with_tags(filter.tags.clone());
    }
    if let Some(session_id) = &filter.session_id {
        query = query.with_metadata(
            SESSION_ID_KEY,
            serde_json::Value::String(session_id.clone()),
        );
    }
    if let Some(file_path) = &filter.file_path {
        query = query.with_metadata(FILE_PATH_KEY, serde_json::Value::String(file_path.clone()));
    }
    query
}

async fn shutdown_services(services: &Services) {
    if let Err(error) = services.database.shutdown().await {
        warn!(error = %error, "database shutdown failed");
    }
    if let Err(error) = services.vector_store.shutdown().await {
        warn!(error = %error, "vector store shutdown failed");
    }
}
