// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the memory provider over in-process backends.
//!
//! Each test builds an isolated provider with an in-memory database and
//! vector store plus a deterministic embedder. Tests are independent and
//! order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use mnemo::{
    MemoryError, MemoryEvent, MemoryMetadata, MemoryProvider, MessageRole, MnemoConfig,
    ProviderState, RecordQuery, SimilarSearchOptions, VectorFilter,
};
use mnemo_test_utils::{
    CountingDatabase, FailingVectorStore, FlakyDatabase, MemoryDatabase, StaticEmbedder,
};
use mnemo_vector::InMemoryVectorStore;
use tokio::time::sleep;

const DIMENSIONS: usize = 8;

/// Millisecond timestamps are the only sort key, so writes that must
/// order deterministically get spaced apart.
const TICK: Duration = Duration::from_millis(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn provider() -> MemoryProvider {
    provider_with(MnemoConfig::default())
}

fn provider_with(config: MnemoConfig) -> MemoryProvider {
    MemoryProvider::builder(config)
        .with_database(Arc::new(MemoryDatabase::new()))
        .with_vector_store(Arc::new(InMemoryVectorStore::new(DIMENSIONS)))
        .with_text_embedder(Arc::new(StaticEmbedder::new(DIMENSIONS)))
        .build()
}

fn tagged(tags: &[&str]) -> MemoryMetadata {
    MemoryMetadata {
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

// ---- Round trips ----

#[tokio::test]
async fn test_round_trip_preserves_content_and_tags() {
    let provider = provider();
    let added = provider
        .add_memory("the borrow checker", tagged(&["beta", "alpha"]))
        .await
        .unwrap();

    let fetched = provider.get_memory(&added.id).await.unwrap().unwrap();
    assert_eq!(fetched.content, "the borrow checker");

    let mut expected = added.metadata.tags.clone();
    expected.sort();
    let mut actual = fetched.metadata.tags.clone();
    actual.sort();
    assert_eq!(actual, expected);
    assert!(fetched.metadata.relevance.is_none());
}

#[tokio::test]
async fn test_added_memories_get_generated_ids_and_timestamps() {
    let provider = provider();
    let added = provider
        .add_memory("The quick brown fox jumps", tagged(&["animal", "fox"]))
        .await
        .unwrap();

    assert!(added.id.starts_with("mem_"));
    assert!(added.timestamp > 0);
    assert!(added.embedding.is_some());

    let foxes = provider
        .search_memories(RecordQuery::new().with_tags(["fox"]))
        .await
        .unwrap();
    assert_eq!(foxes.len(), 1);
    assert_eq!(foxes[0].id, added.id);

    let dogs = provider
        .search_memories(RecordQuery::new().with_tags(["dog"]))
        .await
        .unwrap();
    assert!(dogs.is_empty());
}

#[tokio::test]
async fn test_tag_filters_require_every_tag() {
    let provider = provider();
    let both = provider
        .add_memory("carries both", tagged(&["a", "b"]))
        .await
        .unwrap();
    provider
        .add_memory("carries only a", tagged(&["a"]))
        .await
        .unwrap();

    let strict = provider
        .search_memories(RecordQuery::new().with_tags(["a", "b"]))
        .await
        .unwrap();
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].id, both.id);

    let loose = provider
        .search_memories(RecordQuery::new().with_tags(["a"]))
        .await
        .unwrap();
    assert_eq!(loose.len(), 2);
}

// ---- Updates and deletes ----

#[tokio::test]
async fn test_update_preserves_id_and_timestamp() {
    let provider = provider();
    let added = provider
        .add_memory("draft wording", MemoryMetadata::default())
        .await
        .unwrap();
    sleep(TICK).await;

    let updated = provider
        .update_memory(&added.id, "final wording", tagged(&["edited"]))
        .await
        .unwrap();
    assert!(updated);

    let fetched = provider.get_memory(&added.id).await.unwrap().unwrap();
    assert_eq!(fetched.content, "final wording");
    assert_eq!(fetched.timestamp, added.timestamp);
    assert_eq!(fetched.metadata.tags, vec!["edited".to_string()]);
}

#[tokio::test]
async fn test_missing_ids_update_and_delete_softly() {
    let provider = provider();
    assert!(
        !provider
            .update_memory("mem_missing", "content", MemoryMetadata::default())
            .await
            .unwrap()
    );
    assert!(!provider.delete_memory("mem_missing").await.unwrap());
}

#[tokio::test]
async fn test_clear_empties_both_stores() {
    let provider = provider();
    provider
        .add_memory("first", MemoryMetadata::default())
        .await
        .unwrap();
    provider
        .add_memory("second", MemoryMetadata::default())
        .await
        .unwrap();

    provider.clear_memories().await.unwrap();

    assert!(provider.get_memories(None).await.unwrap().is_empty());
    let options = SimilarSearchOptions {
        threshold: Some(-1.0),
        ..Default::default()
    };
    assert!(
        provider
            .search_similar_memories("first", options)
            .await
            .unwrap()
            .is_empty()
    );
}

// ---- Retrieval limits ----

#[tokio::test]
async fn test_retrieval_is_newest_first_and_clamped_by_max_memories() {
    let mut config = MnemoConfig::default();
    config.memory.max_memories = 2;
    let provider = provider_with(config);

    for content in ["one", "two", "three"] {
        provider
            .add_memory(content, MemoryMetadata::default())
            .await
            .unwrap();
        sleep(TICK).await;
    }

    let defaulted = provider.get_memories(None).await.unwrap();
    let contents: Vec<_> = defaulted.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, ["three", "two"]);

    // An explicit limit above the cap is still clamped.
    assert_eq!(provider.get_memories(Some(10)).await.unwrap().len(), 2);
    assert_eq!(provider.get_memories(Some(1)).await.unwrap().len(), 1);
}

// ---- Semantic search ----

#[tokio::test]
async fn test_similarity_results_carry_relevance_that_is_never_persisted() {
    let provider = provider();
    let added = provider
        .add_memory("tokio runtime internals", MemoryMetadata::default())
        .await
        .unwrap();

    let options = SimilarSearchOptions {
        threshold: Some(0.5),
        ..Default::default()
    };
    let results = provider
        .search_similar_memories("tokio runtime internals", options)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, added.id);
    let score = results[0].metadata.relevance.expect("score attached");
    assert!(score > 0.99, "identical text should score ~1.0, got {score}");

    let stored = provider.get_memory(&added.id).await.unwrap().unwrap();
    assert!(stored.metadata.relevance.is_none());
}

#[tokio::test]
async fn test_rising_thresholds_never_add_results() {
    let provider = provider();
    for content in ["alpha memory", "beta memory", "gamma memory"] {
        provider
            .add_memory(content, MemoryMetadata::default())
            .await
            .unwrap();
    }

    let mut previous = usize::MAX;
    for threshold in [-1.0f32, 0.0, 0.5, 0.9, 1.01] {
        let options = SimilarSearchOptions {
            threshold: Some(threshold),
            limit: Some(10),
            ..Default::default()
        };
        let results = provider
            .search_similar_memories("alpha memory", options)
            .await
            .unwrap();
        assert!(
            results.len() <= previous,
            "raising the threshold to {threshold} grew the result set"
        );
        previous = results.len();
    }
    // Cosine scores never exceed 1.0, so 1.01 excludes everything.
    assert_eq!(previous, 0);
}

#[tokio::test]
async fn test_similarity_filter_restricts_candidates() {
    let provider = provider();
    let mut from_chat = tagged(&[]);
    from_chat.source = Some("chat".into());
    let mut from_file = tagged(&[]);
    from_file.source = Some("file".into());

    provider
        .add_memory("shared phrasing one", from_chat)
        .await
        .unwrap();
    provider
        .add_memory("shared phrasing two", from_file)
        .await
        .unwrap();

    let options = SimilarSearchOptions {
        threshold: Some(-1.0),
        filter: Some(VectorFilter {
            source: Some("chat".into()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let results = provider
        .search_similar_memories("shared phrasing", options)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(
        results
            .iter()
            .all(|r| r.metadata.source.as_deref() == Some("chat"))
    );
}

#[tokio::test]
async fn test_failing_vector_store_degrades_similarity_to_recency() {
    init_tracing();
    let provider = MemoryProvider::builder(MnemoConfig::default())
        .with_database(Arc::new(MemoryDatabase::new()))
        .with_vector_store(Arc::new(FailingVectorStore))
        .with_text_embedder(Arc::new(StaticEmbedder::new(DIMENSIONS)))
        .build();

    // The vector write fails but the database write is what counts.
    let first = provider
        .add_memory("first note", MemoryMetadata::default())
        .await
        .unwrap();
    sleep(TICK).await;
    let second = provider
        .add_memory("second note", MemoryMetadata::default())
        .await
        .unwrap();

    let results = provider
        .search_similar_memories("anything at all", SimilarSearchOptions::default())
        .await
        .unwrap();
    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, [second.id.as_str(), first.id.as_str()]);
    assert!(results.iter().all(|r| r.metadata.relevance.is_none()));
}

#[tokio::test]
async fn test_database_failures_soften_reads_and_propagate_writes() {
    init_tracing();
    let flaky = Arc::new(FlakyDatabase::new(Arc::new(MemoryDatabase::new())));
    let provider = MemoryProvider::builder(MnemoConfig::default())
        .with_database(flaky.clone())
        .with_vector_store(Arc::new(InMemoryVectorStore::new(DIMENSIONS)))
        .with_text_embedder(Arc::new(StaticEmbedder::new(DIMENSIONS)))
        .build();

    let added = provider
        .add_memory("kept note", MemoryMetadata::default())
        .await
        .unwrap();

    flaky.set_failing(true);

    // Reads degrade to their empty value.
    assert!(provider.get_memories(None).await.unwrap().is_empty());
    assert!(provider.get_memory(&added.id).await.unwrap().is_none());
    assert!(
        provider
            .search_memories(RecordQuery::new())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(!provider.delete_memory(&added.id).await.unwrap());

    // Writes against the record of truth do not.
    let error = provider
        .add_memory("lost note", MemoryMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(error, MemoryError::Query { .. }));
    assert!(provider.clear_memories().await.is_err());

    flaky.set_failing(false);
    let fetched = provider.get_memory(&added.id).await.unwrap();
    assert_eq!(fetched.map(|r| r.content), Some("kept note".into()));
}

// ---- Initialization and settings ----

#[tokio::test]
async fn test_concurrent_initialization_connects_once() {
    let counting = Arc::new(CountingDatabase::new(Arc::new(MemoryDatabase::new())));
    let provider = Arc::new(
        MemoryProvider::builder(MnemoConfig::default())
            .with_database(counting.clone())
            .with_vector_store(Arc::new(InMemoryVectorStore::new(DIMENSIONS)))
            .with_text_embedder(Arc::new(StaticEmbedder::new(DIMENSIONS)))
            .build(),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let provider = Arc::clone(&provider);
        handles.push(tokio::spawn(async move { provider.initialize().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(counting.initialize_count(), 1);
    assert!(provider.is_initialized());
}

#[tokio::test]
async fn test_backend_change_reinitializes_and_tuning_does_not() {
    let counting = Arc::new(CountingDatabase::new(Arc::new(MemoryDatabase::new())));
    let provider = MemoryProvider::builder(MnemoConfig::default())
        .with_database(counting.clone())
        .with_vector_store(Arc::new(InMemoryVectorStore::new(DIMENSIONS)))
        .with_text_embedder(Arc::new(StaticEmbedder::new(DIMENSIONS)))
        .build();

    provider.initialize().await.unwrap();
    assert_eq!(counting.initialize_count(), 1);

    // Tuning-only changes keep the connected backends.
    let mut tuned = MnemoConfig::default();
    tuned.memory.relevance_threshold = 0.4;
    provider.update_memory_settings(tuned).await.unwrap();
    assert!(provider.is_initialized());
    provider
        .add_memory("still connected", MemoryMetadata::default())
        .await
        .unwrap();
    assert_eq!(counting.initialize_count(), 1);

    // A backend kind change resets the generation; the next operation
    // reconnects (the injected override keeps serving the new one).
    let mut moved = MnemoConfig::default();
    moved.memory.database = "redis".into();
    provider.update_memory_settings(moved).await.unwrap();
    assert_eq!(provider.state(), ProviderState::Uninitialized);

    provider
        .add_memory("reconnected", MemoryMetadata::default())
        .await
        .unwrap();
    assert_eq!(counting.initialize_count(), 2);
}

#[tokio::test]
async fn test_unknown_backend_kind_fails_initialization() {
    let mut config = MnemoConfig::default();
    config.memory.database = "couch".into();
    let provider = MemoryProvider::builder(config)
        .with_vector_store(Arc::new(InMemoryVectorStore::new(DIMENSIONS)))
        .with_text_embedder(Arc::new(StaticEmbedder::new(DIMENSIONS)))
        .build();

    let error = provider.initialize().await.unwrap_err();
    let rendered = error.to_string();
    assert!(rendered.contains("`couch`"));
    assert!(rendered.contains("sqlite, postgres, mysql, mongodb, redis"));
    assert_eq!(provider.state(), ProviderState::Uninitialized);
}

#[tokio::test]
async fn test_provider_without_embedding_capability_refuses_to_initialize() {
    // No adapter, no callback, no api key: nothing can produce vectors.
    let provider = MemoryProvider::builder(MnemoConfig::default())
        .with_database(Arc::new(MemoryDatabase::new()))
        .with_vector_store(Arc::new(InMemoryVectorStore::new(DIMENSIONS)))
        .build();

    let error = provider.initialize().await.unwrap_err();
    assert!(matches!(error, MemoryError::EmbeddingUnavailable { .. }));
}

// ---- Chat history ----

#[tokio::test]
async fn test_chat_history_is_per_session_and_chronological() {
    let provider = provider();
    for turn in 0..3 {
        provider
            .add_chat_message("s1", MessageRole::Human, format!("s1 turn {turn}"), Default::default())
            .await
            .unwrap();
        sleep(TICK).await;
        provider
            .add_chat_message("s2", MessageRole::Ai, format!("s2 turn {turn}"), Default::default())
            .await
            .unwrap();
        sleep(TICK).await;
    }

    let history = provider.get_chat_history("s1", None).await.unwrap();
    let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["s1 turn 0", "s1 turn 1", "s1 turn 2"]);
    assert!(history.iter().all(|m| m.session_id == "s1"));
    assert!(history.iter().all(|m| m.role == MessageRole::Human));
    assert!(
        history
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    );
}

#[tokio::test]
async fn test_history_limit_keeps_the_most_recent_messages() {
    let provider = provider();
    for turn in 0..5 {
        provider
            .add_chat_message("s1", MessageRole::Human, format!("turn {turn}"), Default::default())
            .await
            .unwrap();
        sleep(TICK).await;
    }

    let recent = provider.get_chat_history("s1", Some(2)).await.unwrap();
    let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["turn 3", "turn 4"]);
}

#[tokio::test]
async fn test_clearing_one_session_leaves_the_others() {
    let provider = provider();
    provider
        .add_chat_message("s1", MessageRole::Human, "s1 says", Default::default())
        .await
        .unwrap();
    provider
        .add_chat_message("s2", MessageRole::Human, "s2 says", Default::default())
        .await
        .unwrap();

    provider.clear_chat_history(Some("s1")).await.unwrap();
    assert!(provider.get_chat_history("s1", None).await.unwrap().is_empty());
    assert_eq!(provider.get_chat_history("s2", None).await.unwrap().len(), 1);

    provider.clear_chat_history(None).await.unwrap();
    assert!(provider.get_chat_history("s2", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_chat_messages_are_rejected() {
    let provider = provider();
    let error = provider
        .add_chat_message("s1", MessageRole::Human, "   ", Default::default())
        .await
        .unwrap_err();
    assert!(matches!(error, MemoryError::InvalidInput(_)));
}

// ---- Events ----

#[tokio::test]
async fn test_observers_receive_change_events() {
    let provider = provider();
    let mut events = provider.subscribe();

    let added = provider
        .add_memory("observed", MemoryMetadata::default())
        .await
        .unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        MemoryEvent::MemoryAdded {
            id: added.id.clone()
        }
    );

    assert!(provider.delete_memory(&added.id).await.unwrap());
    assert_eq!(
        events.recv().await.unwrap(),
        MemoryEvent::MemoryDeleted {
            id: added.id.clone()
        }
    );

    provider.clear_memories().await.unwrap();
    assert_eq!(events.recv().await.unwrap(), MemoryEvent::MemoriesCleared);

    provider
        .add_chat_message("s1", MessageRole::Ai, "hi", Default::default())
        .await
        .unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        MemoryEvent::ChatMessageAppended {
            session_id: "s1".into()
        }
    );

    provider.clear_chat_history(Some("s1")).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        MemoryEvent::ChatHistoryCleared {
            session_id: Some("s1".into())
        }
    );
}
