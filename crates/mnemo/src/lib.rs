// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable semantic memory for host applications.
//!
//! A [`MemoryProvider`] pairs a structured database (the record of truth)
//! with a vector index and an embedding service, and exposes remember /
//! recall / semantic-search operations plus per-session chat history.
//! Backends are selected by configuration and swappable at runtime;
//! everything connects lazily on first use.
//!
//! ```no_run
//! use mnemo::{MemoryMetadata, MemoryProvider, MnemoConfig, SimilarSearchOptions};
//!
//! # async fn demo() -> Result<(), mnemo::MemoryError> {
//! let provider = MemoryProvider::new(MnemoConfig::default());
//!
//! let metadata = MemoryMetadata {
//!     tags: vec!["rust".into()],
//!     ..Default::default()
//! };
//! provider.add_memory("borrow checker rules", metadata).await?;
//!
//! let related = provider
//!     .search_similar_memories("ownership", SimilarSearchOptions::default())
//!     .await?;
//! # let _ = related;
//! # Ok(())
//! # }
//! ```

mod chat;
pub mod events;
pub mod provider;
pub mod registry;

pub use events::{EVENT_CHANNEL_CAPACITY, MemoryEvent};
pub use provider::{MemoryProvider, MemoryProviderBuilder, ProviderState, SimilarSearchOptions};

// The vocabulary types host applications handle directly.
pub use mnemo_config::MnemoConfig;
pub use mnemo_core::{
    ChatMessage, Collection, HealthStatus, MemoryError, MemoryMetadata, MemoryRecord, MessageRole,
    RecordQuery, SortOrder, VectorFilter,
};
