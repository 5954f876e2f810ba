// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the mnemo memory engine.
//!
//! This crate provides the foundational trait definitions, error types, the
//! record/filter data model, and vector-index types used throughout the
//! mnemo workspace. All backend plugins implement traits defined here.

pub mod error;
pub mod filter;
pub mod traits;
pub mod types;
pub mod vector;

// Re-export key items at crate root for ergonomic imports.
pub use error::MemoryError;
pub use filter::{Condition, RecordQuery, SortOrder};
pub use types::{
    BackendType, ChatMessage, Collection, DatabaseKind, HealthStatus, MemoryMetadata,
    MemoryRecord, MessageRole, VectorStoreKind,
};
pub use vector::{VectorFilter, VectorMatch, VectorMetadata};

pub use traits::{
    BackendAdapter, Database, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, TextEmbedder,
    VectorStore,
};
