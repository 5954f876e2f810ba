// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend trait definitions for the mnemo plugin architecture.
//!
//! All backends extend the [`BackendAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod database;
pub mod embedding;
pub mod vector;

pub use adapter::BackendAdapter;
pub use database::Database;
pub use embedding::{EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, TextEmbedder};
pub use vector::VectorStore;
