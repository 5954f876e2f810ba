// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding pipeline for the memory engine.
//!
//! Resolves the embedding capability (host adapter, per-text callback, or
//! hosted OpenAI-compatible API) and wraps it with order-preserving bounded
//! concurrency and retry.

pub mod hosted;
pub mod service;

pub use hosted::HostedEmbeddingClient;
pub use service::{EmbeddingService, EmbeddingSource};
