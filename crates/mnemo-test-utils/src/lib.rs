// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mnemo integration tests.
//!
//! Deterministic embedders, an in-process database, and fault-injecting
//! wrappers, enabling fast CI-runnable tests without external services.

pub mod database;
pub mod embedder;
pub mod stores;

pub use database::MemoryDatabase;
pub use embedder::StaticEmbedder;
pub use stores::{CountingDatabase, FailingVectorStore, FlakyDatabase};
