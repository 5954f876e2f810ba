// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store backends.
//!
//! Three implementations of [`mnemo_core::VectorStore`]: a volatile
//! in-memory map, the embedded SQLite-file default, and a remote Qdrant
//! collection. The SQL and HTTP backends are feature-gated so hosts can
//! compile out what they do not ship.

pub mod memory;
#[cfg(feature = "qdrant")]
pub mod qdrant;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryVectorStore;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorStore;
