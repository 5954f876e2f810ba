// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite database backend for the Mnemo memory engine.
//!
//! Provides WAL-mode SQLite storage with a single-writer concurrency model
//! via `tokio-rusqlite`. Records live in per-collection tables with their
//! metadata as JSON; tags are mirrored into indexed side tables so tag
//! filters never scan JSON.

pub mod schema;
pub mod sql;
pub mod store;

pub use store::SqliteDatabase;
