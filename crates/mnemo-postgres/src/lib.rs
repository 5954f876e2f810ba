// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PostgreSQL database backend for the Mnemo memory engine.
//!
//! Stores records as JSONB rows inside a configurable schema, with GIN
//! indices covering metadata predicates, tag containment, and full-text
//! content search.

pub mod schema;
pub mod sql;
pub mod store;

pub use store::PgDatabase;
