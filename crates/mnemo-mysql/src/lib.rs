// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MySQL database backend for the Mnemo memory engine.
//!
//! Stores records as JSON rows with BLOB embeddings; tags are mirrored
//! into indexed side tables so tag filters never scan JSON.

pub mod schema;
pub mod sql;
pub mod store;

pub use store::MysqlDatabase;
