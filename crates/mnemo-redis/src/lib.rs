// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis database backend.
//!
//! Stores records as JSON strings under prefixed keys and maintains SET and
//! ZSET secondary indices for source, type, tags and timestamps. Filtering
//! beyond what the indices answer happens in process after hydration.

pub mod keys;
pub mod plan;
pub mod store;

pub use store::RedisDatabase;
