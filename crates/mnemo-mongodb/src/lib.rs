// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MongoDB database backend for the Mnemo memory engine.
//!
//! Stores one document per record with the record id as `_id`, secondary
//! indices on timestamp and the recognized metadata fields, and a text
//! index for content search.

pub mod filter;
pub mod store;

pub use store::MongoDatabase;
