// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait every pluggable backend must implement.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::types::{BackendType, HealthStatus};

/// The base trait for all mnemo backends.
///
/// Every backend (database, vector store, embedding) implements this trait,
/// which provides identity, health check, and lifecycle teardown.
#[async_trait]
pub trait BackendAdapter: Send + Sync + 'static {
    /// Returns the backend's kind name (e.g. `"sqlite"`, `"qdrant"`).
    fn name(&self) -> &str;

    /// Returns the semantic version of this backend implementation.
    fn version(&self) -> semver::Version;

    /// Returns which backend family this adapter belongs to.
    fn backend_type(&self) -> BackendType;

    /// Performs a health check and returns the backend's current status.
    async fn health_check(&self) -> Result<HealthStatus, MemoryError>;

    /// Gracefully shuts down the backend, releasing held resources.
    async fn shutdown(&self) -> Result<(), MemoryError>;
}
