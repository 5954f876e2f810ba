// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the mnemo memory engine.

use thiserror::Error;

/// The primary error type used across all mnemo backend traits and provider operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend initialization failed (connect failure, missing connection string,
    /// no embedding capability). The provider stays `Uninitialized`.
    #[error("initialization failed: {message}")]
    Initialization {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A component was used before its `initialize()` completed.
    #[error("memory backend is not initialized")]
    NotInitialized,

    /// The caller supplied invalid input (e.g. empty memory content).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No embedding capability could be resolved. Fatal: blocks initialization,
    /// there is no degraded mode without embeddings.
    #[error("embedding unavailable: {message}")]
    EmbeddingUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A backend driver failed during a query or write.
    #[error("{backend} query failed: {source}")]
    Query {
        backend: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A backend kind string did not match any registered backend.
    #[error("unknown backend kind `{kind}` (expected one of: {expected})")]
    UnknownBackend {
        kind: String,
        expected: &'static str,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Wraps a driver error as a [`MemoryError::Query`] for the named backend.
    pub fn query(
        backend: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        MemoryError::Query {
            backend,
            source: source.into(),
        }
    }

    /// Builds an [`MemoryError::Initialization`] without an underlying source.
    pub fn init(message: impl Into<String>) -> Self {
        MemoryError::Initialization {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an [`MemoryError::Initialization`] wrapping an underlying error.
    pub fn init_with(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        MemoryError::Initialization {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// True for errors that the provider's read path softens into empty results.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            MemoryError::Query { .. } | MemoryError::Timeout { .. }
        )
    }
}
