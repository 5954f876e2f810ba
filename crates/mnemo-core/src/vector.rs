// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector-store data types: pruned index metadata, candidate filters,
//! similarity scoring, and the BLOB encoding shared by SQLite-backed stores.

use serde::{Deserialize, Serialize};

use crate::types::{FILE_PATH_KEY, MemoryMetadata, SESSION_ID_KEY};

/// Upper bound on tags copied into vector-store metadata. Index metadata
/// must stay small and filterable; overflow tags remain queryable through
/// the structured database.
pub const MAX_VECTOR_TAGS: usize = 16;

/// The pruned metadata stored next to each vector.
///
/// Only the allow-listed scalar keys survive the transformation from
/// [`MemoryMetadata`]: `source`, `type`, a size-capped tag array, and the
/// linkage keys `sessionId`/`filePath`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    #[serde(
        rename = "filePath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_path: Option<String>,
}

impl VectorMetadata {
    /// Prunes full record metadata down to the indexable allow-list.
    pub fn from_metadata(metadata: &MemoryMetadata) -> Self {
        let string_extra = |key: &str| {
            metadata
                .extra
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        };
        VectorMetadata {
            source: metadata.source.clone(),
            kind: metadata.kind.clone(),
            tags: metadata.tags.iter().take(MAX_VECTOR_TAGS).cloned().collect(),
            session_id: string_extra(SESSION_ID_KEY),
            file_path: string_extra(FILE_PATH_KEY),
        }
    }
}

/// Candidate restriction for a similarity search: exact match on the scalar
/// keys, ALL-semantics inclusion on tags. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub source: Option<String>,
    pub kind: Option<String>,
    pub tags: Vec<String>,
    pub session_id: Option<String>,
    pub file_path: Option<String>,
}

impl VectorFilter {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.kind.is_none()
            && self.tags.is_empty()
            && self.session_id.is_none()
            && self.file_path.is_none()
    }

    /// Evaluates the filter against stored vector metadata.
    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        fn scalar(expected: &Option<String>, actual: &Option<String>) -> bool {
            match expected {
                Some(want) => actual.as_deref() == Some(want.as_str()),
                None => true,
            }
        }
        scalar(&self.source, &metadata.source)
            && scalar(&self.kind, &metadata.kind)
            && scalar(&self.session_id, &metadata.session_id)
            && scalar(&self.file_path, &metadata.file_path)
            && self
                .tags
                .iter()
                .all(|tag| metadata.tags.iter().any(|t| t == tag))
    }
}

/// One similarity-search hit: the record id and its cosine score.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
}

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// Length mismatches and zero-magnitude vectors score 0.0 rather than
/// erroring; stale or malformed index entries must not fail a search.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Encodes an f32 vector as little-endian bytes for BLOB storage.
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decodes a little-endian BLOB back into an f32 vector. Trailing partial
/// chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
