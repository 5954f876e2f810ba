// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across backend traits and the mnemo engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Metadata key carrying the owning session id on chat history records.
pub const SESSION_ID_KEY: &str = "sessionId";

/// Metadata key linking a memory record to the file it was chunked from.
pub const FILE_PATH_KEY: &str = "filePath";

/// Generates a new memory record id of the form `mem_<uuid-v4>`.
pub fn new_memory_id() -> String {
    format!("mem_{}", uuid::Uuid::new_v4())
}

/// Generates a new chat message id of the form `msg_<uuid-v4>`.
pub fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4())
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Health status reported by backend health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Backend is fully operational.
    Healthy,
    /// Backend is operational but experiencing issues.
    Degraded(String),
    /// Backend is not operational.
    Unhealthy(String),
}

/// Identifies the family a backend belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum BackendType {
    Database,
    VectorStore,
    Embedding,
}

/// The structured database engines selectable via `memory.database`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Sqlite,
    Postgres,
    Mysql,
    Mongodb,
    Redis,
}

impl DatabaseKind {
    /// Comma-separated list of valid kind strings, used in error messages.
    pub const EXPECTED: &'static str = "sqlite, postgres, mysql, mongodb, redis";
}

/// The vector store backends selectable via `memory.vector_store`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    Memory,
    Sqlite,
    Qdrant,
}

impl VectorStoreKind {
    /// Comma-separated list of valid kind strings, used in error messages.
    pub const EXPECTED: &'static str = "memory, sqlite, qdrant";
}

/// A named partition within the structured database.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Memories,
    ChatHistory,
}

impl Collection {
    /// All collections the engine manages; used by `initialize` to ensure each.
    pub const ALL: [Collection; 2] = [Collection::Memories, Collection::ChatHistory];

    /// The collection's canonical table/collection name.
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Memories => "memories",
            Collection::ChatHistory => "chat_history",
        }
    }
}

/// Typed metadata attached to a memory record.
///
/// `source`, `kind` (persisted as `type`) and `tags` are the recognized,
/// indexed fields; everything else rides in the flattened `extra` bag.
/// `relevance` is transient: attached to similarity-search results, stripped
/// before any persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MemoryMetadata {
    /// Looks up a metadata value by its persisted key, covering both the
    /// recognized fields and the free-form bag.
    pub fn value(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "source" => self.source.clone().map(serde_json::Value::String),
            "type" => self.kind.clone().map(serde_json::Value::String),
            "tags" => Some(serde_json::Value::Array(
                self.tags
                    .iter()
                    .map(|t| serde_json::Value::String(t.clone()))
                    .collect(),
            )),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Copy with the transient relevance score removed; applied before every
    /// database or vector-store write.
    pub fn persistable(&self) -> Self {
        let mut meta = self.clone();
        meta.relevance = None;
        meta
    }
}

/// A persisted unit of semantic content. One record lives in the structured
/// database (durable copy) and, when embedded, in the vector store (index copy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch; default sort key (descending).
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: MemoryMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryRecord {
    /// Creates a record with a fresh `mem_<uuid>` id and the current timestamp.
    pub fn new(content: impl Into<String>, metadata: MemoryMetadata) -> Self {
        MemoryRecord {
            id: new_memory_id(),
            content: content.into(),
            timestamp: now_millis(),
            metadata,
            embedding: None,
        }
    }
}

/// Who authored a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Ai,
    System,
}

impl MessageRole {
    /// Parses a stored role string, tolerating unknown values so that records
    /// written by other tooling cannot poison history reads.
    pub fn parse_lossy(value: &str) -> Self {
        value.parse().unwrap_or(MessageRole::Human)
    }
}

/// One message within a per-session conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    /// Milliseconds since the Unix epoch; non-decreasing within a session.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChatMessage {
    /// Creates a message with a fresh `msg_<uuid>` id and the current timestamp.
    pub fn new(
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        ChatMessage {
            id: new_message_id(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            timestamp: now_millis(),
            metadata: serde_json::Map::new(),
        }
    }
}
