// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session chat history on top of the structured database.
//!
//! Messages are plain records in the `chat_history` collection: the role
//! rides in `metadata.type`, the owning session in `metadata.sessionId`.
//! History is never embedded; it answers structured queries only.

use serde_json::Value;
use tracing::warn;

use mnemo_core::types::{SESSION_ID_KEY, new_message_id, now_millis};
use mnemo_core::{
    ChatMessage, Collection, MemoryError, MemoryMetadata, MemoryRecord, MessageRole, RecordQuery,
};

use crate::events::MemoryEvent;
use crate::provider::{MemoryProvider, soften};

/// The metadata key the role is persisted under.
const ROLE_KEY: &str = "type";

impl MemoryProvider {
    /// Appends a message to a session's history and returns it.
    pub async fn add_chat_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: impl Into<String>,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<ChatMessage, MemoryError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MemoryError::InvalidInput(
                "chat message content must not be empty".into(),
            ));
        }

        let message = ChatMessage {
            id: new_message_id(),
            session_id: session_id.to_string(),
            role,
            content,
            timestamp: now_millis(),
            metadata,
        };

        self.with_deadline(async {
            let services = self.services().await?;
            services
                .database
                .add_record(Collection::ChatHistory, &message_to_record(&message))
                .await
        })
        .await?;

        metrics::counter!("mnemo_chat_messages_total", "role" => message.role.to_string())
            .increment(1);
        self.emit(MemoryEvent::ChatMessageAppended {
            session_id: message.session_id.clone(),
        });
        Ok(message)
    }

    /// The most recent `limit` messages of one session, in chronological
    /// order. `limit` defaults to `memory.conversation_history_size`.
    pub async fn get_chat_history(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, MemoryError> {
        let limit = limit.unwrap_or(self.config().memory.conversation_history_size);

        let result = self
            .with_deadline(async {
                let services = self.services().await?;
                // Newest-first fetch keeps the window on the latest
                // messages regardless of backend ordering quirks.
                let query = RecordQuery::new()
                    .with_metadata(SESSION_ID_KEY, Value::String(session_id.to_string()))
                    .with_limit(limit);
                services
                    .database
                    .query_records(Collection::ChatHistory, &query)
                    .await
            })
            .await;

        let mut records = soften(result, "get_chat_history")?;
        records.reverse();
        Ok(records.into_iter().map(record_to_message).collect())
    }

    /// Removes one session's history, or every session's when
    /// `session_id` is `None`. Failures propagate.
    pub async fn clear_chat_history(&self, session_id: Option<&str>) -> Result<(), MemoryError> {
        self.with_deadline(async {
            let services = self.services().await?;
            match session_id {
                None => {
                    services
                        .database
                        .clear_collection(Collection::ChatHistory)
                        .await
                }
                Some(session) => {
                    let query = RecordQuery::new()
                        .with_metadata(SESSION_ID_KEY, Value::String(session.to_string()));
                    let records = services
                        .database
                        .query_records(Collection::ChatHistory, &query)
                        .await?;
                    for record in records {
                        services
                            .database
                            .delete_record(Collection::ChatHistory, &record.id)
                            .await?;
                    }
                    Ok(())
                }
            }
        })
        .await?;

        self.emit(MemoryEvent::ChatHistoryCleared {
            session_id: session_id.map(str::to_owned),
        });
        Ok(())
    }
}

/// Lowers a chat message into its stored record form.
fn message_to_record(message: &ChatMessage) -> MemoryRecord {
    let mut metadata = MemoryMetadata {
        kind: Some(message.role.to_string()),
        ..Default::default()
    };
    metadata.extra.insert(
        SESSION_ID_KEY.into(),
        Value::String(message.session_id.clone()),
    );
    for (key, value) in &message.metadata {
        // Reserved keys always reflect the message fields themselves.
        if key != SESSION_ID_KEY && key != ROLE_KEY {
            metadata.extra.insert(key.clone(), value.clone());
        }
    }

    MemoryRecord {
        id: message.id.clone(),
        content: message.content.clone(),
        timestamp: message.timestamp,
        metadata,
        embedding: None,
    }
}

/// Restores a chat message from its stored record form.
fn record_to_message(record: MemoryRecord) -> ChatMessage {
    let role = match record.metadata.kind.as_deref() {
        Some(stored) => MessageRole::parse_lossy(stored),
        None => MessageRole::Human,
    };
    let mut metadata = record.metadata.extra;
    let session_id = match metadata.remove(SESSION_ID_KEY) {
        Some(Value::String(session)) => session,
        Some(other) => {
            warn!(id = %record.id, value = %other, "non-string session id on chat record");
            String::new()
        }
        None => String::new(),
    };

    ChatMessage {
        id: record.id,
        session_id,
        role,
        content: record.content,
        timestamp: record.timestamp,
        metadata,
    }
}
