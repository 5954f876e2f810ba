// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change notifications broadcast to memory observers.
//!
//! Events fire after the database write succeeds and carry ids only,
//! never record contents. Settings panels and context-refresh logic
//! subscribe through [`crate::MemoryProvider::subscribe`].

/// Backlog kept per subscriber; slower receivers observe `Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// A change to the memory or chat-history state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEvent {
    /// A memory record was stored.
    MemoryAdded { id: String },
    /// A memory record was removed.
    MemoryDeleted { id: String },
    /// The whole memories collection was emptied.
    MemoriesCleared,
    /// A chat message was appended to a session.
    ChatMessageAppended { session_id: String },
    /// One session's history (or all of it, when `session_id` is `None`)
    /// was removed.
    ChatHistoryCleared { session_id: Option<String> },
}
