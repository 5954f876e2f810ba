// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table and index definitions for the SQLite record store.

use mnemo_core::Collection;

/// The tag side table paired with a collection.
///
/// Tags live both inside the metadata JSON (authoritative copy) and in a
/// relational side table so that tag filters stay indexed.
pub fn tag_table(collection: Collection) -> &'static str {
    match collection {
        Collection::Memories => "memory_tags",
        Collection::ChatHistory => "chat_history_tags",
    }
}

/// DDL batch for one collection. Idempotent, safe to run on every startup.
pub fn collection_ddl(collection: Collection) -> String {
    let table = collection.table_name();
    let tags = tag_table(collection);
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{{}}',
            timestamp INTEGER NOT NULL,
            embedding BLOB
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table}(timestamp);
        CREATE TABLE IF NOT EXISTS {tags} (
            record_id TEXT NOT NULL REFERENCES {table}(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            PRIMARY KEY (record_id, tag)
        );
        CREATE INDEX IF NOT EXISTS idx_{tags}_tag ON {tags}(tag);"
    )
}

/// Connection-level PRAGMAs. WAL for concurrent readers, foreign keys so
/// tag rows follow their record on delete.
pub const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_collection_gets_its_own_tag_table() {
        assert_eq!(tag_table(Collection::Memories), "memory_tags");
        assert_eq!(tag_table(Collection::ChatHistory), "chat_history_tags");
    }

    #[test]
    fn ddl_names_the_collection_tables() {
        let ddl = collection_ddl(Collection::Memories);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS memories"));
        assert!(ddl.contains("idx_memories_timestamp"));
        assert!(ddl.contains("memory_tags"));

        let ddl = collection_ddl(Collection::ChatHistory);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS chat_history"));
        assert!(ddl.contains("chat_history_tags"));
    }
}
