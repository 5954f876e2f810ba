// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table definitions for the MySQL record store.
//!
//! MySQL has no `CREATE INDEX IF NOT EXISTS`, so indices are declared
//! inline with the tables.

use mnemo_core::Collection;

/// The tag side table paired with a collection.
pub fn tag_table(collection: Collection) -> &'static str {
    match collection {
        Collection::Memories => "memories_tags",
        Collection::ChatHistory => "chat_history_tags",
    }
}

/// Statements creating one collection's tables. Idempotent.
///
/// Ids are VARCHAR(64) (generated ids are well under that) and tags
/// VARCHAR(191) so the composite primary key fits utf8mb4 index limits.
pub fn collection_ddl(collection: Collection) -> Vec<String> {
    let table = collection.table_name();
    let tags = tag_table(collection);
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id VARCHAR(64) PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSON NOT NULL,
                timestamp BIGINT NOT NULL,
                embedding LONGBLOB,
                INDEX idx_{table}_timestamp (timestamp)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {tags} (
                record_id VARCHAR(64) NOT NULL,
                tag VARCHAR(191) NOT NULL,
                PRIMARY KEY (record_id, tag),
                INDEX idx_{tags}_tag (tag),
                CONSTRAINT fk_{tags}_record FOREIGN KEY (record_id) \
                    REFERENCES {table}(id) ON DELETE CASCADE
            )"
        ),
    ]
}
