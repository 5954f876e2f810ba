// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema and index definitions for the Postgres record store.

use mnemo_core::Collection;

/// True if a configured identifier is safe to interpolate into DDL.
///
/// Schema names come from config, not from callers, but they still only
/// ever reach SQL text after passing this check.
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Statements creating the schema itself. Run before any collection DDL.
pub fn schema_ddl(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {schema}")
}

/// Statements creating one collection's table and indices. Idempotent.
///
/// Metadata is JSONB with a GIN index so both scalar predicates and tag
/// containment stay indexed; content carries a full-text GIN index.
pub fn collection_ddl(schema: &str, collection: Collection) -> Vec<String> {
    let table = collection.table_name();
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{table} (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}',
                timestamp BIGINT NOT NULL,
                embedding REAL[]
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_timestamp \
             ON {schema}.{table} (timestamp)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_metadata \
             ON {schema}.{table} USING GIN (metadata)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_content_fts \
             ON {schema}.{table} USING GIN (to_tsvector('english', content))"
        ),
    ]
}
