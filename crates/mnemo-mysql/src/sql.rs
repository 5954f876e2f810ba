// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of [`RecordQuery`] filters into parameterized MySQL SQL.
//!
//! Metadata predicates use `JSON_CONTAINS` with a bound path, tag filters
//! go through the side table, and text search uses `LIKE` (case-insensitive
//! under the default utf8mb4 collations).

use mnemo_core::{Collection, Condition, RecordQuery, SortOrder};

use crate::schema::tag_table;

/// Columns selected for record hydration, in `row_to_record` order.
pub const RECORD_COLUMNS: &str = "id, content, metadata, timestamp, embedding";

/// An owned bind value for a dynamically built query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlBind {
    Text(String),
    Int(i64),
}

/// Build a full SELECT statement (WHERE, ORDER BY, LIMIT) for a query.
pub fn build_select(collection: Collection, query: &RecordQuery) -> (String, Vec<SqlBind>) {
    let table = collection.table_name();
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM {table}");
    let mut binds = Vec::new();

    let predicates: Vec<String> = query
        .conditions
        .iter()
        .map(|condition| condition_to_sql(collection, condition, &mut binds))
        .collect();

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    match query.sort {
        SortOrder::NewestFirst => sql.push_str(" ORDER BY timestamp DESC"),
        SortOrder::OldestFirst => sql.push_str(" ORDER BY timestamp ASC"),
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        binds.push(SqlBind::Int(limit as i64));
    }

    (sql, binds)
}

/// Render one condition as a `?`-placeholder predicate, appending its
/// bound values.
fn condition_to_sql(
    collection: Collection,
    condition: &Condition,
    binds: &mut Vec<SqlBind>,
) -> String {
    match condition {
        Condition::MetadataEquals { key, value } => {
            binds.push(SqlBind::Text(value.to_string()));
            binds.push(SqlBind::Text(format!("$.{key}")));
            "JSON_CONTAINS(metadata, ?, ?)".to_string()
        }
        Condition::HasAllTags(tags) => {
            let tag_table = tag_table(collection);
            let placeholders = vec!["?"; tags.len()].join(", ");
            for tag in tags {
                binds.push(SqlBind::Text(tag.clone()));
            }
            binds.push(SqlBind::Int(tags.len() as i64));
            format!(
                "id IN (SELECT record_id FROM {tag_table} WHERE tag IN ({placeholders}) \
                 GROUP BY record_id HAVING COUNT(DISTINCT tag) = ?)"
            )
        }
        Condition::TimestampGte(millis) => {
            binds.push(SqlBind::Int(*millis));
            "timestamp >= ?".to_string()
        }
        Condition::TimestampLte(millis) => {
            binds.push(SqlBind::Int(*millis));
            "timestamp <= ?".to_string()
        }
        Condition::TextSearch(term) => {
            binds.push(SqlBind::Text(format!("%{}%", escape_like(term))));
            "content LIKE ? ESCAPE '\\\\'".to_string()
        }
    }
}

/// Escape LIKE wildcards in a user-supplied search term.
pub fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
