// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of [`RecordQuery`] filters into parameterized SQLite SQL.
//!
//! Every condition becomes a bound predicate; no filter value is ever
//! interpolated into the SQL text. Text search uses `LIKE`, which gives
//! ASCII case-insensitive matching.

use mnemo_core::{Collection, Condition, RecordQuery, SortOrder};
use rusqlite::types::Value;

use crate::schema::tag_table;

/// Columns selected for record hydration, in `row_to_record` order.
pub const RECORD_COLUMNS: &str = "id, content, metadata, timestamp, embedding";

/// Build a full SELECT statement (WHERE, ORDER BY, LIMIT) for a query.
///
/// Returns the SQL text and the positional parameters to bind.
pub fn build_select(collection: Collection, query: &RecordQuery) -> (String, Vec<Value>) {
    let table = collection.table_name();
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM {table}");
    let mut params = Vec::new();

    let predicates: Vec<String> = query
        .conditions
        .iter()
        .map(|condition| condition_to_sql(collection, condition, &mut params))
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
        params.push(Value::Integer(limit as i64));
    }

    (sql, params)
}

/// Render one condition as a SQL predicate, appending its bound values.
fn condition_to_sql(
    collection: Collection,
    condition: &Condition,
    params: &mut Vec<Value>,
) -> String {
    match condition {
        Condition::MetadataEquals { key, value } => {
            params.push(Value::Text(format!("$.{key}")));
            params.push(json_to_sql_value(value));
            "json_extract(metadata, ?) = ?".to_string()
        }
        Condition::HasAllTags(tags) => {
            let tag_table = tag_table(collection);
            let placeholders = vec!["?"; tags.len()].join(", ");
            for tag in tags {
                params.push(Value::Text(tag.clone()));
            }
            params.push(Value::Integer(tags.len() as i64));
            format!(
                "id IN (SELECT record_id FROM {tag_table} WHERE tag IN ({placeholders}) \
                 GROUP BY record_id HAVING COUNT(DISTINCT tag) = ?)"
            )
        }
        Condition::TimestampGte(millis) => {
            params.push(Value::Integer(*millis));
            "timestamp >= ?".to_string()
        }
        Condition::TimestampLte(millis) => {
            params.push(Value::Integer(*millis));
            "timestamp <= ?".to_string()
        }
        Condition::TextSearch(term) => {
            params.push(Value::Text(format!("%{}%", escape_like(term))));
            "content LIKE ? ESCAPE '\\'".to_string()
        }
    }
}

/// Map a JSON filter value onto the SQL type `json_extract` yields for it.
///
/// Booleans surface as 0/1 integers; non-scalar values compare via their
/// canonical JSON text.
fn json_to_sql_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Real(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::Null => Value::Null,
        other => Value::Text(other.to_string()),
    }
}

/// Escape LIKE wildcards in a user-supplied search term.
pub fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_selects_everything_newest_first() {
        let (sql, params) = build_select(Collection::Memories, &RecordQuery::new());
        assert_eq!(
            sql,
            "SELECT id, content, metadata, timestamp, embedding FROM memories \
             ORDER BY timestamp DESC"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn source_filter_binds_json_path_and_value() {
        let query = RecordQuery::new().with_source("conversation");
        let (sql, params) = build_select(Collection::Memories, &query);
        assert!(sql.contains("json_extract(metadata, ?) = ?"));
        assert_eq!(params[0], Value::Text("$.source".to_string()));
        assert_eq!(params[1], Value::Text("conversation".to_string()));
    }

    #[test]
    fn tag_filter_requires_every_tag() {
        let query = RecordQuery::new().with_tags(["rust", "tokio"]);
        let (sql, params) = build_select(Collection::Memories, &query);
        assert!(sql.contains("FROM memory_tags"));
        assert!(sql.contains("HAVING COUNT(DISTINCT tag) = ?"));
        assert_eq!(params.len(), 3);
        assert_eq!(params[2], Value::Integer(2));
    }

    #[test]
    fn chat_history_uses_its_own_tag_table() {
        let query = RecordQuery::new().with_tags(["greeting"]);
        let (sql, _) = build_select(Collection::ChatHistory, &query);
        assert!(sql.contains("FROM chat_history_tags"));
    }

    #[test]
    fn time_range_and_limit_combine() {
        let query = RecordQuery::new().since(100).until(200).with_limit(10);
        let (sql, params) = build_select(Collection::Memories, &query);
        assert!(sql.contains("timestamp >= ? AND timestamp <= ?"));
        assert!(sql.ends_with("LIMIT ?"));
        assert_eq!(
            params,
            vec![
                Value::Integer(100),
                Value::Integer(200),
                Value::Integer(10)
            ]
        );
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        let query = RecordQuery::new().with_text("50%");
        let (_, params) = build_select(Collection::Memories, &query);
        assert_eq!(params[0], Value::Text("%50\\%%".to_string()));
    }

    #[test]
    fn oldest_first_flips_the_sort() {
        let query = RecordQuery::new().oldest_first();
        let (sql, _) = build_select(Collection::Memories, &query);
        assert!(sql.ends_with("ORDER BY timestamp ASC"));
    }
}
