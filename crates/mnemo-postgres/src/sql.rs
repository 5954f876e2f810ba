// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of [`RecordQuery`] filters into parameterized Postgres SQL.
//!
//! The translation is pure so it can be tested without a server. Metadata
//! predicates compare jsonb values, tag filters use jsonb containment (`@>`,
//! backed by the GIN index), and text search goes through `plainto_tsquery`.

use mnemo_core::{Condition, RecordQuery, SortOrder};

/// Columns selected for record hydration, in `row_to_record` order.
pub const RECORD_COLUMNS: &str = "id, content, metadata, timestamp, embedding";

/// An owned bind value for a dynamically built query.
///
/// Collected while rendering predicates, then replayed onto the sqlx query
/// in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlBind {
    Text(String),
    Int(i64),
    Json(serde_json::Value),
}

/// Build a full SELECT statement (WHERE, ORDER BY, LIMIT) against the
/// schema-qualified table.
pub fn build_select(table: &str, query: &RecordQuery) -> (String, Vec<SqlBind>) {
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM {table}");
    let mut binds = Vec::new();

    let predicates: Vec<String> = query
        .conditions
        .iter()
        .map(|condition| condition_to_sql(condition, &mut binds))
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
        binds.push(SqlBind::Int(limit as i64));
        sql.push_str(&format!(" LIMIT ${}", binds.len()));
    }

    (sql, binds)
}

/// Render one condition as a predicate with `$n` placeholders, appending
/// its bound values.
fn condition_to_sql(condition: &Condition, binds: &mut Vec<SqlBind>) -> String {
    match condition {
        Condition::MetadataEquals { key, value } => {
            binds.push(SqlBind::Text(key.clone()));
            let key_param = binds.len();
            binds.push(SqlBind::Json(value.clone()));
            let value_param = binds.len();
            format!("metadata -> ${key_param} = ${value_param}")
        }
        Condition::HasAllTags(tags) => {
            binds.push(SqlBind::Json(serde_json::json!({ "tags": tags })));
            format!("metadata @> ${}", binds.len())
        }
        Condition::TimestampGte(millis) => {
            binds.push(SqlBind::Int(*millis));
            format!("timestamp >= ${}", binds.len())
        }
        Condition::TimestampLte(millis) => {
            binds.push(SqlBind::Int(*millis));
            format!("timestamp <= ${}", binds.len())
        }
        Condition::TextSearch(term) => {
            binds.push(SqlBind::Text(term.clone()));
            format!(
                "to_tsvector('english', content) @@ plainto_tsquery('english', ${})",
                binds.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_selects_everything_newest_first() {
        let (sql, binds) = build_select("mnemo.memories", &RecordQuery::new());
        assert_eq!(
            sql,
            "SELECT id, content, metadata, timestamp, embedding FROM mnemo.memories \
             ORDER BY timestamp DESC"
        );
        assert!(binds.is_empty());
    }

    #[test]
    fn placeholders_are_numbered_in_bind_order() {
        let query = RecordQuery::new()
            .with_source("conversation")
            .since(100)
            .with_limit(5);
        let (sql, binds) = build_select("mnemo.memories", &query);

        assert!(sql.contains("metadata -> $1 = $2"));
        assert!(sql.contains("timestamp >= $3"));
        assert!(sql.ends_with("LIMIT $4"));
        assert_eq!(binds.len(), 4);
        assert_eq!(binds[0], SqlBind::Text("source".to_string()));
        assert_eq!(
            binds[1],
            SqlBind::Json(serde_json::json!("conversation"))
        );
        assert_eq!(binds[2], SqlBind::Int(100));
        assert_eq!(binds[3], SqlBind::Int(5));
    }

    #[test]
    fn tag_filter_uses_jsonb_containment() {
        let query = RecordQuery::new().with_tags(["rust", "tokio"]);
        let (sql, binds) = build_select("mnemo.memories", &query);

        assert!(sql.contains("metadata @> $1"));
        assert_eq!(
            binds[0],
            SqlBind::Json(serde_json::json!({"tags": ["rust", "tokio"]}))
        );
    }

    #[test]
    fn text_search_uses_full_text_query() {
        let query = RecordQuery::new().with_text("brown fox");
        let (sql, binds) = build_select("mnemo.memories", &query);

        assert!(sql.contains("plainto_tsquery('english', $1)"));
        assert_eq!(binds[0], SqlBind::Text("brown fox".to_string()));
    }
}
