// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of [`RecordQuery`] filters into MongoDB filter documents.
//!
//! Pure document building, testable without a server. Tag filters use
//! `$all`, both timestamp bounds merge into a single range document, and
//! text search rides the collection's text index via `$text`.

use mongodb::bson::{doc, Bson, Document};

use mnemo_core::{Condition, RecordQuery, SortOrder};

/// Build the `find` filter document for a query.
pub fn filter_document(query: &RecordQuery) -> Document {
    let mut filter = Document::new();
    let mut timestamp = Document::new();

    for condition in &query.conditions {
        match condition {
            Condition::MetadataEquals { key, value } => {
                filter.insert(format!("metadata.{key}"), json_to_bson(value));
            }
            Condition::HasAllTags(tags) => {
                filter.insert("metadata.tags", doc! { "$all": tags.clone() });
            }
            Condition::TimestampGte(millis) => {
                timestamp.insert("$gte", *millis);
            }
            Condition::TimestampLte(millis) => {
                timestamp.insert("$lte", *millis);
            }
            Condition::TextSearch(term) => {
                filter.insert("$text", doc! { "$search": term.clone() });
            }
        }
    }

    if !timestamp.is_empty() {
        filter.insert("timestamp", timestamp);
    }
    filter
}

/// The sort document matching the query's order.
pub fn sort_document(query: &RecordQuery) -> Document {
    match query.sort {
        SortOrder::NewestFirst => doc! { "timestamp": -1 },
        SortOrder::OldestFirst => doc! { "timestamp": 1 },
    }
}

/// Convert a JSON filter value to its BSON equivalent.
fn json_to_bson(value: &serde_json::Value) -> Bson {
    match value {
        serde_json::Value::Null => Bson::Null,
        serde_json::Value::Bool(b) => Bson::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else {
                Bson::Double(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Bson::String(s.clone()),
        serde_json::Value::Array(items) => {
            Bson::Array(items.iter().map(json_to_bson).collect())
        }
        serde_json::Value::Object(map) => {
            let mut document = Document::new();
            for (key, item) in map {
                document.insert(key.clone(), json_to_bson(item));
            }
            Bson::Document(document)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_builds_empty_filter() {
        assert_eq!(filter_document(&RecordQuery::new()), Document::new());
    }

    #[test]
    fn metadata_filters_target_dotted_paths() {
        let query = RecordQuery::new()
            .with_source("conversation")
            .with_kind("observation");
        let filter = filter_document(&query);

        assert_eq!(
            filter,
            doc! {
                "metadata.source": "conversation",
                "metadata.type": "observation",
            }
        );
    }

    #[test]
    fn tags_use_all_operator() {
        let query = RecordQuery::new().with_tags(["rust", "tokio"]);
        let filter = filter_document(&query);
        assert_eq!(
            filter,
            doc! { "metadata.tags": { "$all": ["rust", "tokio"] } }
        );
    }

    #[test]
    fn both_timestamp_bounds_merge_into_one_range() {
        let query = RecordQuery::new().since(100).until(200);
        let filter = filter_document(&query);
        assert_eq!(
            filter,
            doc! { "timestamp": { "$gte": 100_i64, "$lte": 200_i64 } }
        );
    }

    #[test]
    fn text_search_uses_text_operator() {
        let query = RecordQuery::new().with_text("brown fox");
        let filter = filter_document(&query);
        assert_eq!(filter, doc! { "$text": { "$search": "brown fox" } });
    }

    #[test]
    fn sort_follows_query_order() {
        assert_eq!(
            sort_document(&RecordQuery::new()),
            doc! { "timestamp": -1 }
        );
        assert_eq!(
            sort_document(&RecordQuery::new().oldest_first()),
            doc! { "timestamp": 1 }
        );
    }
}
