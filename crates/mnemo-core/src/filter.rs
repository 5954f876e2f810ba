// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generic filter model every database backend compiles to its native
//! query dialect.
//!
//! A [`RecordQuery`] is a conjunction of [`Condition`]s plus an optional
//! limit and a sort order. Backends without native support for a condition
//! (Redis residual filtering, tests) fall back to the in-process matcher.

use serde_json::Value;

use crate::types::MemoryRecord;

/// One predicate in a query. All conditions on a query must hold (AND).
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact match on a metadata key: the recognized fields (`source`,
    /// `type`) or any free-form key, addressed as `metadata.<key>`.
    /// Tag filtering uses [`Condition::HasAllTags`], not this.
    MetadataEquals { key: String, value: Value },
    /// The record must carry every listed tag (ALL semantics).
    HasAllTags(Vec<String>),
    /// Inclusive lower bound on the timestamp, in milliseconds.
    TimestampGte(i64),
    /// Inclusive upper bound on the timestamp, in milliseconds.
    TimestampLte(i64),
    /// Free-text match against the record content.
    TextSearch(String),
}

/// Result ordering for a query. Timestamps are the only sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Descending timestamp; the engine-wide default.
    #[default]
    NewestFirst,
    /// Ascending timestamp; used when replaying chat history.
    OldestFirst,
}

/// A filtered, bounded, ordered query over one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub conditions: Vec<Condition>,
    pub limit: Option<usize>,
    pub sort: SortOrder,
}

impl RecordQuery {
    pub fn new() -> Self {
        RecordQuery::default()
    }

    /// Requires `metadata.source` to equal `value`.
    pub fn with_source(mut self, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::MetadataEquals {
            key: "source".into(),
            value: Value::String(value.into()),
        });
        self
    }

    /// Requires `metadata.type` to equal `value`.
    pub fn with_kind(mut self, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::MetadataEquals {
            key: "type".into(),
            value: Value::String(value.into()),
        });
        self
    }

    /// Requires the free-form metadata key to equal `value`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.conditions.push(Condition::MetadataEquals {
            key: key.into(),
            value,
        });
        self
    }

    /// Requires every listed tag to be present on the record.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        if !tags.is_empty() {
            self.conditions.push(Condition::HasAllTags(tags));
        }
        self
    }

    /// Requires `timestamp >= millis`.
    pub fn since(mut self, millis: i64) -> Self {
        self.conditions.push(Condition::TimestampGte(millis));
        self
    }

    /// Requires `timestamp <= millis`.
    pub fn until(mut self, millis: i64) -> Self {
        self.conditions.push(Condition::TimestampLte(millis));
        self
    }

    /// Adds a free-text condition against the record content.
    pub fn with_text(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        if !term.is_empty() {
            self.conditions.push(Condition::TextSearch(term));
        }
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.sort = SortOrder::OldestFirst;
        self
    }

    /// Evaluates the full conjunction against a record in process.
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition_matches(condition, record))
    }
}

/// Evaluates a single condition against a record.
///
/// Free-text matching here is case-insensitive substring containment; SQL
/// and Mongo backends inherit their engine's native text semantics instead.
pub fn condition_matches(condition: &Condition, record: &MemoryRecord) -> bool {
    match condition {
        Condition::MetadataEquals { key, value } => {
            record.metadata.value(key).as_ref() == Some(value)
        }
        Condition::HasAllTags(tags) => tags
            .iter()
            .all(|tag| record.metadata.tags.iter().any(|t| t == tag)),
        Condition::TimestampGte(millis) => record.timestamp >= *millis,
        Condition::TimestampLte(millis) => record.timestamp <= *millis,
        Condition::TextSearch(term) => record
            .content
            .to_lowercase()
            .contains(&term.to_lowercase()),
    }
}

/// Sorts records by timestamp according to `sort` and truncates to `limit`.
/// Used by backends that fetch candidates before ordering (Redis, in-memory).
pub fn sort_and_truncate(mut records: Vec<MemoryRecord>, query: &RecordQuery) -> Vec<MemoryRecord> {
    match query.sort {
        SortOrder::NewestFirst => records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortOrder::OldestFirst => records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
    }
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryMetadata;

    fn record(content: &str, tags: &[&str], timestamp: i64) -> MemoryRecord {
        MemoryRecord {
            id: crate::types::new_memory_id(),
            content: content.into(),
            timestamp,
            metadata: MemoryMetadata {
                source: Some("chat".into()),
                kind: Some("conversation".into()),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
            embedding: None,
        }
    }

    #[test]
    fn tag_filter_requires_every_tag() {
        let both = record("x", &["a", "b"], 1);
        let only_a = record("x", &["a"], 2);
        let query = RecordQuery::new().with_tags(["a", "b"]);

        assert!(query.matches(&both));
        assert!(!query.matches(&only_a));
    }

    #[test]
    fn empty_tag_list_is_not_a_condition() {
        let query = RecordQuery::new().with_tags(Vec::<String>::new());
        assert!(query.conditions.is_empty());
    }

    #[test]
    fn metadata_equals_covers_source_type_and_custom_keys() {
        let mut rec = record("x", &[], 1);
        rec.metadata
            .extra
            .insert("project".into(), serde_json::json!("mnemo"));

        assert!(RecordQuery::new().with_source("chat").matches(&rec));
        assert!(!RecordQuery::new().with_source("file").matches(&rec));
        assert!(RecordQuery::new().with_kind("conversation").matches(&rec));
        assert!(
            RecordQuery::new()
                .with_metadata("project", serde_json::json!("mnemo"))
                .matches(&rec)
        );
        assert!(
            !RecordQuery::new()
                .with_metadata("project", serde_json::json!("other"))
                .matches(&rec)
        );
    }

    #[test]
    fn timestamp_bounds_are_inclusive() {
        let rec = record("x", &[], 100);
        assert!(RecordQuery::new().since(100).matches(&rec));
        assert!(RecordQuery::new().until(100).matches(&rec));
        assert!(!RecordQuery::new().since(101).matches(&rec));
        assert!(!RecordQuery::new().until(99).matches(&rec));
    }

    #[test]
    fn text_search_is_case_insensitive_substring() {
        let rec = record("The Quick Brown Fox", &[], 1);
        assert!(RecordQuery::new().with_text("quick brown").matches(&rec));
        assert!(!RecordQuery::new().with_text("lazy dog").matches(&rec));
    }

    #[test]
    fn sort_and_truncate_honors_order_and_limit() {
        let records = vec![
            record("a", &[], 10),
            record("b", &[], 30),
            record("c", &[], 20),
        ];

        let newest = sort_and_truncate(records.clone(), &RecordQuery::new().with_limit(2));
        assert_eq!(
            newest.iter().map(|r| r.timestamp).collect::<Vec<_>>(),
            vec![30, 20]
        );

        let oldest = sort_and_truncate(records, &RecordQuery::new().oldest_first());
        assert_eq!(
            oldest.iter().map(|r| r.timestamp).collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            // The tag filter is exactly subset containment.
            #[test]
            fn tag_filter_matches_iff_filter_is_a_subset(
                record_tags in proptest::collection::hash_set("[a-e]", 0..5),
                filter_tags in proptest::collection::vec("[a-e]", 1..5),
            ) {
                let rec = {
                    let mut rec = record("x", &[], 1);
                    rec.metadata.tags = record_tags.iter().cloned().collect();
                    rec
                };
                let expected = filter_tags.iter().all(|t| record_tags.contains(t));
                let query = RecordQuery::new().with_tags(filter_tags);
                prop_assert_eq!(query.matches(&rec), expected);
            }

            #[test]
            fn timestamp_window_matches_iff_within_bounds(
                timestamp in 0i64..1_000,
                lo in 0i64..1_000,
                hi in 0i64..1_000,
            ) {
                let rec = record("x", &[], timestamp);
                let query = RecordQuery::new().since(lo).until(hi);
                prop_assert_eq!(query.matches(&rec), lo <= timestamp && timestamp <= hi);
            }

            #[test]
            fn sort_and_truncate_is_ordered_and_bounded(
                timestamps in proptest::collection::vec(0i64..1_000, 0..20),
                limit in 0usize..10,
            ) {
                let records: Vec<MemoryRecord> = timestamps
                    .iter()
                    .map(|ts| record("x", &[], *ts))
                    .collect();
                let query = RecordQuery::new().with_limit(limit);
                let sorted = sort_and_truncate(records, &query);

                prop_assert!(sorted.len() <= limit);
                prop_assert!(sorted.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
            }
        }
    }
}
