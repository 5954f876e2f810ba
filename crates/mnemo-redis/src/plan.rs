// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query planning for the Redis record store.
//!
//! Redis has no query language, so a [`RecordQuery`] is mapped onto the
//! cheapest candidate fetch available: SINTER over secondary index sets
//! when an indexed condition exists, a ZSET score range when only time
//! bounds are given, the full id ZSET otherwise. Every condition is then
//! re-checked in process against the hydrated records, so the fetch only
//! has to be a superset of the result.

use mnemo_core::{Condition, RecordQuery};

use crate::keys::KeySpace;

/// How to gather candidate ids for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPlan {
    /// Intersect these index set keys.
    Intersect(Vec<String>),
    /// Walk the timestamp ZSET within the bounds (millis, inclusive).
    ScoreRange { min: Option<i64>, max: Option<i64> },
    /// Walk the whole timestamp ZSET.
    All,
}

/// Choose the fetch plan for a query.
pub fn plan_query(keys: &KeySpace, query: &RecordQuery) -> FetchPlan {
    let mut index_keys = Vec::new();
    let mut min = None;
    let mut max = None;

    for condition in &query.conditions {
        match condition {
            Condition::MetadataEquals { key, value } => {
                if let Some(value) = value.as_str() {
                    match key.as_str() {
                        "source" => index_keys.push(keys.source(value)),
                        "type" => index_keys.push(keys.kind(value)),
                        _ => {}
                    }
                }
            }
            Condition::HasAllTags(tags) => {
                for tag in tags {
                    index_keys.push(keys.tag(tag));
                }
            }
            Condition::TimestampGte(millis) => min = Some(*millis),
            Condition::TimestampLte(millis) => max = Some(*millis),
            Condition::TextSearch(_) => {}
        }
    }

    if !index_keys.is_empty() {
        FetchPlan::Intersect(index_keys)
    } else if min.is_some() || max.is_some() {
        FetchPlan::ScoreRange { min, max }
    } else {
        FetchPlan::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::Collection;

    fn keys() -> KeySpace {
        KeySpace::new("mnemo:", Collection::Memories)
    }

    #[test]
    fn indexed_conditions_win_over_time_bounds() {
        let query = RecordQuery::new()
            .with_source("conversation")
            .with_tags(["rust"])
            .since(100);
        let plan = plan_query(&keys(), &query);

        assert_eq!(
            plan,
            FetchPlan::Intersect(vec![
                "mnemo:memories:source:conversation".to_string(),
                "mnemo:memories:tag:rust".to_string(),
            ])
        );
    }

    #[test]
    fn time_bounds_use_the_score_range() {
        let plan = plan_query(&keys(), &RecordQuery::new().since(100).until(200));
        assert_eq!(
            plan,
            FetchPlan::ScoreRange {
                min: Some(100),
                max: Some(200)
            }
        );
    }

    #[test]
    fn unindexed_conditions_fall_back_to_full_scan() {
        let plan = plan_query(&keys(), &RecordQuery::new().with_text("fox"));
        assert_eq!(plan, FetchPlan::All);

        let plan = plan_query(
            &keys(),
            &RecordQuery::new().with_metadata("sessionId", serde_json::json!("s1")),
        );
        assert_eq!(plan, FetchPlan::All);
    }
}
