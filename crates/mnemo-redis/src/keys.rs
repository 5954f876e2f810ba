// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key layout for the Redis record store.
//!
//! Per collection, under the configured prefix:
//! - `<prefix><collection>:<id>`          record JSON
//! - `<prefix><collection>:ids`           SET of all record ids
//! - `<prefix><collection>:timestamps`    ZSET, score = timestamp millis
//! - `<prefix><collection>:source:<v>`    SET of ids with that source
//! - `<prefix><collection>:type:<v>`      SET of ids with that type
//! - `<prefix><collection>:tag:<v>`       SET of ids carrying that tag

use mnemo_core::{Collection, MemoryRecord};

/// Key builder for one collection.
#[derive(Debug, Clone)]
pub struct KeySpace {
    base: String,
}

impl KeySpace {
    pub fn new(prefix: &str, collection: Collection) -> Self {
        Self {
            base: format!("{prefix}{}", collection.table_name()),
        }
    }

    /// Key holding one record's JSON.
    pub fn record(&self, id: &str) -> String {
        format!("{}:{id}", self.base)
    }

    /// SET of every record id in the collection.
    pub fn ids(&self) -> String {
        format!("{}:ids", self.base)
    }

    /// ZSET of ids scored by timestamp.
    pub fn timestamps(&self) -> String {
        format!("{}:timestamps", self.base)
    }

    /// SET of ids with the given metadata source.
    pub fn source(&self, value: &str) -> String {
        format!("{}:source:{value}", self.base)
    }

    /// SET of ids with the given metadata type.
    pub fn kind(&self, value: &str) -> String {
        format!("{}:type:{value}", self.base)
    }

    /// SET of ids carrying the given tag.
    pub fn tag(&self, value: &str) -> String {
        format!("{}:tag:{value}", self.base)
    }
}

/// All secondary index keys a record participates in.
///
/// Used to add memberships on write and to remove stale ones when a
/// record is replaced or deleted.
pub fn index_keys_for(keys: &KeySpace, record: &MemoryRecord) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(source) = &record.metadata.source {
        out.push(keys.source(source));
    }
    if let Some(kind) = &record.metadata.kind {
        out.push(keys.kind(kind));
    }
    for tag in &record.metadata.tags {
        out.push(keys.tag(tag));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::MemoryMetadata;

    #[test]
    fn keys_follow_the_documented_layout() {
        let keys = KeySpace::new("mnemo:", Collection::Memories);
        assert_eq!(keys.record("mem_1"), "mnemo:memories:mem_1");
        assert_eq!(keys.ids(), "mnemo:memories:ids");
        assert_eq!(keys.timestamps(), "mnemo:memories:timestamps");
        assert_eq!(keys.source("conversation"), "mnemo:memories:source:conversation");
        assert_eq!(keys.kind("observation"), "mnemo:memories:type:observation");
        assert_eq!(keys.tag("rust"), "mnemo:memories:tag:rust");

        let chat = KeySpace::new("mnemo:", Collection::ChatHistory);
        assert_eq!(chat.ids(), "mnemo:chat_history:ids");
    }

    #[test]
    fn index_keys_cover_source_type_and_every_tag() {
        let keys = KeySpace::new("mnemo:", Collection::Memories);
        let record = MemoryRecord {
            id: "mem_1".to_string(),
            content: "x".to_string(),
            timestamp: 1,
            metadata: MemoryMetadata {
                source: Some("conversation".to_string()),
                kind: Some("observation".to_string()),
                tags: vec!["a".to_string(), "b".to_string()],
                ..Default::default()
            },
            embedding: None,
        };

        let index = index_keys_for(&keys, &record);
        assert_eq!(
            index,
            vec![
                "mnemo:memories:source:conversation",
                "mnemo:memories:type:observation",
                "mnemo:memories:tag:a",
                "mnemo:memories:tag:b",
            ]
        );
    }
}
