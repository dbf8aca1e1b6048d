//! Index migration 1.0.0 → 2.0.0.
//!
//! Turns the records of a legacy index array into domain conversations.
//! Every record is converted on its own: a record that fails is reported
//! and skipped without affecting any other record.

use super::traits::{Migration, TypedMigration};
use crate::dto::{LegacyConversationV1_0_0, LegacyConversion};
use anyhow::Result;
use chrono::{DateTime, Utc};
use scribe_core::error::ScribeError;
use semver::Version;
use serde_json::Value;
use std::collections::HashMap;

/// Index content flowing through the migration chain.
#[derive(Debug, Clone)]
pub enum IndexDocument {
    /// 1.0.0: raw elements of the legacy array.
    Legacy {
        records: Vec<Value>,
        /// Used when a record carries no timestamp at all.
        fallback_time: DateTime<Utc>,
    },
    /// 2.0.0: converted records, ready to be written out.
    Migrated(MigratedIndex),
}

#[derive(Debug, Clone, Default)]
pub struct MigratedIndex {
    /// One conversion per distinct id, in first-seen order.
    pub conversions: Vec<LegacyConversion>,
    /// Records that could not be converted.
    pub failures: Vec<ScribeError>,
}

#[derive(Debug)]
pub struct LegacyIndexMigration;

impl Migration for LegacyIndexMigration {
    fn from_version(&self) -> Version {
        Version::new(1, 0, 0)
    }

    fn to_version(&self) -> Version {
        Version::new(2, 0, 0)
    }

    fn description(&self) -> &str {
        "Split legacy conversation array into index entries and per-conversation files"
    }
}

impl TypedMigration<IndexDocument, IndexDocument> for LegacyIndexMigration {
    fn migrate(&self, from: IndexDocument) -> Result<IndexDocument> {
        let (records, fallback_time) = match from {
            IndexDocument::Legacy {
                records,
                fallback_time,
            } => (records, fallback_time),
            migrated @ IndexDocument::Migrated(_) => return Ok(migrated),
        };

        let mut migrated = MigratedIndex::default();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (position, record) in records.iter().enumerate() {
            let conversion = LegacyConversationV1_0_0::parse(record)
                .and_then(|legacy| {
                    let id = legacy.id.clone().into_string();
                    legacy.into_domain(fallback_time).map_err(|reason| (id, reason))
                });

            match conversion {
                Ok(conversion) => {
                    let id = conversion.conversation.id.clone();
                    // Duplicate ids: the later record wins.
                    match positions.get(&id) {
                        Some(&slot) => migrated.conversions[slot] = conversion,
                        None => {
                            positions.insert(id, migrated.conversions.len());
                            migrated.conversions.push(conversion);
                        }
                    }
                }
                Err((id, reason)) => {
                    tracing::warn!(id = %id, position, "Skipping legacy conversation: {}", reason);
                    migrated.failures.push(ScribeError::migration(id, reason));
                }
            }
        }

        Ok(IndexDocument::Migrated(migrated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(records: Vec<Value>) -> MigratedIndex {
        let doc = IndexDocument::Legacy {
            records,
            fallback_time: Utc::now(),
        };
        match LegacyIndexMigration.migrate(doc).unwrap() {
            IndexDocument::Migrated(m) => m,
            other => panic!("not migrated: {other:?}"),
        }
    }

    #[test]
    fn test_each_record_migrates_independently() {
        let migrated = run(vec![
            json!({"id": "a", "messages": [{"role": "user", "content": "hi"}]}),
            json!({"id": "b", "messages": [{"role": "alien", "content": "?"}]}),
            json!({"title": "no id"}),
            json!({"id": "c", "messages": []}),
        ]);

        let ids: Vec<_> = migrated
            .conversions
            .iter()
            .map(|c| c.conversation.id.as_str())
            .collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(migrated.failures.len(), 2);
        assert!(matches!(&migrated.failures[0], ScribeError::Migration { id, .. } if id == "b"));
    }

    #[test]
    fn test_duplicate_ids_last_wins() {
        let migrated = run(vec![
            json!({"id": "a", "title": "first", "messages": []}),
            json!({"id": "b", "messages": []}),
            json!({"id": "a", "title": "second", "messages": []}),
        ]);

        assert_eq!(migrated.conversions.len(), 2);
        assert_eq!(migrated.conversions[0].conversation.title, "second");
    }

    #[test]
    fn test_migrated_document_passes_through() {
        let doc = IndexDocument::Migrated(MigratedIndex::default());
        assert!(matches!(
            LegacyIndexMigration.migrate(doc).unwrap(),
            IndexDocument::Migrated(_)
        ));
    }
}
