//! Detects the on-disk index version and upgrades legacy layouts.
//!
//! The index version is read from the `schema_version` tag. Files without a
//! tag predate it and are treated as schema 1.0.0: a JSON array, possibly
//! wrapped as a whole in one envelope. Migration writes one file per
//! conversation that carried messages, keeps the legacy bytes in
//! `index.v1.bak`, and replaces the index with a 2.0.0 document. Running it
//! against its own output is a no-op because that output is tagged 2.0.0.

use super::legacy_index::{IndexDocument, LegacyIndexMigration};
use super::registry::MigrationRegistry;
use super::traits::MigrationChain;
use crate::conversation_file::{modified_time, read_conversation, write_conversation};
use crate::crypto::EnvelopeCodec;
use crate::dto::{
    INDEX_SCHEMA_VERSION, IndexFileV2_0_0, IndexHeader, LEGACY_INDEX_SCHEMA_VERSION,
};
use crate::paths::{StoreLayout, validate_id};
use crate::storage::{IndexView, StoredPayload, atomic_file};
use scribe_core::Passphrase;
use scribe_core::conversation::Conversation;
use scribe_core::error::{Result, ScribeError};
use semver::Version;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of loading the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Schema version found on disk, `None` if there was no index.
    pub from_version: Option<Version>,
    /// Conversations carried over from a legacy index.
    pub migrated: usize,
    /// Ids of legacy records that could not be migrated.
    pub failed: Vec<String>,
    /// Where the replaced index was kept.
    pub backup: Option<PathBuf>,
}

impl MigrationReport {
    /// True if this load rewrote the index.
    pub fn performed(&self) -> bool {
        self.backup.is_some()
    }
}

/// Builds the index migration chain.
pub fn create_index_registry() -> MigrationRegistry<IndexDocument> {
    let mut registry = MigrationRegistry::new(Version::new(2, 0, 0));
    registry.register(Arc::new(LegacyIndexMigration));
    registry
}

enum Detected {
    Missing,
    Current(IndexFileV2_0_0),
    Legacy(StoredPayload),
    Corrupt(String),
}

/// State of the per-id file a legacy record maps to.
enum ExistingFile {
    Absent,
    Older,
    Newer(Conversation),
    Unreadable(ScribeError),
}

pub struct IndexMigrator<'a> {
    layout: &'a StoreLayout,
    codec: &'a EnvelopeCodec,
    registry: MigrationRegistry<IndexDocument>,
}

impl<'a> IndexMigrator<'a> {
    pub fn new(layout: &'a StoreLayout, codec: &'a EnvelopeCodec) -> Self {
        Self {
            layout,
            codec,
            registry: create_index_registry(),
        }
    }

    /// Loads the index, migrating it first if it is a legacy layout.
    ///
    /// Legacy conversations are written under `passphrase` (plaintext if
    /// none). An encrypted legacy blob that `passphrase` cannot open fails
    /// with `PassphraseRequired` or `Authentication` and is left untouched.
    pub async fn load_or_migrate(
        &self,
        passphrase: Option<&Passphrase>,
    ) -> Result<(IndexFileV2_0_0, MigrationReport)> {
        let index_path = self.layout.index_file();
        let Some(raw) = atomic_file::read_optional(&index_path).await? else {
            return Ok((IndexFileV2_0_0::empty(), MigrationReport::default()));
        };

        match self.detect(&raw)? {
            Detected::Missing => Ok((IndexFileV2_0_0::empty(), MigrationReport::default())),
            Detected::Current(file) => {
                let report = MigrationReport {
                    from_version: Some(Version::new(2, 0, 0)),
                    ..MigrationReport::default()
                };
                Ok((file, report))
            }
            Detected::Legacy(payload) => self.migrate_legacy(&raw, payload, passphrase).await,
            Detected::Corrupt(reason) => self.set_aside_corrupt(&raw, &reason).await,
        }
    }

    fn detect(&self, raw: &[u8]) -> Result<Detected> {
        let Ok(text) = std::str::from_utf8(raw) else {
            return Ok(Detected::Corrupt("index is not UTF-8".to_string()));
        };
        if text.trim().is_empty() {
            return Ok(Detected::Missing);
        }

        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return Ok(Detected::Corrupt(e.to_string())),
        };

        if value.get("schema_version").is_some() {
            let header: IndexHeader = match serde_json::from_value(value.clone()) {
                Ok(header) => header,
                Err(e) => return Ok(Detected::Corrupt(e.to_string())),
            };
            let version = Version::parse(&header.schema_version)
                .map_err(|_| ScribeError::unsupported_version("index", &header.schema_version))?;
            if version.to_string() != INDEX_SCHEMA_VERSION {
                return Err(ScribeError::unsupported_version("index", version));
            }
            return match serde_json::from_value::<IndexFileV2_0_0>(value) {
                Ok(file) => Ok(Detected::Current(file)),
                Err(e) => Ok(Detected::Corrupt(e.to_string())),
            };
        }

        match value {
            Value::Array(_) => Ok(Detected::Legacy(StoredPayload::Plain(text.to_string()))),
            other => match StoredPayload::from_value(other)? {
                payload @ StoredPayload::Encrypted(_) => Ok(Detected::Legacy(payload)),
                StoredPayload::Plain(_) => Ok(Detected::Corrupt(
                    "index is neither a tagged document nor a legacy array".to_string(),
                )),
            },
        }
    }

    async fn migrate_legacy(
        &self,
        raw: &[u8],
        payload: StoredPayload,
        passphrase: Option<&Passphrase>,
    ) -> Result<(IndexFileV2_0_0, MigrationReport)> {
        let legacy_version = Version::parse(LEGACY_INDEX_SCHEMA_VERSION)
            .map_err(|e| ScribeError::internal(e.to_string()))?;

        let text = payload
            .open(self.codec, passphrase, None, "legacy index")
            .await?;
        let records = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(records)) => records,
            Ok(_) => return self.set_aside_corrupt(raw, "legacy index is not an array").await,
            Err(e) => return self.set_aside_corrupt(raw, &e.to_string()).await,
        };

        let index_path = self.layout.index_file();
        let document = IndexDocument::Legacy {
            records,
            fallback_time: modified_time(&index_path).await,
        };
        let migrated = match self.registry.migrate_to_latest(document, &legacy_version)? {
            IndexDocument::Migrated(migrated) => migrated,
            IndexDocument::Legacy { .. } => {
                return Err(ScribeError::internal("legacy index migration did not run"));
            }
        };

        let mut report = MigrationReport {
            from_version: Some(legacy_version),
            ..MigrationReport::default()
        };
        for failure in &migrated.failures {
            if let ScribeError::Migration { id, .. } = failure {
                report.failed.push(id.clone());
            }
        }

        let mut view = IndexView::empty(passphrase.cloned());
        for conversion in migrated.conversions {
            let conversation = conversion.conversation;
            if let Err(err) = validate_id(&conversation.id) {
                tracing::warn!(error = %err, "Skipping legacy conversation");
                report.failed.push(conversation.id.clone());
                continue;
            }
            let entry = match self.existing_file(&conversation, passphrase).await {
                ExistingFile::Newer(current) => {
                    tracing::info!(
                        id = %conversation.id,
                        "Keeping conversation file newer than legacy record"
                    );
                    current.index_entry()
                }
                ExistingFile::Unreadable(err) => {
                    tracing::warn!(
                        id = %conversation.id,
                        error = %err,
                        "Keeping existing conversation file"
                    );
                    conversation.index_entry()
                }
                ExistingFile::Absent | ExistingFile::Older => {
                    if conversion.has_messages {
                        let written =
                            write_conversation(self.layout, self.codec, &conversation, passphrase)
                                .await;
                        if let Err(err) = written {
                            tracing::warn!(
                                id = %conversation.id,
                                error = %err,
                                "Failed to write migrated conversation"
                            );
                            report.failed.push(conversation.id.clone());
                            continue;
                        }
                    }
                    conversation.index_entry()
                }
            };
            view.upsert(entry);
            report.migrated += 1;
        }

        let file = view.to_file(self.codec).await?;
        let backup = self.layout.legacy_backup_file();
        atomic_file::write_atomic(&backup, raw).await?;
        atomic_file::write_atomic(&index_path, &serde_json::to_vec_pretty(&file)?).await?;

        tracing::info!(
            migrated = report.migrated,
            failed = report.failed.len(),
            backup = %backup.display(),
            "Legacy index migrated to schema {}",
            INDEX_SCHEMA_VERSION
        );
        report.backup = Some(backup);
        Ok((file, report))
    }

    /// Looks at the file a legacy record would be written to. A file that
    /// is already there is never replaced by an older copy.
    async fn existing_file(
        &self,
        legacy: &Conversation,
        passphrase: Option<&Passphrase>,
    ) -> ExistingFile {
        match read_conversation(self.layout, self.codec, &legacy.id, passphrase).await {
            Ok(None) => ExistingFile::Absent,
            Ok(Some(current)) if current.updated_at >= legacy.updated_at => {
                ExistingFile::Newer(current)
            }
            Ok(Some(_)) => ExistingFile::Older,
            Err(err) => ExistingFile::Unreadable(err),
        }
    }

    async fn set_aside_corrupt(
        &self,
        raw: &[u8],
        reason: &str,
    ) -> Result<(IndexFileV2_0_0, MigrationReport)> {
        let backup = self.layout.corrupt_index_file();
        tracing::warn!(
            backup = %backup.display(),
            "Index unreadable, starting a new one: {}",
            reason
        );

        let file = IndexFileV2_0_0::empty();
        atomic_file::write_atomic(&backup, raw).await?;
        atomic_file::write_atomic(&self.layout.index_file(), &serde_json::to_vec_pretty(&file)?)
            .await?;

        let report = MigrationReport {
            backup: Some(backup),
            ..MigrationReport::default()
        };
        Ok((file, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfParams;
    use chrono::{TimeZone, Utc};
    use scribe_core::conversation::{Message, MessageRole};
    use serde_json::json;
    use tempfile::TempDir;

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::with_params(KdfParams::testing())
    }

    async fn write_index(layout: &StoreLayout, value: &Value) {
        atomic_file::write_atomic(&layout.index_file(), value.to_string().as_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_index_is_empty() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();

        let (file, report) = IndexMigrator::new(&layout, &codec)
            .load_or_migrate(None)
            .await
            .unwrap();

        assert!(file.segments.is_empty());
        assert_eq!(report, MigrationReport::default());
    }

    #[tokio::test]
    async fn test_legacy_array_is_split() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        write_index(
            &layout,
            &json!([{"id": "a", "title": "T", "messages": [{"role": "user", "content": "hi"}]}]),
        )
        .await;

        let (file, report) = IndexMigrator::new(&layout, &codec)
            .load_or_migrate(None)
            .await
            .unwrap();

        assert_eq!(report.migrated, 1);
        assert!(report.performed());
        assert!(layout.legacy_backup_file().exists());

        let view = IndexView::open(&file, &codec, None).await.unwrap();
        assert_eq!(view.get("a").unwrap().title, "T");

        let conv = read_conversation(&layout, &codec, "a", None).await.unwrap().unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].content, "hi");
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        write_index(&layout, &json!([{"id": "a", "messages": []}])).await;

        let migrator = IndexMigrator::new(&layout, &codec);
        migrator.load_or_migrate(None).await.unwrap();
        let on_disk = std::fs::read(layout.index_file()).unwrap();

        let (_, report) = migrator.load_or_migrate(None).await.unwrap();
        assert!(!report.performed());
        assert_eq!(std::fs::read(layout.index_file()).unwrap(), on_disk);
    }

    #[tokio::test]
    async fn test_encrypted_legacy_blob_needs_passphrase() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        let pass = Passphrase::new("old");
        let envelope = codec
            .encrypt(br#"[{"id":"a","messages":[]}]"#, &pass, None)
            .unwrap();
        write_index(&layout, &serde_json::to_value(&envelope).unwrap()).await;

        let migrator = IndexMigrator::new(&layout, &codec);
        let err = migrator.load_or_migrate(None).await.unwrap_err();
        assert!(err.is_passphrase_required());
        assert!(!layout.legacy_backup_file().exists());

        let (file, report) = migrator.load_or_migrate(Some(&pass)).await.unwrap();
        assert_eq!(report.migrated, 1);
        let view = IndexView::open(&file, &codec, Some(pass)).await.unwrap();
        assert!(view.get("a").is_some());
    }

    #[tokio::test]
    async fn test_short_field_legacy_blob_is_migrated() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        let pass = Passphrase::new("old");
        let envelope = codec
            .encrypt(&legacy_record("a", "hi").to_string().into_bytes(), &pass, None)
            .unwrap();
        let mut blob = serde_json::to_value(&envelope).unwrap();
        let fields = blob.as_object_mut().unwrap();
        let version = fields.remove("version").unwrap();
        let sealed = fields.remove("ciphertext_and_tag").unwrap();
        fields.insert("v".to_string(), version);
        fields.insert("ct".to_string(), sealed);
        write_index(&layout, &blob).await;

        let (_, report) = IndexMigrator::new(&layout, &codec)
            .load_or_migrate(Some(&pass))
            .await
            .unwrap();

        assert_eq!(report.migrated, 1);
        let conv = read_conversation(&layout, &codec, "a", Some(&pass)).await.unwrap().unwrap();
        assert_eq!(conv.messages[0].content, "hi");
    }

    fn legacy_record(id: &str, content: &str) -> Value {
        json!([{
            "id": id,
            "title": "Legacy",
            "updatedAt": 1704067500000i64,
            "messages": [{"role": "user", "content": content}]
        }])
    }

    #[tokio::test]
    async fn test_newer_conversation_file_survives_migration() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        let mut current = Conversation::new("a", "openai", "gpt-4o-mini");
        current.push_message(Message::new(MessageRole::User, "NEW CONTENT"));
        write_conversation(&layout, &codec, &current, None).await.unwrap();
        write_index(&layout, &legacy_record("a", "OLD CONTENT")).await;

        let (file, report) = IndexMigrator::new(&layout, &codec)
            .load_or_migrate(None)
            .await
            .unwrap();

        assert_eq!(report.migrated, 1);
        let kept = read_conversation(&layout, &codec, "a", None).await.unwrap().unwrap();
        assert_eq!(kept.messages[0].content, "NEW CONTENT");
        let view = IndexView::open(&file, &codec, None).await.unwrap();
        assert_eq!(view.get("a").unwrap().updated_at, current.updated_at);
    }

    #[tokio::test]
    async fn test_older_conversation_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        let mut stale = Conversation::new("a", "openai", "gpt-4o-mini");
        stale.push_message(Message::new(MessageRole::User, "STALE"));
        stale.updated_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        write_conversation(&layout, &codec, &stale, None).await.unwrap();
        write_index(&layout, &legacy_record("a", "LEGACY")).await;

        IndexMigrator::new(&layout, &codec)
            .load_or_migrate(None)
            .await
            .unwrap();

        let conv = read_conversation(&layout, &codec, "a", None).await.unwrap().unwrap();
        assert_eq!(conv.messages[0].content, "LEGACY");
    }

    #[tokio::test]
    async fn test_unreadable_conversation_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        let mut other = Conversation::new("a", "openai", "gpt-4o-mini");
        other.push_message(Message::new(MessageRole::User, "sealed elsewhere"));
        let other_pass = Passphrase::new("other");
        write_conversation(&layout, &codec, &other, Some(&other_pass)).await.unwrap();
        let before = std::fs::read(layout.conversation_file("a").unwrap()).unwrap();
        write_index(&layout, &legacy_record("a", "LEGACY")).await;

        let (_, report) = IndexMigrator::new(&layout, &codec)
            .load_or_migrate(None)
            .await
            .unwrap();

        assert_eq!(report.migrated, 1);
        assert_eq!(std::fs::read(layout.conversation_file("a").unwrap()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        write_index(&layout, &json!({"schema_version": "3.0.0", "segments": []})).await;

        let err = IndexMigrator::new(&layout, &codec)
            .load_or_migrate(None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::UnsupportedVersion { kind: "index", .. }));
    }

    #[tokio::test]
    async fn test_garbage_index_is_set_aside() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let codec = codec();
        atomic_file::write_atomic(&layout.index_file(), b"{not json").await.unwrap();

        let (file, report) = IndexMigrator::new(&layout, &codec)
            .load_or_migrate(None)
            .await
            .unwrap();

        assert!(file.segments.is_empty());
        assert_eq!(report.backup, Some(layout.corrupt_index_file()));
        assert_eq!(std::fs::read(layout.corrupt_index_file()).unwrap(), b"{not json");
    }
}
