//! Decrypted view of a segmented index.
//!
//! An index file holds one or more segments. Opening the file under a
//! passphrase yields the union of every segment that passphrase can read;
//! the rest stay sealed and are written back untouched. Later segments win
//! per id, and a segment's `removed` list hides entries of the segments
//! before it.

use super::StoredPayload;
use crate::crypto::EnvelopeCodec;
use crate::dto::{INDEX_ASSOCIATED_DATA, INDEX_SCHEMA_VERSION, IndexFileV2_0_0, IndexSegmentV2_0_0};
use scribe_core::Passphrase;
use scribe_core::conversation::IndexEntry;
use scribe_core::error::{Result, ScribeError};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct IndexView {
    passphrase: Option<Passphrase>,
    entries: BTreeMap<String, IndexEntry>,
    removed: BTreeSet<String>,
    sealed: Vec<Value>,
}

impl IndexView {
    pub fn empty(passphrase: Option<Passphrase>) -> Self {
        Self {
            passphrase,
            entries: BTreeMap::new(),
            removed: BTreeSet::new(),
            sealed: Vec::new(),
        }
    }

    /// Opens every segment `passphrase` can read.
    ///
    /// Segments that fail to decrypt, need a passphrase, or carry an unknown
    /// envelope version are kept sealed. Only failures unrelated to the
    /// content (key derivation, task errors) are returned.
    pub async fn open(
        file: &IndexFileV2_0_0,
        codec: &EnvelopeCodec,
        passphrase: Option<Passphrase>,
    ) -> Result<Self> {
        let mut view = Self::empty(passphrase);

        for (position, value) in file.segments.iter().enumerate() {
            match view.open_segment(value, codec).await {
                Ok(segment) => view.apply(segment),
                Err(err) if is_content_error(&err) => {
                    tracing::debug!(
                        position,
                        reason = %err,
                        "index segment unreadable, keeping it sealed"
                    );
                    view.sealed.push(value.clone());
                }
                Err(err) => return Err(err),
            }
        }

        Ok(view)
    }

    async fn open_segment(
        &self,
        value: &Value,
        codec: &EnvelopeCodec,
    ) -> Result<IndexSegmentV2_0_0> {
        let text = StoredPayload::from_value(value.clone())?
            .open(
                codec,
                self.passphrase.as_ref(),
                Some(INDEX_ASSOCIATED_DATA.to_vec()),
                "index",
            )
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn apply(&mut self, segment: IndexSegmentV2_0_0) {
        for id in segment.removed {
            self.entries.remove(&id);
            self.removed.insert(id);
        }
        for entry in segment.entries {
            self.removed.remove(&entry.id);
            self.entries.insert(entry.id.clone(), entry);
        }
    }

    /// True if this view was opened with `passphrase`.
    pub fn is_for(&self, passphrase: Option<&Passphrase>) -> bool {
        self.passphrase.as_ref() == passphrase
    }

    pub fn upsert(&mut self, entry: IndexEntry) {
        self.removed.remove(&entry.id);
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Removes `id`. Returns false if nothing changed.
    pub fn remove(&mut self, id: &str) -> bool {
        let had_entry = self.entries.remove(id).is_some();
        if self.sealed.is_empty() {
            had_entry
        } else {
            // The id may still be listed in a sealed segment.
            self.removed.insert(id.to_string()) || had_entry
        }
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sealed_segments(&self) -> usize {
        self.sealed.len()
    }

    /// Entries ordered by `updatedAt`, newest first.
    pub fn entries_newest_first(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    /// Serializes the view: sealed segments first, then one merged segment
    /// encrypted under the view's passphrase (plaintext if none).
    pub async fn to_file(&self, codec: &EnvelopeCodec) -> Result<IndexFileV2_0_0> {
        let removed = if self.sealed.is_empty() {
            Vec::new()
        } else {
            self.removed.iter().cloned().collect()
        };
        let segment = IndexSegmentV2_0_0 {
            entries: self.entries.values().cloned().collect(),
            removed,
        };

        let merged = StoredPayload::seal(
            codec,
            serde_json::to_string(&segment)?,
            self.passphrase.as_ref(),
            Some(INDEX_ASSOCIATED_DATA.to_vec()),
        )
        .await?;

        let mut segments = self.sealed.clone();
        segments.push(merged.to_value()?);

        Ok(IndexFileV2_0_0 {
            schema_version: INDEX_SCHEMA_VERSION.to_string(),
            segments,
        })
    }
}

fn is_content_error(err: &ScribeError) -> bool {
    err.is_unreadable()
        || matches!(
            err,
            ScribeError::UnsupportedVersion { .. } | ScribeError::Serialization { .. }
        )
}
