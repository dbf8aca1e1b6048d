//! Index file DTOs.

use scribe_core::conversation::IndexEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current index schema version.
pub const INDEX_SCHEMA_VERSION: &str = "2.0.0";

/// Version assigned to the untagged legacy layout (a bare JSON array).
pub const LEGACY_INDEX_SCHEMA_VERSION: &str = "1.0.0";

/// Associated data bound into every encrypted index segment.
pub const INDEX_ASSOCIATED_DATA: &[u8] = b"scribe:index:v2";

/// V2.0.0: versioned, segmented index.
///
/// Each segment is a [`StoredPayload`](crate::storage::StoredPayload) whose
/// plaintext is an [`IndexSegmentV2_0_0`]. Segments are kept as raw JSON so
/// that segments the current passphrase cannot open are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFileV2_0_0 {
    pub schema_version: String,
    #[serde(default)]
    pub segments: Vec<Value>,
}

impl IndexFileV2_0_0 {
    pub fn empty() -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION.to_string(),
            segments: Vec::new(),
        }
    }
}

/// Plaintext of one index segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSegmentV2_0_0 {
    #[serde(default)]
    pub entries: Vec<IndexEntry>,
    /// Ids deleted while older segments were unreadable. Hides their
    /// entries in segments that precede this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

/// Only the version tag, read before committing to a full parse.
#[derive(Debug, Deserialize)]
pub struct IndexHeader {
    pub schema_version: String,
}
