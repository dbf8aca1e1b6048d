//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs describe what is on disk. They are private to the
//! infrastructure layer and absorb the evolution of the storage format.
//!
//! ## Index Version History
//! - **1.0.0**: Untagged legacy layout. A bare JSON array of conversations
//!   (with full message bodies) or of lightweight entries, either plaintext
//!   or wrapped as a whole in one envelope.
//! - **2.0.0**: `{"schema_version": "2.0.0", "segments": [...]}`, one file
//!   per conversation next to it.
//!
//! The config file is versioned through version-migrate; see [`config`].

pub mod config;
mod conversation;
mod index;

pub use config::{CONFIG_ENTITY, ConfigV1_0_0, create_config_migrator};

pub use conversation::{
    LEGACY_DEFAULT_MODEL, LEGACY_DEFAULT_PROVIDER, LegacyConversationV1_0_0, LegacyConversion,
    LegacyMessageV1_0_0, LegacyTimestamp, parse_conversation_file,
};
pub use index::{
    INDEX_ASSOCIATED_DATA, INDEX_SCHEMA_VERSION, IndexFileV2_0_0, IndexHeader,
    IndexSegmentV2_0_0, LEGACY_INDEX_SCHEMA_VERSION,
};
