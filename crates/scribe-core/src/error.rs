//! Error types for the Scribe conversation store.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the entire Scribe workspace.
///
/// The variants mirror the failure taxonomy of the encrypted store:
/// key derivation, authentication, missing passphrase, unknown format
/// versions and per-entry migration failures are all distinct so that
/// callers can react to each one (prompt for a passphrase, show a
/// "cannot decrypt" notice, skip an entry) without string matching.
#[derive(Error, Debug, Clone, Serialize)]
pub enum ScribeError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Conversation id that cannot be mapped to a storage path
    #[error("Invalid conversation id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", "base64"
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The memory-hard KDF primitive failed (resource exhaustion).
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD verification failed: wrong passphrase, tampering, or the
    /// envelope was bound to different associated data.
    #[error("Authentication failed: wrong passphrase or corrupted data")]
    Authentication,

    /// Content is encrypted but no passphrase is currently set.
    #[error("Passphrase required to read {context}")]
    PassphraseRequired { context: String },

    /// An envelope or index carries a version this build does not understand.
    #[error("Unsupported {kind} version: {version}")]
    UnsupportedVersion { kind: &'static str, version: String },

    /// A single legacy entry failed to migrate.
    #[error("Migration error for '{id}': {message}")]
    Migration { id: String, message: String },

    /// The inference backend failed (network, auth, rate limit).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScribeError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an InvalidId error
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Serialization error
    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a PassphraseRequired error
    pub fn passphrase_required(context: impl Into<String>) -> Self {
        Self::PassphraseRequired {
            context: context.into(),
        }
    }

    /// Creates an UnsupportedVersion error
    pub fn unsupported_version(kind: &'static str, version: impl ToString) -> Self {
        Self::UnsupportedVersion {
            kind,
            version: version.to_string(),
        }
    }

    /// Creates a Migration error for one legacy entry
    pub fn migration(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Migration {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is an authentication (decrypt) failure
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication)
    }

    /// Check if the caller should prompt for a passphrase
    pub fn is_passphrase_required(&self) -> bool {
        matches!(self, Self::PassphraseRequired { .. })
    }

    /// Check if this error means the stored bytes cannot be read with the
    /// current passphrase state (wrong key, tampering, or no key at all).
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Authentication | Self::PassphraseRequired { .. })
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication => {
                "cannot decrypt — wrong passphrase or corrupted data".to_string()
            }
            Self::PassphraseRequired { .. } => {
                "this conversation is encrypted — enter your passphrase to open it".to_string()
            }
            Self::UnsupportedVersion { kind, version } => {
                format!("{kind} version {version} was written by a newer version of the app")
            }
            other => other.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ScribeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ScribeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ScribeError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (used by the migration registry)
impl From<anyhow::Error> for ScribeError {
    fn from(err: anyhow::Error) -> Self {
        // Preserve typed errors that travelled through an anyhow chain.
        match err.downcast::<ScribeError>() {
            Ok(typed) => typed,
            Err(err) => Self::Internal(format!("{err:#}")),
        }
    }
}

/// A type alias for `Result<T, ScribeError>`.
pub type Result<T> = std::result::Result<T, ScribeError>;
