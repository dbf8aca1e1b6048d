//! Plaintext or encrypted content as stored on disk.

use crate::crypto::{ENVELOPE_VERSION, Envelope, EnvelopeCodec};
use scribe_core::Passphrase;
use scribe_core::error::{Result, ScribeError};
use serde_json::Value;

/// Content of a stored artifact: either plaintext JSON or an envelope
/// wrapping it.
///
/// The variant is decided once by [`classify`](Self::classify); callers
/// match on it instead of trying to parse content speculatively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredPayload {
    Plain(String),
    Encrypted(Envelope),
}

impl StoredPayload {
    /// Classifies raw file content.
    ///
    /// A JSON object carrying both `kdf` and `ciphertext_and_tag` (or its
    /// short form `ct`) is an envelope; any other content is plaintext.
    pub fn classify(raw: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) if is_envelope_shaped(&value) => Self::envelope_from_value(value),
            _ => Ok(Self::Plain(raw.to_string())),
        }
    }

    /// Classifies an already parsed JSON value (index segments).
    pub fn from_value(value: Value) -> Result<Self> {
        if is_envelope_shaped(&value) {
            Self::envelope_from_value(value)
        } else {
            Ok(Self::Plain(value.to_string()))
        }
    }

    fn envelope_from_value(value: Value) -> Result<Self> {
        let version = value
            .get("version")
            .or_else(|| value.get("v"))
            .and_then(Value::as_u64);
        match serde_json::from_value::<Envelope>(value) {
            Ok(envelope) => Ok(Self::Encrypted(envelope)),
            Err(_) => match version {
                Some(v) if v != u64::from(ENVELOPE_VERSION) => {
                    Err(ScribeError::unsupported_version("envelope", v))
                }
                // A version 1 envelope that does not decode is corrupted.
                _ => Err(ScribeError::Authentication),
            },
        }
    }

    /// Wraps `plaintext` in an envelope when a passphrase is given.
    pub async fn seal(
        codec: &EnvelopeCodec,
        plaintext: String,
        passphrase: Option<&Passphrase>,
        associated_data: Option<Vec<u8>>,
    ) -> Result<Self> {
        match passphrase {
            Some(passphrase) => {
                let envelope = codec
                    .encrypt_async(plaintext.into_bytes(), passphrase.clone(), associated_data)
                    .await?;
                Ok(Self::Encrypted(envelope))
            }
            None => Ok(Self::Plain(plaintext)),
        }
    }

    /// Returns the plaintext, decrypting if needed.
    ///
    /// `context` names the artifact in a `PassphraseRequired` error.
    pub async fn open(
        self,
        codec: &EnvelopeCodec,
        passphrase: Option<&Passphrase>,
        associated_data: Option<Vec<u8>>,
        context: &str,
    ) -> Result<String> {
        match self {
            Self::Plain(text) => Ok(text),
            Self::Encrypted(envelope) => {
                envelope.check_version()?;
                let passphrase =
                    passphrase.ok_or_else(|| ScribeError::passphrase_required(context))?;
                let bytes = codec
                    .decrypt_async(envelope, passphrase.clone(), associated_data)
                    .await?;
                String::from_utf8(bytes).map_err(|_| ScribeError::Authentication)
            }
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }

    /// File content for this payload.
    pub fn to_file_contents(&self) -> Result<String> {
        match self {
            Self::Plain(text) => Ok(text.clone()),
            Self::Encrypted(envelope) => Ok(serde_json::to_string_pretty(envelope)?),
        }
    }

    /// JSON value for embedding in another document.
    pub fn to_value(&self) -> Result<Value> {
        match self {
            Self::Plain(text) => Ok(serde_json::from_str(text)?),
            Self::Encrypted(envelope) => Ok(serde_json::to_value(envelope)?),
        }
    }
}

fn is_envelope_shaped(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        let sealed = obj.contains_key("ciphertext_and_tag") || obj.contains_key("ct");
        obj.contains_key("kdf") && sealed
    })
}
