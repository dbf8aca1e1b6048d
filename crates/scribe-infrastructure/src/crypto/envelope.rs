//! # Envelope Codec
//!
//! Authenticated encryption of arbitrary bytes under a passphrase, producing
//! a self-describing JSON envelope:
//!
//! ```text
//! {
//!   "version": 1,
//!   "kdf": { "method": "scrypt",
//!            "params": { "N": 32768, "r": 8, "p": 1, "keyLength": 32 },
//!            "salt": "<base64, 16 bytes>" },
//!   "nonce": "<base64, 12 bytes>",
//!   "ciphertext_and_tag": "<base64, ciphertext || 16-byte tag>"
//! }
//! ```
//!
//! ## Flow
//!
//! 1. Fresh salt and nonce from the OS RNG (never reused).
//! 2. Key = scrypt(passphrase, salt, params).
//! 3. AES-256-GCM over the plaintext with the caller's associated data
//!    (e.g. the conversation id) bound into the tag but not stored.
//!
//! Decrypting needs only the envelope and the passphrase. Any mismatch
//! (wrong passphrase, a flipped bit anywhere, different associated data)
//! fails with [`ScribeError::Authentication`] and releases no plaintext.

use super::kdf::{self, KDF_METHOD, KdfParams, NONCE_LEN, SALT_LEN};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use scribe_core::Passphrase;
use scribe_core::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};

/// The only envelope version this build reads or writes.
pub const ENVELOPE_VERSION: u32 = 1;

/// Size of the AES-GCM authentication tag in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Serialized encryption envelope.
///
/// Envelopes written by earlier clients name the version `v` and the
/// sealed bytes `ct`; both spellings are read, the long ones are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(alias = "v")]
    pub version: u32,
    pub kdf: KdfSpec,
    pub nonce: String,
    #[serde(alias = "ct")]
    pub ciphertext_and_tag: String,
}

/// Key derivation section of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfSpec {
    pub method: String,
    pub params: KdfParams,
    pub salt: String,
}

impl Envelope {
    /// Checks the version tags. Runs before any key derivation.
    pub fn check_version(&self) -> Result<()> {
        if self.version != ENVELOPE_VERSION {
            return Err(ScribeError::unsupported_version("envelope", self.version));
        }
        if self.kdf.method != KDF_METHOD {
            return Err(ScribeError::unsupported_version(
                "kdf method",
                &self.kdf.method,
            ));
        }
        self.kdf.params.validate()
    }

    fn decode_parts(&self) -> Result<([u8; SALT_LEN], [u8; NONCE_LEN], Vec<u8>)> {
        let salt = decode_fixed::<SALT_LEN>(&self.kdf.salt)?;
        let nonce = decode_fixed::<NONCE_LEN>(&self.nonce)?;
        let sealed = BASE64
            .decode(&self.ciphertext_and_tag)
            .map_err(|_| ScribeError::Authentication)?;
        if sealed.len() < TAG_LEN {
            return Err(ScribeError::Authentication);
        }
        Ok((salt, nonce, sealed))
    }
}

fn decode_fixed<const N: usize>(encoded: &str) -> Result<[u8; N]> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| ScribeError::Authentication)?;
    bytes.try_into().map_err(|_| ScribeError::Authentication)
}

/// Encrypts and decrypts [`Envelope`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec {
    params: KdfParams,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec writing envelopes with custom KDF parameters (tests use
    /// [`KdfParams::testing`]).
    pub fn with_params(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    pub fn encrypt(
        &self,
        plaintext: &[u8],
        passphrase: &Passphrase,
        associated_data: Option<&[u8]>,
    ) -> Result<Envelope> {
        let salt = kdf::generate_salt();
        let nonce = kdf::generate_nonce();
        let key = kdf::derive_key(passphrase.expose_bytes(), &salt, &self.params)?;

        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| ScribeError::internal(format!("invalid AES key: {e}")))?;
        let payload = Payload {
            msg: plaintext,
            aad: associated_data.unwrap_or_default(),
        };
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|e| ScribeError::internal(format!("AES-GCM encryption failed: {e}")))?;

        Ok(Envelope {
            version: ENVELOPE_VERSION,
            kdf: KdfSpec {
                method: KDF_METHOD.to_string(),
                params: self.params,
                salt: BASE64.encode(salt),
            },
            nonce: BASE64.encode(nonce),
            ciphertext_and_tag: BASE64.encode(sealed),
        })
    }

    /// Verifies and decrypts. Decryption always uses the parameters
    /// recorded in the envelope, not the codec's own.
    pub fn decrypt(
        &self,
        envelope: &Envelope,
        passphrase: &Passphrase,
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        envelope.check_version()?;
        let (salt, nonce, sealed) = envelope.decode_parts()?;
        let key = kdf::derive_key(passphrase.expose_bytes(), &salt, &envelope.kdf.params)?;

        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| ScribeError::internal(format!("invalid AES key: {e}")))?;
        let payload = Payload {
            msg: &sealed,
            aad: associated_data.unwrap_or_default(),
        };
        cipher
            .decrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| ScribeError::Authentication)
    }

    /// [`encrypt`](Self::encrypt) on a blocking thread.
    pub async fn encrypt_async(
        &self,
        plaintext: Vec<u8>,
        passphrase: Passphrase,
        associated_data: Option<Vec<u8>>,
    ) -> Result<Envelope> {
        let codec = *self;
        tokio::task::spawn_blocking(move || {
            codec.encrypt(&plaintext, &passphrase, associated_data.as_deref())
        })
        .await
        .map_err(|e| ScribeError::internal(format!("encryption task failed: {e}")))?
    }

    /// [`decrypt`](Self::decrypt) on a blocking thread.
    pub async fn decrypt_async(
        &self,
        envelope: Envelope,
        passphrase: Passphrase,
        associated_data: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let codec = *self;
        tokio::task::spawn_blocking(move || {
            codec.decrypt(&envelope, &passphrase, associated_data.as_deref())
        })
        .await
        .map_err(|e| ScribeError::internal(format!("decryption task failed: {e}")))?
    }
}
