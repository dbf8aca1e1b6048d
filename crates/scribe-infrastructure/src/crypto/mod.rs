//! Passphrase-based envelope encryption.
//!
//! - `kdf`: scrypt key derivation plus salt/nonce generation
//! - `envelope`: AES-256-GCM envelope codec

pub mod envelope;
pub mod kdf;

pub use envelope::{ENVELOPE_VERSION, Envelope, EnvelopeCodec, KdfSpec};
pub use kdf::{KdfParams, derive_key};
