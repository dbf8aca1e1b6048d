//! Passphrase stretching with scrypt.
//!
//! Production envelopes always use [`KdfParams::default`] (N=2¹⁵, r=8, p=1,
//! 32-byte key). Parameters read back from an envelope are validated before
//! any work is done so that a crafted envelope cannot request an unbounded
//! amount of memory.

use rand::RngCore;
use rand::rngs::OsRng;
use scribe_core::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Size of the derived AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Size of the per-envelope salt in bytes.
pub const SALT_LEN: usize = 16;

/// Size of the AES-GCM nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Name written into `kdf.method`.
pub const KDF_METHOD: &str = "scrypt";

const MAX_LOG_N: u32 = 20;
const MAX_R: u32 = 32;
const MAX_P: u32 = 16;

/// scrypt cost parameters as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    #[serde(rename = "N")]
    pub n: u64,
    pub r: u32,
    pub p: u32,
    #[serde(rename = "keyLength")]
    pub key_length: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            n: 1 << 15,
            r: 8,
            p: 1,
            key_length: KEY_LEN,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never used by production code paths.
    pub fn testing() -> Self {
        Self {
            n: 1 << 10,
            ..Self::default()
        }
    }

    /// Rejects parameters this build refuses to run.
    pub fn validate(&self) -> Result<()> {
        let supported = self.n >= 2
            && self.n.is_power_of_two()
            && self.n.trailing_zeros() <= MAX_LOG_N
            && (1..=MAX_R).contains(&self.r)
            && (1..=MAX_P).contains(&self.p)
            && self.key_length == KEY_LEN;

        if supported {
            Ok(())
        } else {
            Err(ScribeError::unsupported_version(
                "kdf parameters",
                format!(
                    "N={} r={} p={} keyLength={}",
                    self.n, self.r, self.p, self.key_length
                ),
            ))
        }
    }

    fn log_n(&self) -> u8 {
        self.n.trailing_zeros() as u8
    }
}

/// Derives a 32-byte key from `passphrase` and `salt`.
///
/// Deterministic for a given (passphrase, salt, params). This is CPU and
/// memory bound; async callers should run it on a blocking thread.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    params.validate()?;

    let scrypt_params = scrypt::Params::new(params.log_n(), params.r, params.p, KEY_LEN)
        .map_err(|e| ScribeError::KeyDerivation(e.to_string()))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(passphrase, salt, &scrypt_params, &mut key[..])
        .map_err(|e| ScribeError::KeyDerivation(e.to_string()))?;

    Ok(key)
}

/// Fresh random salt from the OS RNG.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Fresh random AES-GCM nonce from the OS RNG.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_match_fixed_profile() {
        let params = KdfParams::default();
        assert_eq!(params.n, 32768);
        assert_eq!(params.r, 8);
        assert_eq!(params.p, 1);
        assert_eq!(params.key_length, 32);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_wire_names() {
        let json = serde_json::to_value(KdfParams::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"N": 32768, "r": 8, "p": 1, "keyLength": 32})
        );
    }

    #[test]
    fn test_derive_is_deterministic() {
        let params = KdfParams::testing();
        let salt = [7u8; SALT_LEN];
        let a = derive_key(b"correct horse", &salt, &params).unwrap();
        let b = derive_key(b"correct horse", &salt, &params).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_derive_depends_on_salt_and_passphrase() {
        let params = KdfParams::testing();
        let base = derive_key(b"p1", &[1u8; SALT_LEN], &params).unwrap();
        let other_salt = derive_key(b"p1", &[2u8; SALT_LEN], &params).unwrap();
        let other_pass = derive_key(b"p2", &[1u8; SALT_LEN], &params).unwrap();
        assert_ne!(*base, *other_salt);
        assert_ne!(*base, *other_pass);
    }

    #[test]
    fn test_hostile_params_are_rejected() {
        let cases = [
            KdfParams {
                n: 1000,
                ..KdfParams::default()
            },
            KdfParams {
                n: 1 << 30,
                ..KdfParams::default()
            },
            KdfParams {
                r: 0,
                ..KdfParams::default()
            },
            KdfParams {
                p: 1024,
                ..KdfParams::default()
            },
            KdfParams {
                key_length: 16,
                ..KdfParams::default()
            },
        ];
        for params in cases {
            let err = derive_key(b"p", &[0u8; SALT_LEN], &params).unwrap_err();
            assert!(
                matches!(err, ScribeError::UnsupportedVersion { .. }),
                "{params:?} -> {err:?}"
            );
        }
    }

    #[test]
    fn test_random_material_differs() {
        assert_ne!(generate_salt(), generate_salt());
        assert_ne!(generate_nonce(), generate_nonce());
    }
}
