//! Passphrase session.
//!
//! Holds at most one passphrase for the lifetime of the process. The session
//! is an explicit object: it is created by the application, shared as an
//! `Arc<PassphraseSession>`, and handed to the store when the store is built.
//! Unlocking sets the passphrase, locking clears it.
//!
//! Store operations call [`PassphraseSession::snapshot`] exactly once when
//! they start and work on that value until they finish, so a concurrent
//! `clear()` never affects an operation already in flight.

use std::fmt;
use std::sync::{Arc, RwLock};
use zeroize::Zeroizing;

/// A passphrase value.
///
/// Cloning is cheap (reference counted). The underlying buffer is wiped
/// when the last clone is dropped. `Debug` output is redacted.
#[derive(Clone)]
pub struct Passphrase(Arc<Zeroizing<String>>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::new(Zeroizing::new(value.into())))
    }

    /// Raw bytes fed to the key derivation function.
    pub fn expose_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for Passphrase {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.as_str() == other.0.as_str()
    }
}

impl Eq for Passphrase {}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

impl From<&str> for Passphrase {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Passphrase {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Process-lifetime holder of the current passphrase.
#[derive(Default)]
pub struct PassphraseSession {
    current: RwLock<Option<Passphrase>>,
}

impl PassphraseSession {
    /// Creates a locked session (no passphrase).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session that is already unlocked with `passphrase`.
    pub fn unlocked(passphrase: impl Into<Passphrase>) -> Self {
        Self {
            current: RwLock::new(Some(passphrase.into())),
        }
    }

    /// Replaces the current passphrase.
    pub fn set(&self, passphrase: impl Into<Passphrase>) {
        let passphrase = passphrase.into();
        *self.write_guard() = Some(passphrase);
        tracing::debug!("passphrase session unlocked");
    }

    /// Removes the current passphrase. Nothing is persisted, so nothing
    /// needs to be erased from disk.
    pub fn clear(&self) {
        let previous = self.write_guard().take();
        drop(previous);
        tracing::debug!("passphrase session locked");
    }

    pub fn is_set(&self) -> bool {
        self.read_guard().is_some()
    }

    /// Captures the passphrase for the duration of one operation.
    pub fn snapshot(&self) -> Option<Passphrase> {
        self.read_guard().clone()
    }

    /// Alias of [`set`](Self::set) for unlock actions.
    pub fn unlock(&self, passphrase: impl Into<Passphrase>) {
        self.set(passphrase);
    }

    /// Alias of [`clear`](Self::clear) for lock actions.
    pub fn lock(&self) {
        self.clear();
    }

    // A panic while holding the lock cannot leave a partially written
    // `Option<Passphrase>`, so recovering from poisoning is sound.
    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, Option<Passphrase>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Option<Passphrase>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for PassphraseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassphraseSession")
            .field("is_set", &self.is_set())
            .finish()
    }
}
