pub mod config;
pub mod conversation;
pub mod error;
pub mod passphrase;

// Re-export common types
pub use error::{Result, ScribeError};
pub use passphrase::{Passphrase, PassphraseSession};
