//! Conversation repository trait.
//!
//! Defines the interface for conversation persistence operations.

use super::index::IndexEntry;
use super::model::Conversation;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for managing conversation persistence.
///
/// This trait decouples chat use-cases from the storage mechanism. The
/// file-backed implementation decides per call whether to encrypt, based on
/// the passphrase session it was constructed with.
///
/// # Implementation Notes
///
/// Implementations must:
/// - keep exactly one stored record per conversation id
/// - answer `list()` from the index alone, never from message bodies
/// - omit entries that cannot be decrypted from `list()` instead of failing
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Saves a conversation, replacing any previous version with the same id,
    /// and upserts its index entry.
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    /// Loads a conversation by id.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(conversation))`: found and readable
    /// - `Ok(None)`: nothing stored under this id
    /// - `Err(PassphraseRequired)`: stored encrypted, no passphrase set
    /// - `Err(Authentication)`: wrong passphrase or corrupted data
    async fn load(&self, id: &str) -> Result<Option<Conversation>>;

    /// Lists index entries readable with the current passphrase state,
    /// most recently updated first.
    async fn list(&self) -> Result<Vec<IndexEntry>>;

    /// Deletes a conversation and its index entry. Deleting an absent id is
    /// not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Renders a conversation as a plaintext transcript.
    ///
    /// Returns `Ok(None)` if nothing is stored under this id.
    async fn export_as_text(&self, id: &str) -> Result<Option<String>>;

    /// Persists any buffered index update.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Final flush before the process exits. The repository must not be
    /// used afterwards.
    async fn shutdown(&self) -> Result<()> {
        self.flush().await
    }
}
