//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `model`: the persisted `Conversation`
//! - `message`: `MessageRole` and `Message`
//! - `index`: the lightweight `IndexEntry` projection
//! - `repository`: repository trait for conversation persistence
//! - `transcript`: plaintext export rendering

mod index;
mod message;
mod model;
mod repository;
mod transcript;

// Re-export public API
pub use index::IndexEntry;
pub use message::{Message, MessageRole};
pub use model::{Conversation, DEFAULT_TITLE};
pub use repository::ConversationRepository;
pub use transcript::render_transcript;
