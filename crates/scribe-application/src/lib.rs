//! Application layer for Scribe.
//!
//! Chat use-cases built on top of a [`ConversationRepository`]: starting a
//! chat, appending messages, round-trips through an inference backend, and
//! exporting transcripts.
//!
//! [`ConversationRepository`]: scribe_core::conversation::ConversationRepository

pub mod chat_service;
pub mod export;
pub mod inference;

pub use chat_service::ChatService;
pub use export::{ExportSink, FileExportSink};
pub use inference::InferenceBackend;
