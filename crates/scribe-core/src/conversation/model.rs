//! Conversation domain model.

use super::index::IndexEntry;
use super::message::{Message, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title given to a conversation before its first user message.
pub const DEFAULT_TITLE: &str = "New chat";

/// Maximum number of characters taken from the first user message when
/// naming an untitled conversation.
const AUTO_TITLE_CHARS: usize = 48;

/// A persisted chat conversation.
///
/// This is the "pure" domain model that business logic operates on,
/// independent of whether it is stored as plaintext or inside an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation identifier; also names its storage file.
    pub id: String,
    /// Human-readable title shown in the conversation list
    pub title: String,
    /// LLM provider the conversation talks to (e.g. "openai", "mistral")
    pub provider: String,
    /// Provider model name
    pub model: String,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every message append.
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation, as produced by a "new chat" action.
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.to_string(),
            provider: provider.into(),
            model: model.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    /// Appends a message and refreshes `updated_at`.
    ///
    /// `updated_at` never moves backwards, even if the message carries an
    /// older timestamp.
    pub fn push_message(&mut self, message: Message) {
        if self.title == DEFAULT_TITLE && message.role == MessageRole::User {
            if let Some(title) = title_from(&message.content) {
                self.title = title;
            }
        }
        let now = Utc::now();
        self.updated_at = self.updated_at.max(message.timestamp).max(now);
        self.messages.push(message);
    }

    /// Lightweight projection stored in the index.
    pub fn index_entry(&self) -> IndexEntry {
        IndexEntry::from(self)
    }

    /// Returns true if no message has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn title_from(content: &str) -> Option<String> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut title: String = line.chars().take(AUTO_TITLE_CHARS).collect();
    if line.chars().count() > AUTO_TITLE_CHARS {
        title.push('…');
    }
    Some(title)
}
