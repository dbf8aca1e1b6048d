//! Lightweight index entries.

use super::model::Conversation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata projection of a [`Conversation`], cheap to list.
///
/// Never the source of truth for message content; the per-conversation
/// file always wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: String,
    pub title: String,
    pub provider: String,
    pub model: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for IndexEntry {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.clone(),
            title: conversation.title.clone(),
            provider: conversation.provider.clone(),
            model: conversation.model.clone(),
            updated_at: conversation.updated_at,
        }
    }
}
