//! Conversation DTOs for the legacy layout.
//!
//! Older clients stored conversations with millisecond timestamps, no
//! `createdAt`, no message timestamps, and sometimes without provider or
//! model. These DTOs accept every shape seen in the wild and convert into
//! the domain model with explicit defaults.

use chrono::{DateTime, TimeZone, Utc};
use scribe_core::conversation::{Conversation, DEFAULT_TITLE, Message, MessageRole};
use serde::Deserialize;
use serde_json::Value;

/// Provider assumed for legacy records that do not name one.
pub const LEGACY_DEFAULT_PROVIDER: &str = "mistral";

/// Model assumed for legacy records that do not name one.
pub const LEGACY_DEFAULT_MODEL: &str = "mistral-small-latest";

/// A timestamp as either epoch milliseconds or an RFC 3339 string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyTimestamp {
    Millis(i64),
    FractionalMillis(f64),
    Text(String),
}

impl LegacyTimestamp {
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, String> {
        match self {
            Self::Millis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| format!("timestamp out of range: {ms}")),
            Self::FractionalMillis(ms) => Utc
                .timestamp_millis_opt(ms.trunc() as i64)
                .single()
                .ok_or_else(|| format!("timestamp out of range: {ms}")),
            Self::Text(text) => {
                if let Ok(ms) = text.trim().parse::<i64>() {
                    return Self::Millis(ms).to_datetime();
                }
                DateTime::parse_from_rfc3339(text.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| format!("invalid timestamp '{text}': {e}"))
            }
        }
    }
}

/// Legacy ids were usually strings, occasionally numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyId {
    Text(String),
    Number(serde_json::Number),
}

impl LegacyId {
    pub fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// V1.0.0: one element of the legacy index array.
///
/// Full records carry `messages`; lightweight ones do not.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConversationV1_0_0 {
    pub id: LegacyId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<LegacyTimestamp>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<LegacyTimestamp>,
    #[serde(default)]
    pub messages: Option<Vec<LegacyMessageV1_0_0>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMessageV1_0_0 {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "createdAt", alias = "created_at")]
    pub timestamp: Option<LegacyTimestamp>,
}

/// Result of converting one legacy record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyConversion {
    pub conversation: Conversation,
    /// True if the record carried a message list and therefore needs its
    /// own conversation file.
    pub has_messages: bool,
}

impl LegacyConversationV1_0_0 {
    /// Parses one array element. On failure returns the element's id (if
    /// any could be read) together with the reason.
    pub fn parse(value: &Value) -> Result<Self, (String, String)> {
        serde_json::from_value(value.clone()).map_err(|e| (raw_id(value), e.to_string()))
    }

    /// Converts into the domain model.
    ///
    /// Missing timestamps fall back in order: `updatedAt`, `createdAt`, the
    /// newest message timestamp, then `fallback_time`.
    pub fn into_domain(self, fallback_time: DateTime<Utc>) -> Result<LegacyConversion, String> {
        let id = self.id.into_string();
        if id.is_empty() {
            return Err("empty id".to_string());
        }

        let created_at = self.created_at.as_ref().map(|t| t.to_datetime()).transpose()?;
        let updated_at = self.updated_at.as_ref().map(|t| t.to_datetime()).transpose()?;
        let has_messages = self.messages.is_some();

        let mut raw_messages = Vec::new();
        for message in self.messages.unwrap_or_default() {
            let role: MessageRole = message.role.parse()?;
            let timestamp = message.timestamp.as_ref().map(|t| t.to_datetime()).transpose()?;
            raw_messages.push((role, message.content, timestamp));
        }

        let newest_message = raw_messages.iter().filter_map(|(_, _, ts)| *ts).max();
        let updated_at = updated_at
            .or(created_at)
            .or(newest_message)
            .unwrap_or(fallback_time);
        let created_at = created_at.unwrap_or(updated_at);

        let messages = raw_messages
            .into_iter()
            .map(|(role, content, timestamp)| Message {
                role,
                content,
                timestamp: timestamp.unwrap_or(updated_at),
            })
            .collect();

        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Ok(LegacyConversion {
            conversation: Conversation {
                id,
                title,
                provider: non_empty_or(self.provider, LEGACY_DEFAULT_PROVIDER),
                model: non_empty_or(self.model, LEGACY_DEFAULT_MODEL),
                created_at,
                updated_at,
                messages,
            },
            has_messages,
        })
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn raw_id(value: &Value) -> String {
    match value.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "<missing id>".to_string(),
    }
}

/// Parses a conversation file, accepting the legacy per-file shape too.
pub fn parse_conversation_file(
    text: &str,
    fallback_time: DateTime<Utc>,
) -> Result<Conversation, String> {
    match serde_json::from_str::<Conversation>(text) {
        Ok(conversation) => Ok(conversation),
        Err(strict) => {
            let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
            let legacy = LegacyConversationV1_0_0::parse(&value).map_err(|_| strict.to_string())?;
            legacy.into_domain(fallback_time).map(|c| c.conversation)
        }
    }
}
