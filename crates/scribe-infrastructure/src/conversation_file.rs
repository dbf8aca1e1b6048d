//! Reading and writing one conversation file.

use crate::crypto::EnvelopeCodec;
use crate::dto::parse_conversation_file;
use crate::paths::StoreLayout;
use crate::storage::{StoredPayload, atomic_file};
use chrono::{DateTime, Utc};
use scribe_core::Passphrase;
use scribe_core::conversation::Conversation;
use scribe_core::error::{Result, ScribeError};
use std::path::Path;

/// Writes `conversation` to its file, encrypted with the conversation id as
/// associated data when a passphrase is given.
pub async fn write_conversation(
    layout: &StoreLayout,
    codec: &EnvelopeCodec,
    conversation: &Conversation,
    passphrase: Option<&Passphrase>,
) -> Result<()> {
    let path = layout.conversation_file(&conversation.id)?;
    let json = serde_json::to_string_pretty(conversation)?;
    let payload = StoredPayload::seal(
        codec,
        json,
        passphrase,
        Some(conversation.id.as_bytes().to_vec()),
    )
    .await?;

    atomic_file::write_atomic(&path, payload.to_file_contents()?.as_bytes()).await
}

/// Reads conversation `id`. Returns `None` if it has no file.
pub async fn read_conversation(
    layout: &StoreLayout,
    codec: &EnvelopeCodec,
    id: &str,
    passphrase: Option<&Passphrase>,
) -> Result<Option<Conversation>> {
    let path = layout.conversation_file(id)?;
    let Some(raw) = atomic_file::read_optional(&path).await? else {
        return Ok(None);
    };
    let raw = String::from_utf8(raw)
        .map_err(|e| ScribeError::serialization("UTF-8", e.to_string()))?;

    let text = StoredPayload::classify(&raw)?
        .open(
            codec,
            passphrase,
            Some(id.as_bytes().to_vec()),
            &format!("conversation '{id}'"),
        )
        .await?;

    let fallback_time = modified_time(&path).await;
    parse_conversation_file(&text, fallback_time)
        .map(Some)
        .map_err(|message| ScribeError::serialization("JSON", message))
}

/// Modification time of `path`, or now if unavailable.
pub async fn modified_time(path: &Path) -> DateTime<Utc> {
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(time) => DateTime::<Utc>::from(time),
        Err(_) => Utc::now(),
    }
}
