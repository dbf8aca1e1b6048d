//! Transcript export destinations.

use async_trait::async_trait;
use scribe_core::conversation::Conversation;
use scribe_core::error::Result;
use std::path::{Path, PathBuf};

const MAX_SLUG_CHARS: usize = 40;

/// Receives a plaintext transcript leaving the store.
///
/// Whatever reaches a sink is no longer protected by the store's
/// encryption.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn deliver(&self, suggested_name: &str, text: &str) -> Result<()>;
}

/// Writes transcripts as `<dir>/<suggested_name>`.
#[derive(Debug, Clone)]
pub struct FileExportSink {
    dir: PathBuf,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ExportSink for FileExportSink {
    async fn deliver(&self, suggested_name: &str, text: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(suggested_name);
        tokio::fs::write(&path, text).await?;
        tracing::info!(path = %path.display(), "transcript exported");
        Ok(())
    }
}

/// File name offered to a sink: a slug of the title plus the last update
/// date, e.g. `trip-planning-2024-01-01.txt`.
pub fn suggested_file_name(conversation: &Conversation) -> String {
    let mut slug = String::new();
    for c in conversation.title.chars() {
        if slug.chars().count() >= MAX_SLUG_CHARS {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let stem = if slug.is_empty() { conversation.id.as_str() } else { slug };

    format!("{}-{}.txt", stem, conversation.updated_at.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_suggested_name_from_title() {
        let mut conversation = Conversation::new("abc", "mistral", "mistral-small-latest");
        conversation.title = "Trip planning: Lyon!".to_string();
        conversation.updated_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(suggested_file_name(&conversation), "trip-planning-lyon-2024-01-01.txt");
    }

    #[test]
    fn test_suggested_name_falls_back_to_id() {
        let mut conversation = Conversation::new("abc", "mistral", "mistral-small-latest");
        conversation.title = "¿¿??".to_string();
        conversation.updated_at = Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap();

        assert_eq!(suggested_file_name(&conversation), "abc-2024-02-03.txt");
    }

    #[tokio::test]
    async fn test_file_sink_writes_plaintext() {
        let temp_dir = TempDir::new().unwrap();
        let sink = FileExportSink::new(temp_dir.path().join("exports"));

        sink.deliver("chat.txt", "User:\nhello").await.unwrap();

        let written = std::fs::read_to_string(temp_dir.path().join("exports/chat.txt")).unwrap();
        assert_eq!(written, "User:\nhello");
    }
}
