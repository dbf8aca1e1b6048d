use super::model::Conversation;
use chrono::SecondsFormat;

/// Renders a human-readable plaintext transcript of a conversation.
///
/// ```text
/// # Trip planning
/// Provider: mistral · Model: mistral-small-latest
/// Created: 2024-01-01T00:00:00Z · Updated: 2024-01-01T00:05:00Z
///
/// [2024-01-01T00:00:00Z] User:
/// Plan a trip to Lyon
/// ```
pub fn render_transcript(conversation: &Conversation) -> String {
    let mut lines = Vec::with_capacity(conversation.messages.len() * 3 + 4);
    lines.push(format!("# {}", conversation.title));
    lines.push(format!(
        "Provider: {} · Model: {}",
        conversation.provider, conversation.model
    ));
    lines.push(format!(
        "Created: {} · Updated: {}",
        conversation
            .created_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        conversation
            .updated_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    for message in &conversation.messages {
        lines.push(String::new());
        lines.push(format!(
            "[{}] {}:",
            message.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            message.role.label()
        ));
        lines.push(message.content.clone());
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Message, MessageRole};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_transcript_lists_every_message_in_order() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut conv = Conversation::new("c1", "mistral", "mistral-small-latest");
        conv.title = "Trip".to_string();
        conv.created_at = ts;
        conv.updated_at = ts;
        conv.messages = vec![
            Message {
                role: MessageRole::User,
                content: "hi".to_string(),
                timestamp: ts,
            },
            Message {
                role: MessageRole::Assistant,
                content: "hello!".to_string(),
                timestamp: ts,
            },
        ];

        let text = render_transcript(&conv);

        assert!(text.starts_with("# Trip\nProvider: mistral · Model: mistral-small-latest\n"));
        let user_at = text.find("[2024-01-01T00:00:00Z] User:\nhi").unwrap();
        let assistant_at = text.find("[2024-01-01T00:00:00Z] Assistant:\nhello!").unwrap();
        assert!(user_at < assistant_at);
    }
}
