use async_trait::async_trait;
use scribe_application::{ChatService, ExportSink, FileExportSink, InferenceBackend};
use scribe_core::PassphraseSession;
use scribe_core::conversation::{ConversationRepository, Message, MessageRole};
use scribe_core::error::{Result, ScribeError};
use scribe_infrastructure::{AsyncDirConversationRepository, EnvelopeCodec, KdfParams};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Echoes the last message back and records what it was asked.
#[derive(Default)]
struct EchoBackend {
    calls: Mutex<Vec<(String, String, usize)>>,
}

#[async_trait]
impl InferenceBackend for EchoBackend {
    async fn complete(&self, provider: &str, model: &str, messages: &[Message]) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((provider.to_string(), model.to_string(), messages.len()));
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(format!("echo: {last}"))
    }
}

struct FailingBackend;

#[async_trait]
impl InferenceBackend for FailingBackend {
    async fn complete(&self, _: &str, _: &str, _: &[Message]) -> Result<String> {
        Err(ScribeError::io("connection reset"))
    }
}

/// Collects deliveries in memory.
#[derive(Default)]
struct MemorySink {
    delivered: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn deliver(&self, suggested_name: &str, text: &str) -> Result<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((suggested_name.to_string(), text.to_string()));
        Ok(())
    }
}

async fn store(
    temp_dir: &TempDir,
    session: Arc<PassphraseSession>,
) -> Arc<AsyncDirConversationRepository> {
    Arc::new(
        AsyncDirConversationRepository::with_settings(
            temp_dir.path(),
            session,
            Duration::ZERO,
            EnvelopeCodec::with_params(KdfParams::testing()),
        )
        .await
        .unwrap(),
    )
}

#[tokio::test]
async fn test_new_chat_is_persisted_untitled() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::new())).await;
    let service = ChatService::new(repo.clone());

    let chat = service.new_chat("openai", "gpt-4o-mini").await.unwrap();

    assert!(uuid::Uuid::parse_str(&chat.id).is_ok());
    assert_eq!(chat.title, "New chat");
    assert!(chat.messages.is_empty());
    let listed = repo.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, chat.id);
}

#[tokio::test]
async fn test_first_user_message_names_the_chat() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::new())).await;
    let service = ChatService::new(repo.clone());
    let chat = service.new_chat("mistral", "mistral-small-latest").await.unwrap();

    let updated = service
        .append_message(&chat.id, MessageRole::User, "Plan a trip to Lyon")
        .await
        .unwrap();

    assert_eq!(updated.title, "Plan a trip to Lyon");
    assert!(updated.updated_at >= chat.updated_at);
    let entry = repo.list().await.unwrap().remove(0);
    assert_eq!(entry.title, "Plan a trip to Lyon");
    assert_eq!(entry.updated_at, updated.updated_at);
}

#[tokio::test]
async fn test_send_stores_user_message_and_reply() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::unlocked("p1"))).await;
    let backend = Arc::new(EchoBackend::default());
    let service = ChatService::new(repo.clone()).with_backend(backend.clone());
    let chat = service.new_chat("openai", "gpt-4o-mini").await.unwrap();

    let reply = service.send(&chat.id, "ping").await.unwrap();

    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "echo: ping");
    assert_eq!(
        backend.calls.lock().unwrap().as_slice(),
        &[("openai".to_string(), "gpt-4o-mini".to_string(), 1)]
    );
    let stored = repo.load(&chat.id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 2);
}

#[tokio::test]
async fn test_provider_failure_keeps_user_message() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::new())).await;
    let service = ChatService::new(repo.clone()).with_backend(Arc::new(FailingBackend));
    let chat = service.new_chat("openai", "gpt-4o-mini").await.unwrap();

    let err = service.send(&chat.id, "are you there?").await.unwrap_err();

    assert!(matches!(err, ScribeError::Provider(_)));
    let stored = repo.load(&chat.id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].content, "are you there?");
}

#[tokio::test]
async fn test_send_without_backend_is_provider_error() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::new())).await;
    let service = ChatService::new(repo);
    let chat = service.new_chat("openai", "gpt-4o-mini").await.unwrap();

    let err = service.send(&chat.id, "hello").await.unwrap_err();
    assert!(matches!(err, ScribeError::Provider(_)));
}

#[tokio::test]
async fn test_append_to_missing_chat_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::new())).await;
    let service = ChatService::new(repo);

    let err = service
        .append_message("missing", MessageRole::User, "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, ScribeError::NotFound { entity_type: "conversation", .. }));
}

#[tokio::test]
async fn test_concurrent_appends_keep_every_message() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::new())).await;
    let service = Arc::new(ChatService::new(repo.clone()));
    let chat = service.new_chat("openai", "gpt-4o-mini").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let service = Arc::clone(&service);
        let id = chat.id.clone();
        handles.push(tokio::spawn(async move {
            service
                .append_message(&id, MessageRole::User, &format!("message {i}"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = repo.load(&chat.id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 6);
}

#[tokio::test]
async fn test_export_delivers_plaintext_transcript() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::unlocked("p1"))).await;
    let service = ChatService::new(repo);
    let chat = service.new_chat("openai", "gpt-4o-mini").await.unwrap();
    service
        .append_message(&chat.id, MessageRole::User, "Summarise the meeting")
        .await
        .unwrap();

    let sink = MemorySink::default();
    let name = service.export(&chat.id, &sink).await.unwrap();

    let delivered = sink.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, name);
    assert!(name.starts_with("summarise-the-meeting-"));
    assert!(delivered[0].1.contains("Summarise the meeting"));
}

#[tokio::test]
async fn test_file_sink_export() {
    let temp_dir = TempDir::new().unwrap();
    let repo = store(&temp_dir, Arc::new(PassphraseSession::new())).await;
    let service = ChatService::new(repo);
    let chat = service.new_chat("openai", "gpt-4o-mini").await.unwrap();
    service.rename(&chat.id, "Notes").await.unwrap();

    let out = temp_dir.path().join("out");
    let name = service.export(&chat.id, &FileExportSink::new(&out)).await.unwrap();

    let text = std::fs::read_to_string(out.join(&name)).unwrap();
    assert!(text.starts_with("# Notes"));
}
