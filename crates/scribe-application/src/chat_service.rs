//! Chat use cases.
//!
//! `ChatService` drives the conversation lifecycle on top of a
//! [`ConversationRepository`]. It never touches files or keys itself: the
//! repository decides how (and whether) to encrypt.

use crate::export::{ExportSink, suggested_file_name};
use crate::inference::{InferenceBackend, provider_error};
use scribe_core::conversation::{Conversation, ConversationRepository, Message, MessageRole};
use scribe_core::error::{Result, ScribeError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Use case for creating and extending conversations.
///
/// # Concurrency
///
/// Updates to one conversation are serialized by a per-id lock so two
/// appends never overwrite each other. Different conversations proceed
/// independently. A lock lives only while some call holds or waits for it.
pub struct ChatService {
    repository: Arc<dyn ConversationRepository>,
    backend: Option<Arc<dyn InferenceBackend>>,
    locks: LockMap,
}

impl ChatService {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self {
            repository,
            backend: None,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Attaches the backend used by [`send`](Self::send).
    pub fn with_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn repository(&self) -> &Arc<dyn ConversationRepository> {
        &self.repository
    }

    /// Starts and persists an empty conversation with a fresh UUID v4 id.
    pub async fn new_chat(&self, provider: &str, model: &str) -> Result<Conversation> {
        let conversation = Conversation::new(Uuid::new_v4().to_string(), provider, model);
        self.repository.save(&conversation).await?;
        tracing::info!(id = %conversation.id, provider, model, "new chat");
        Ok(conversation)
    }

    /// Sets the title of conversation `id`.
    pub async fn rename(&self, id: &str, title: &str) -> Result<Conversation> {
        let _guard = self.lock_for(id).await;

        let mut conversation = self.require(id).await?;
        conversation.title = title.trim().to_string();
        self.repository.save(&conversation).await?;
        Ok(conversation)
    }

    /// Appends a message and persists the conversation.
    ///
    /// The first user message names a still-untitled chat.
    pub async fn append_message(
        &self,
        id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Conversation> {
        let _guard = self.lock_for(id).await;

        let mut conversation = self.require(id).await?;
        conversation.push_message(Message::new(role, content));
        self.repository.save(&conversation).await?;
        Ok(conversation)
    }

    /// Sends a user message and stores the backend's reply.
    ///
    /// The user message is persisted before the backend is called, so a
    /// provider failure never loses what the user typed.
    pub async fn send(&self, id: &str, content: &str) -> Result<Message> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| ScribeError::Provider("no inference backend configured".to_string()))?;

        let _guard = self.lock_for(id).await;

        let mut conversation = self.require(id).await?;
        conversation.push_message(Message::new(MessageRole::User, content));
        self.repository.save(&conversation).await?;

        let reply = backend
            .complete(&conversation.provider, &conversation.model, &conversation.messages)
            .await
            .map_err(|err| {
                let err = provider_error(err);
                tracing::warn!(id, error = %err, "inference failed");
                err
            })?;

        let reply = Message::new(MessageRole::Assistant, reply);
        conversation.push_message(reply.clone());
        self.repository.save(&conversation).await?;
        Ok(reply)
    }

    /// Renders conversation `id` and hands it to `sink`.
    ///
    /// Returns the name the transcript was delivered under.
    pub async fn export(&self, id: &str, sink: &dyn ExportSink) -> Result<String> {
        let conversation = self.require(id).await?;
        let name = suggested_file_name(&conversation);
        let text = scribe_core::conversation::render_transcript(&conversation);
        sink.deliver(&name, &text).await?;
        Ok(name)
    }

    async fn require(&self, id: &str) -> Result<Conversation> {
        self.repository
            .load(id)
            .await?
            .ok_or_else(|| ScribeError::not_found("conversation", id))
    }

    async fn lock_for(&self, id: &str) -> ConversationGuard<'_> {
        let mut held = ConversationGuard {
            locks: &self.locks,
            id: id.to_string(),
            guard: None,
        };
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Holds the per-id lock; dropping it forgets the lock once nobody else
/// holds or waits for it.
struct ConversationGuard<'a> {
    locks: &'a LockMap,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.id);
        }
    }
}
