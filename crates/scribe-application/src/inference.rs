//! Inference backend seam.

use async_trait::async_trait;
use scribe_core::conversation::Message;
use scribe_core::error::{Result, ScribeError};

/// Produces the assistant's next reply for a conversation.
///
/// Implementations talk to a provider (OpenAI, Mistral, a local model).
/// Failures should be reported as [`ScribeError::Provider`]; the chat
/// service converts anything else into that variant.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn complete(&self, provider: &str, model: &str, messages: &[Message]) -> Result<String>;
}

/// Folds any backend failure into `ScribeError::Provider`.
pub(crate) fn provider_error(err: ScribeError) -> ScribeError {
    match err {
        ScribeError::Provider(_) => err,
        other => ScribeError::Provider(other.to_string()),
    }
}
