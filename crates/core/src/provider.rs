//! Inference service trait: the abstraction over the local LLM runtime.
//!
//! Calls are stateless: the caller hands over the complete ordered message
//! list every time. Failures (unreachable service, unknown model) surface as
//! [`ProviderError`] and are never retried here.
//!
//! Implementations: Ollama over HTTP, scripted mocks in tests.

use async_trait::async_trait;
use crate::error::ProviderError;
use crate::message::ChatMessage;

/// The core InferenceService trait.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// A human-readable name for this service (e.g., "ollama").
    fn name(&self) -> &str;

    /// Run a chat completion and return the reply text.
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Compute an embedding vector for `text`.
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Names of the installed models.
    ///
    /// Implementations normalize whatever shape the backend returns into a
    /// flat list of identifiers.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Download a model so that later calls can use it.
    async fn pull_model(&self, model: &str) -> Result<(), ProviderError> {
        Err(ProviderError::ModelNotFound(format!(
            "Service '{}' cannot pull models (requested '{model}')",
            self.name()
        )))
    }
}
