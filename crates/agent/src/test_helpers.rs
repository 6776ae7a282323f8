//! Shared test helpers for agent tests.

use localmind_core::error::ProviderError;
use localmind_core::message::ChatMessage;
use localmind_core::provider::InferenceService;
use std::sync::Mutex;

/// A scripted inference service.
///
/// Each `chat` call pops the next scripted reply (an `Err` simulates an
/// unreachable daemon). When the script runs dry the default reply is used.
/// Every prompt is recorded so tests can assert on what was sent.
pub struct ScriptedInference {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    default_reply: String,
    prompts: Mutex<Vec<(String, String)>>,
    embed_fails: bool,
    chat_fails: bool,
    installed: Vec<String>,
}

impl ScriptedInference {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            default_reply: "ok".into(),
            prompts: Mutex::new(Vec::new()),
            embed_fails: false,
            chat_fails: false,
            installed: Vec::new(),
        }
    }

    /// Always answer with `text`.
    pub fn always(text: &str) -> Self {
        let mut s = Self::new(Vec::new());
        s.default_reply = text.into();
        s
    }

    /// Every chat call fails as if the daemon were down.
    pub fn failing() -> Self {
        let mut s = Self::new(Vec::new());
        s.chat_fails = true;
        s
    }

    pub fn with_installed(mut self, models: &[&str]) -> Self {
        self.installed = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_failing_embeddings(mut self) -> Self {
        self.embed_fails = true;
        self
    }

    /// Queue another reply.
    pub fn push(&self, reply: Result<String, ProviderError>) {
        self.replies.lock().unwrap().push(reply);
    }

    /// `(model, prompt)` for every chat call so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

pub fn unreachable() -> ProviderError {
    ProviderError::Network("connection refused (127.0.0.1:11434)".into())
}

/// A deterministic toy embedding: letter frequencies over a-z.
pub fn toy_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 26];
    for c in text.to_ascii_lowercase().chars() {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    v
}

#[async_trait::async_trait]
impl InferenceService for ScriptedInference {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push((model.to_string(), prompt));

        if self.chat_fails {
            return Err(unreachable());
        }
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Ok(self.default_reply.clone())
        } else {
            replies.remove(0)
        }
    }

    async fn embed(&self, _model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        if self.embed_fails {
            return Err(unreachable());
        }
        Ok(toy_embedding(text))
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.installed.clone())
    }
}
