//! Sidecar fact extraction.
//!
//! After each exchange a small summarizer model is asked whether anything is
//! worth remembering long-term. Useful answers are embedded and stored in
//! semantic memory. Every failure here is logged and swallowed: extraction
//! never affects the reply.

use localmind_core::error::Result;
use localmind_core::memory::SemanticMemory;
use localmind_core::message::ChatMessage;
use localmind_core::provider::InferenceService;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Marker the summarizer answers with when nothing qualifies.
pub const NO_DATA: &str = "NO_DATA";

/// A memory item created by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMemory {
    pub id: String,
    pub content: String,
}

pub fn build_extraction_prompt(user_message: &str, reply: &str) -> String {
    format!(
        "Analyze this interaction and extract only the useful facts or context to remember.\n\
         Ignore pleasantries. If nothing is worth remembering, reply with \"{NO_DATA}\".\n\n\
         User: {user_message}\nAI: {reply}\n\nSummary:"
    )
}

pub struct FactExtractor {
    inference: Arc<dyn InferenceService>,
    memory: Arc<dyn SemanticMemory>,
    embedding_model: String,
}

impl FactExtractor {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        memory: Arc<dyn SemanticMemory>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            inference,
            memory,
            embedding_model: embedding_model.into(),
        }
    }

    /// Extract and store facts from one exchange. `None` when nothing was
    /// worth keeping or anything failed.
    pub async fn extract(
        &self,
        summarizer_model: &str,
        user_message: &str,
        reply: &str,
    ) -> Option<NewMemory> {
        match self.try_extract(summarizer_model, user_message, reply).await {
            Ok(found) => found,
            Err(e) => {
                warn!(model = summarizer_model, error = %e, "Fact extraction failed");
                None
            }
        }
    }

    async fn try_extract(
        &self,
        summarizer_model: &str,
        user_message: &str,
        reply: &str,
    ) -> Result<Option<NewMemory>> {
        let prompt = build_extraction_prompt(user_message, reply);
        let answer = self
            .inference
            .chat(summarizer_model, &[ChatMessage::user(prompt)])
            .await?;
        let fact = answer.trim();

        if fact.is_empty() || fact.contains(NO_DATA) {
            debug!(model = summarizer_model, "Nothing worth remembering");
            return Ok(None);
        }

        let vector = self.inference.embed(&self.embedding_model, fact).await?;
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), "sidecar".into());
        metadata.insert("model".into(), summarizer_model.into());
        let id = self.memory.add(fact, vector, metadata).await?;

        info!(memory_id = %id, model = summarizer_model, "Stored new long-term memory");
        Ok(Some(NewMemory {
            id,
            content: fact.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedInference, unreachable};
    use localmind_memory::InMemoryVectorStore;

    fn setup(inference: ScriptedInference) -> (FactExtractor, Arc<InMemoryVectorStore>) {
        let memory = Arc::new(InMemoryVectorStore::new());
        let extractor = FactExtractor::new(Arc::new(inference), memory.clone(), "mxbai-embed-large");
        (extractor, memory)
    }

    #[test]
    fn prompt_mentions_marker_and_exchange() {
        let prompt = build_extraction_prompt("I use sqlx", "Noted");
        assert!(prompt.contains("reply with \"NO_DATA\""));
        assert!(prompt.ends_with("User: I use sqlx\nAI: Noted\n\nSummary:"));
    }

    #[tokio::test]
    async fn stores_useful_facts() {
        let (extractor, memory) = setup(ScriptedInference::always("  User works with sqlx.  "));
        let created = extractor.extract("qwen2.5:0.5b", "I use sqlx", "Noted").await.unwrap();

        assert_eq!(created.content, "User works with sqlx.");
        let stored = memory.get(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata["source"], "sidecar");
        assert_eq!(stored.metadata["model"], "qwen2.5:0.5b");
    }

    #[tokio::test]
    async fn no_data_stores_nothing() {
        let (extractor, memory) = setup(ScriptedInference::always("NO_DATA."));
        assert!(extractor.extract("m", "hi", "hello").await.is_none());
        assert_eq!(memory.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let (extractor, memory) = setup(ScriptedInference::new(vec![Err(unreachable())]));
        assert!(extractor.extract("m", "hi", "hello").await.is_none());

        assert_eq!(memory.count().await.unwrap(), 0);

        let (extractor, memory) = setup(ScriptedInference::always("a fact").with_failing_embeddings());
        assert!(extractor.extract("m", "hi", "hello").await.is_none());
        assert_eq!(memory.count().await.unwrap(), 0);
    }
}
