//! Semantic retrieval for the context's long-term memory and documents
//! sections.

use localmind_config::RetrievalConfig;
use localmind_core::error::Result;
use localmind_core::memory::{MemoryItem, SemanticMemory};
use localmind_core::provider::InferenceService;
use std::sync::Arc;
use tracing::debug;

/// Hits plus the joined document text, already within the character budget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub hits: Vec<MemoryItem>,
    pub rag_context: String,
}

pub struct Retriever {
    inference: Arc<dyn InferenceService>,
    memory: Arc<dyn SemanticMemory>,
    embedding_model: String,
    top_k: usize,
    max_context_chars: usize,
}

impl Retriever {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        memory: Arc<dyn SemanticMemory>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            inference,
            memory,
            embedding_model: config.embedding_model.clone(),
            top_k: config.top_k,
            max_context_chars: config.max_context_chars,
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Embed `query` and fetch the nearest items. Upstream failures propagate.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let vector = self.inference.embed(&self.embedding_model, query).await?;
        let hits = self.memory.query(&vector, self.top_k).await?;

        let joined = hits
            .iter()
            .map(|item| item.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let rag_context = truncate_chars(&joined, self.max_context_chars).to_string();

        debug!(
            hits = hits.len(),
            chars = rag_context.chars().count(),
            truncated = rag_context.len() < joined.len(),
            "Retrieved semantic context"
        );
        Ok(Retrieval { hits, rag_context })
    }
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
