//! Semantic memory trait: vector-indexed long-term facts.
//!
//! Semantic memory is independent of the turn-by-turn transcript. Items are
//! created by explicit user action or by the sidecar fact extractor and are
//! retrieved by vector similarity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// A single long-term memory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique ID for this memory
    pub id: String,

    /// The remembered text
    pub content: String,

    /// Embedding vector (never serialized to clients)
    #[serde(skip)]
    pub embedding: Vec<f32>,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Similarity score (set by query operations)
    #[serde(default)]
    pub score: f32,
}

impl MemoryItem {
    pub fn new(content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            embedding,
            metadata: serde_json::Map::new(),
            score: 0.0,
        }
    }
}

/// The core SemanticMemory trait.
///
/// Implementations: SQLite vector store, in-memory (for testing).
#[async_trait]
pub trait SemanticMemory: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// The `k` items most similar to `vector`, best first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<MemoryItem>, MemoryError>;

    /// Store a new item and return its id.
    async fn add(
        &self,
        content: &str,
        vector: Vec<f32>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, MemoryError>;

    /// Replace an item's content and optionally its embedding.
    async fn update(
        &self,
        id: &str,
        content: &str,
        vector: Option<Vec<f32>>,
    ) -> Result<(), MemoryError>;

    /// Delete items by id; returns how many were removed.
    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError>;

    /// Get an item by id.
    async fn get(&self, id: &str) -> Result<Option<MemoryItem>, MemoryError>;

    /// List stored items, oldest first.
    async fn list(&self, limit: Option<usize>) -> Result<Vec<MemoryItem>, MemoryError>;

    /// Total item count.
    async fn count(&self) -> Result<usize, MemoryError>;

    /// Remove every item.
    async fn clear(&self) -> Result<(), MemoryError>;
}
