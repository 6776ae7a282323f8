//! In-memory stores, useful for testing and ephemeral sessions.

use crate::vector;
use async_trait::async_trait;
use chrono::Utc;
use localmind_core::error::{MemoryError, StoreError};
use localmind_core::memory::{MemoryItem, SemanticMemory};
use localmind_core::message::{Role, SummaryChapter, Turn, TurnId};
use localmind_core::profile::{ModelProfile, ProfileProvider, UserProfile};
use localmind_core::store::{SessionStore, SummaryLedger, TranscriptStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct SessionState {
    last_turn_id: TurnId,
    last_chapter_id: i64,
    turns: Vec<Turn>,
    chapters: Vec<SummaryChapter>,
    users: HashMap<String, UserProfile>,
    models: HashMap<String, ModelProfile>,
}

/// Transcript store, summary ledger and profile provider kept in a Vec.
///
/// Enforces the same compaction commit rules as the SQLite store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<SessionState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user profile.
    pub async fn put_user_profile(&self, profile: UserProfile) {
        self.state
            .write()
            .await
            .users
            .insert(profile.user_id.clone(), profile);
    }

    /// Register a model profile.
    pub async fn put_model_profile(&self, profile: ModelProfile) {
        self.state
            .write()
            .await
            .models
            .insert(profile.model_id.clone(), profile);
    }
}

#[async_trait]
impl TranscriptStore for InMemoryStore {
    async fn append(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        model_used: Option<&str>,
    ) -> Result<TurnId, StoreError> {
        let mut state = self.state.write().await;
        state.last_turn_id += 1;
        let id = state.last_turn_id;
        state.turns.push(Turn {
            id,
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            model_used: model_used.map(str::to_string),
            summarized: false,
        });
        Ok(id)
    }

    async fn count_unsummarized(&self, session_id: &str) -> Result<usize, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .turns
            .iter()
            .filter(|t| t.session_id == session_id && !t.summarized)
            .count())
    }

    async fn oldest_unsummarized(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .turns
            .iter()
            .filter(|t| t.session_id == session_id && !t.summarized)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_summarized(&self, turn_ids: &[TurnId]) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let mut flipped = 0;
        for turn in state.turns.iter_mut() {
            if !turn.summarized && turn_ids.contains(&turn.id) {
                turn.summarized = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let state = self.state.read().await;
        let session: Vec<&Turn> = state
            .turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .collect();
        let skip = session.len().saturating_sub(limit);
        Ok(session.into_iter().skip(skip).cloned().collect())
    }

    async fn all_turns(&self, session_id: &str) -> Result<Vec<Turn>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SummaryLedger for InMemoryStore {
    async fn append_chapter(
        &self,
        session_id: &str,
        content: &str,
        start_id: TurnId,
        end_id: TurnId,
    ) -> Result<SummaryChapter, StoreError> {
        let mut state = self.state.write().await;
        state.last_chapter_id += 1;
        let chapter = SummaryChapter {
            id: state.last_chapter_id,
            session_id: session_id.to_string(),
            content: content.to_string(),
            start_turn_id: start_id,
            end_turn_id: end_id,
            created_at: Utc::now(),
        };
        state.chapters.push(chapter.clone());
        Ok(chapter)
    }

    async fn chapters(&self, session_id: &str) -> Result<Vec<SummaryChapter>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .chapters
            .iter()
            .filter(|c| c.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn commit_compaction(
        &self,
        session_id: &str,
        content: &str,
        turn_ids: &[TurnId],
    ) -> Result<SummaryChapter, StoreError> {
        let (Some(&start), Some(&end)) = (turn_ids.first(), turn_ids.last()) else {
            return Err(StoreError::QueryFailed(
                "commit_compaction needs at least one turn".into(),
            ));
        };
        let violation = || StoreError::RangeInvariantViolation {
            session_id: session_id.to_string(),
            start_turn_id: start,
            end_turn_id: end,
        };

        // Validation and both writes happen under one write guard.
        let mut state = self.state.write().await;

        let last_end = state
            .chapters
            .iter()
            .filter(|c| c.session_id == session_id)
            .map(|c| c.end_turn_id)
            .max();
        if last_end.is_some_and(|last| start <= last) {
            return Err(violation());
        }

        let session: Vec<&Turn> = state
            .turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .collect();
        let skipped = session.iter().any(|t| t.id < start && !t.summarized);
        let in_range: Vec<&&Turn> = session
            .iter()
            .filter(|t| (start..=end).contains(&t.id))
            .collect();
        let matches = in_range.len() == turn_ids.len()
            && in_range
                .iter()
                .all(|t| !t.summarized && turn_ids.contains(&t.id));
        if skipped || !matches {
            return Err(violation());
        }

        for turn in state.turns.iter_mut() {
            if turn.session_id == session_id && turn_ids.contains(&turn.id) {
                turn.summarized = true;
            }
        }
        state.last_chapter_id += 1;
        let chapter = SummaryChapter {
            id: state.last_chapter_id,
            session_id: session_id.to_string(),
            content: content.to_string(),
            start_turn_id: start,
            end_turn_id: end,
            created_at: Utc::now(),
        };
        state.chapters.push(chapter.clone());
        Ok(chapter)
    }

    async fn wipe(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.turns.clear();
        state.chapters.clear();
        Ok(())
    }
}

#[async_trait]
impl ProfileProvider for InMemoryStore {
    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn get_model_profile(&self, model_id: &str) -> Result<Option<ModelProfile>, StoreError> {
        Ok(self.state.read().await.models.get(model_id).cloned())
    }
}

/// Semantic memory kept in a Vec with brute-force cosine ranking.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    items: Arc<RwLock<Vec<MemoryItem>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn dimension_of(items: &[MemoryItem]) -> Option<usize> {
    items
        .iter()
        .find(|i| !i.embedding.is_empty())
        .map(|i| i.embedding.len())
}

#[async_trait]
impl SemanticMemory for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<MemoryItem>, MemoryError> {
        let items = self.items.read().await;
        vector::check_dimension(dimension_of(&items), vector.len())?;
        Ok(vector::rank_by_similarity(items.clone(), vector, k))
    }

    async fn add(
        &self,
        content: &str,
        vector: Vec<f32>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, MemoryError> {
        let mut items = self.items.write().await;
        vector::check_dimension(dimension_of(&items), vector.len())?;

        let mut item = MemoryItem::new(content, vector);
        item.id = Uuid::new_v4().to_string();
        item.metadata = metadata;
        let id = item.id.clone();
        items.push(item);
        Ok(id)
    }

    async fn update(
        &self,
        id: &str,
        content: &str,
        vector: Option<Vec<f32>>,
    ) -> Result<(), MemoryError> {
        let mut items = self.items.write().await;
        if let Some(v) = &vector {
            vector::check_dimension(dimension_of(&items), v.len())?;
        }
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        item.content = content.to_string();
        if let Some(v) = vector {
            item.embedding = v;
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| !ids.contains(&i.id));
        Ok(before - items.len())
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryItem>, MemoryError> {
        Ok(self.items.read().await.iter().find(|i| i.id == id).cloned())
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<MemoryItem>, MemoryError> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.items.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.items.write().await.clear();
        Ok(())
    }
}
