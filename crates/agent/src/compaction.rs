//! Deep-past compaction.
//!
//! When a session's unsummarized backlog exceeds the active window, the
//! oldest chunk of turns is summarized by the inference service and folded
//! into one [`SummaryChapter`]. At most one chunk is folded per call; callers
//! that check once per turn drain any backlog over successive turns.
//!
//! The chapter insert and the `summarized` flips are committed together by
//! [`SessionStore::commit_compaction`]. A failed summarize or commit leaves
//! the backlog untouched and the next trigger simply retries.

use localmind_config::CompactionConfig;
use localmind_core::error::{Error, StoreError};
use localmind_core::message::{ChatMessage, Role, SummaryChapter, Turn, TurnId};
use localmind_core::provider::InferenceService;
use localmind_core::store::{SessionStore, SummaryLedger};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const COMPACTION_PROMPT: &str = "Compress the following conversation segment into a single concise paragraph.\n\
Capture the key topics, decisions, or facts mentioned.\n\
Do not lose technical details (like error codes or library names).\n\n\
CONVERSATION:\n";

/// Format a chunk as `User: …` / `AI: …` lines.
pub fn format_chunk(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "AI",
            };
            format!("{speaker}: {}\n", turn.content)
        })
        .collect()
}

pub fn build_compaction_prompt(turns: &[Turn]) -> String {
    format!("{COMPACTION_PROMPT}{}\n\nSUMMARY:", format_chunk(turns))
}

/// All chapters of a session as `- {content}` lines, oldest first.
///
/// Empty when the session has no chapters.
pub async fn session_narrative<L: SummaryLedger + ?Sized>(
    ledger: &L,
    session_id: &str,
) -> Result<String, StoreError> {
    let chapters = ledger.chapters(session_id).await?;
    Ok(chapters
        .iter()
        .map(|chapter| format!("- {}", chapter.content))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Thresholds for one compaction check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Unsummarized turns tolerated before compacting
    pub active_window_size: usize,
    /// Turns folded per chapter
    pub chunk_size: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            active_window_size: 10,
            chunk_size: 5,
        }
    }
}

impl From<&CompactionConfig> for CompactionPolicy {
    fn from(config: &CompactionConfig) -> Self {
        Self {
            active_window_size: config.active_window_size,
            chunk_size: config.chunk_size,
        }
    }
}

/// What a single `check_and_compact` call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompactionOutcome {
    /// Backlog within the active window; nothing touched
    Skipped { unsummarized: usize },
    /// One chunk folded into a new chapter
    Compacted { chapter: SummaryChapter },
    /// Summarize or commit failed; nothing written
    Failed { error: String },
}

pub struct CompactionEngine {
    store: Arc<dyn SessionStore>,
    inference: Arc<dyn InferenceService>,
    policy: CompactionPolicy,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CompactionEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        inference: Arc<dyn InferenceService>,
        policy: CompactionPolicy,
    ) -> Self {
        Self {
            store,
            inference,
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> CompactionPolicy {
        self.policy
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Fold the oldest chunk if the backlog exceeds the active window.
    ///
    /// Never returns an error: failures are logged and reported as
    /// [`CompactionOutcome::Failed`].
    pub async fn check_and_compact(&self, session_id: &str, summarizer_model: &str) -> CompactionOutcome {
        let lock = self.session_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.try_compact(session_id, summarizer_model).await
        };
        self.release_lock(session_id, lock).await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e {
                    Error::Store(StoreError::RangeInvariantViolation { .. }) => {
                        warn!(session_id, error = %e, "Compaction lost a race, discarded")
                    }
                    _ => error!(session_id, model = summarizer_model, error = %e, "Compaction failed"),
                }
                CompactionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Drop the session's lock entry when no other caller holds or waits on it.
    async fn release_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(session_id);
        }
    }

    async fn try_compact(
        &self,
        session_id: &str,
        summarizer_model: &str,
    ) -> Result<CompactionOutcome, Error> {
        let unsummarized = self.store.count_unsummarized(session_id).await?;
        if unsummarized <= self.policy.active_window_size {
            debug!(session_id, count = unsummarized, "Within active window, no compaction");
            return Ok(CompactionOutcome::Skipped { unsummarized });
        }

        let chunk = self
            .store
            .oldest_unsummarized(session_id, self.policy.chunk_size)
            .await?;
        // A short tail is never force-compacted.
        if chunk.len() < self.policy.chunk_size {
            return Ok(CompactionOutcome::Skipped { unsummarized });
        }

        info!(
            session_id,
            count = chunk.len(),
            model = summarizer_model,
            "Compacting oldest turns"
        );

        let prompt = build_compaction_prompt(&chunk);
        let summary = self
            .inference
            .chat(summarizer_model, &[ChatMessage::user(prompt)])
            .await?;

        let ids: Vec<TurnId> = chunk.iter().map(|turn| turn.id).collect();
        let chapter = self
            .store
            .commit_compaction(session_id, summary.trim(), &ids)
            .await?;

        info!(
            session_id,
            chapter_id = chapter.id,
            start_turn_id = chapter.start_turn_id,
            end_turn_id = chapter.end_turn_id,
            "Chapter committed"
        );
        Ok(CompactionOutcome::Compacted { chapter })
    }

    /// The session's chapter narrative; see [`session_narrative`].
    pub async fn get_session_summary(&self, session_id: &str) -> Result<String, StoreError> {
        session_narrative(self.store.as_ref(), session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedInference, unreachable};
    use localmind_core::store::TranscriptStore;
    use localmind_memory::InMemoryStore;

    async fn seed(store: &InMemoryStore, session: &str, n: usize) {
        for i in 0..n {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store.append(session, role, &format!("turn {}", i + 1), None).await.unwrap();
        }
    }

    fn engine(store: Arc<InMemoryStore>, inference: Arc<ScriptedInference>) -> CompactionEngine {
        CompactionEngine::new(store, inference, CompactionPolicy::default())
    }

    #[test]
    fn chunk_format_and_prompt() {
        let turns: Vec<Turn> = [(Role::User, "hi"), (Role::Assistant, "E0502 again")]
            .into_iter()
            .enumerate()
            .map(|(i, (role, content))| Turn {
                id: i as i64 + 1,
                session_id: "s".into(),
                role,
                content: content.into(),
                created_at: chrono::Utc::now(),
                model_used: None,
                summarized: false,
            })
            .collect();

        assert_eq!(format_chunk(&turns), "User: hi\nAI: E0502 again\n");
        let prompt = build_compaction_prompt(&turns);
        assert!(prompt.starts_with("Compress the following conversation segment"));
        assert!(prompt.contains("CONVERSATION:\nUser: hi\nAI: E0502 again\n\n\nSUMMARY:"));
        assert!(prompt.ends_with("SUMMARY:"));
    }

    #[tokio::test]
    async fn within_window_is_noop() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "s", 10).await;
        let inference = Arc::new(ScriptedInference::always("summary"));
        let engine = engine(store.clone(), inference.clone());

        let outcome = engine.check_and_compact("s", "qwen2.5:0.5b").await;
        assert_eq!(outcome, CompactionOutcome::Skipped { unsummarized: 10 });
        assert_eq!(inference.call_count(), 0);
        assert!(store.chapters("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn folds_exactly_one_chunk() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "s", 13).await;
        let inference = Arc::new(ScriptedInference::always("  Greetings and setup.  "));
        let engine = engine(store.clone(), inference.clone());

        let CompactionOutcome::Compacted { chapter } = engine.check_and_compact("s", "m").await else {
            panic!("expected a chapter");
        };
        assert_eq!(chapter.content, "Greetings and setup.");
        assert_eq!((chapter.start_turn_id, chapter.end_turn_id), (1, 5));
        assert_eq!(store.count_unsummarized("s").await.unwrap(), 8);

        let prompts = inference.prompts();
        assert_eq!(prompts[0].0, "m");
        assert!(prompts[0].1.contains("User: turn 1\nAI: turn 2\n"));
        assert!(!prompts[0].1.contains("turn 6"));
    }

    #[tokio::test]
    async fn session_locks_are_released() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "a", 16).await;
        seed(&store, "b", 3).await;
        let engine = Arc::new(engine(store.clone(), Arc::new(ScriptedInference::always("c"))));

        let mut handles = Vec::new();
        for session in ["a", "a", "a", "b"] {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.check_and_compact(session, "m").await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(engine.locks.lock().await.is_empty());
        assert_eq!(store.count_unsummarized("a").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn inference_failure_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "s", 12).await;
        let inference = Arc::new(ScriptedInference::new(vec![Err(unreachable())]));
        let engine = engine(store.clone(), inference);

        let outcome = engine.check_and_compact("s", "m").await;
        assert!(matches!(outcome, CompactionOutcome::Failed { .. }));
        assert_eq!(store.count_unsummarized("s").await.unwrap(), 12);
        assert!(store.chapters("s").await.unwrap().is_empty());

        // The next trigger retries the same chunk.
        let outcome = engine.check_and_compact("s", "m").await;
        assert!(matches!(outcome, CompactionOutcome::Compacted { .. }));
        assert_eq!(store.count_unsummarized("s").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn concurrent_checks_never_overlap() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "s", 11).await;
        let inference = Arc::new(ScriptedInference::always("summary"));
        let engine = Arc::new(engine(store.clone(), inference));

        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.check_and_compact("s", "m").await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.check_and_compact("s", "m").await }
        });
        let outcomes = [a.await.unwrap(), b.await.unwrap()];

        let compacted = outcomes
            .iter()
            .filter(|o| matches!(o, CompactionOutcome::Compacted { .. }))
            .count();
        assert_eq!(compacted, 1);
        assert_eq!(store.chapters("s").await.unwrap().len(), 1);
        assert_eq!(store.count_unsummarized("s").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "a", 11).await;
        seed(&store, "b", 4).await;
        let engine = engine(store.clone(), Arc::new(ScriptedInference::always("x")));

        assert!(matches!(
            engine.check_and_compact("a", "m").await,
            CompactionOutcome::Compacted { .. }
        ));
        assert!(matches!(
            engine.check_and_compact("b", "m").await,
            CompactionOutcome::Skipped { unsummarized: 4 }
        ));
        assert_eq!(store.count_unsummarized("b").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn summary_joins_chapters_in_order() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "s", 20).await;
        let inference = Arc::new(ScriptedInference::new(vec![
            Ok("first".into()),
            Ok("second".into()),
        ]));
        let engine = engine(store.clone(), inference);

        assert_eq!(engine.get_session_summary("s").await.unwrap(), "");
        engine.check_and_compact("s", "m").await;
        engine.check_and_compact("s", "m").await;
        assert_eq!(engine.get_session_summary("s").await.unwrap(), "- first\n- second");
    }
}
