//! Transcript store and summary ledger traits, the "tape of truth".
//!
//! The transcript is an append-only ordered log of turns per session; the
//! ledger is an ordered log of compacted chapters. Together they must keep
//! the partition invariant: chapters cover a gap-free prefix of turn ids and
//! exactly the uncovered suffix stays unsummarized.

use async_trait::async_trait;
use crate::error::StoreError;
use crate::message::{Role, SummaryChapter, Turn, TurnId};

/// Append-only ordered log of turns per session.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Append a turn and return its id.
    async fn append(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        model_used: Option<&str>,
    ) -> Result<TurnId, StoreError>;

    /// Number of turns in the session not yet folded into a chapter.
    async fn count_unsummarized(&self, session_id: &str) -> Result<usize, StoreError>;

    /// The oldest `limit` unsummarized turns, ascending by id.
    async fn oldest_unsummarized(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError>;

    /// Mark turns summarized. Only turns that are still unsummarized are
    /// touched; returns how many rows flipped.
    async fn mark_summarized(&self, turn_ids: &[TurnId]) -> Result<usize, StoreError>;

    /// The most recent `limit` turns, returned oldest-first.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, StoreError>;

    /// Every turn in the session, ascending by id.
    async fn all_turns(&self, session_id: &str) -> Result<Vec<Turn>, StoreError>;
}

/// Ordered log of compacted chapters per session.
#[async_trait]
pub trait SummaryLedger: Send + Sync {
    /// Append a chapter covering `[start_id, end_id]`.
    async fn append_chapter(
        &self,
        session_id: &str,
        content: &str,
        start_id: TurnId,
        end_id: TurnId,
    ) -> Result<SummaryChapter, StoreError>;

    /// All chapters of the session, ascending by id.
    async fn chapters(&self, session_id: &str) -> Result<Vec<SummaryChapter>, StoreError>;
}

/// A store that owns both logs and can migrate turns into a chapter atomically.
#[async_trait]
pub trait SessionStore: TranscriptStore + SummaryLedger {
    /// Insert one chapter covering `turn_ids` and mark every one of them
    /// summarized, as a single all-or-nothing unit.
    ///
    /// `turn_ids` must be ascending and non-empty. The commit is rejected with
    /// [`StoreError::RangeInvariantViolation`] (and nothing is written) if any
    /// of the turns is already summarized or the range does not start after
    /// the last chapter of the session.
    async fn commit_compaction(
        &self,
        session_id: &str,
        content: &str,
        turn_ids: &[TurnId],
    ) -> Result<SummaryChapter, StoreError>;

    /// Remove every turn and chapter. Used by the reset utility.
    async fn wipe(&self) -> Result<(), StoreError>;
}
