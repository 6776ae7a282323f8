//! Turn, chapter and chat message domain types.
//!
//! These are the core value objects that flow through the system:
//! a user message becomes a [`Turn`] in the transcript, old turns are folded
//! into a [`SummaryChapter`], and prompts travel to the inference service as
//! [`ChatMessage`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic transcript identifier.
pub type TurnId = i64;

/// Monotonic chapter identifier.
pub type ChapterId = i64;

/// The session used when a caller does not name one.
pub const DEFAULT_SESSION: &str = "default_session";

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant
    Assistant,
}

impl Role {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a stored role. Anything that is not `user` is an assistant turn.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("user") {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Strictly increasing within a session, never reused
    pub id: TurnId,

    /// Owning session
    pub session_id: String,

    /// Who sent this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the turn was appended
    pub created_at: DateTime<Utc>,

    /// The model that produced (or was addressed by) this turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,

    /// Flips false → true exactly once, inside a compaction commit
    #[serde(default)]
    pub summarized: bool,
}

/// A compacted, immutable paragraph covering a contiguous range of turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryChapter {
    pub id: ChapterId,
    pub session_id: String,
    pub content: String,
    pub start_turn_id: TurnId,
    pub end_turn_id: TurnId,
    pub created_at: DateTime<Utc>,
}

impl SummaryChapter {
    /// Whether `turn_id` falls within this chapter's range.
    pub fn covers(&self, turn_id: TurnId) -> bool {
        (self.start_turn_id..=self.end_turn_id).contains(&turn_id)
    }
}

/// Role of a message sent to the inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A message in an inference request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
