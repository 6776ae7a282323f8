//! Error types for the LocalMind domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all LocalMind operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Inference service errors (upstream unavailable) ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Transcript store / summary ledger errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Semantic memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Prompt rendering errors ---
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error came from an unreachable or failing upstream
    /// collaborator (inference service or semantic memory).
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Memory(_))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A compaction commit would overlap an existing chapter or re-mark
    /// turns that another compaction run already summarized.
    #[error(
        "Chapter range [{start_turn_id}, {end_turn_id}] conflicts with existing summaries in session {session_id}"
    )]
    RangeInvariantViolation {
        session_id: String,
        start_turn_id: i64,
        end_turn_id: i64,
    },
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Memory item not found: {0}")]
    NotFound(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The schema handed to the renderer lacks a required key.
    #[error("Context schema is missing required field `{field}`")]
    SchemaIncomplete { field: String },

    /// All keys are present but one has the wrong shape.
    #[error("Context schema is malformed: {reason}")]
    InvalidSchema { reason: String },
}
