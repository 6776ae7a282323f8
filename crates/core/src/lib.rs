//! # LocalMind Core
//!
//! Domain types, collaborator traits, and error definitions for LocalMind's
//! layered conversational memory. This crate has **no storage or network
//! dependencies**: it defines the model that every other crate implements
//! against.
//!
//! ## Memory layers
//!
//! - **Active window**: raw turns not yet folded into a chapter
//! - **Deep past**: the append-only transcript plus its chapter ledger
//! - **Semantic memory**: vector-indexed long-term facts
//!
//! Every collaborator is a trait here so the engine can be tested with
//! in-memory stores and scripted inference.

pub mod error;
pub mod memory;
pub mod message;
pub mod profile;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, RenderError, Result, StoreError};
pub use memory::{MemoryItem, SemanticMemory};
pub use message::{
    ChapterId, ChatMessage, ChatRole, DEFAULT_SESSION, Role, SummaryChapter, Turn, TurnId,
};
pub use profile::{ModelProfile, ProfileProvider, UserProfile};
pub use provider::InferenceService;
pub use store::{SessionStore, SummaryLedger, TranscriptStore};
