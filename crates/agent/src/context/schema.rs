//! The structured context handed from the aggregator to the renderer.
//!
//! A `ContextSchema` lives for exactly one render and is never persisted.
//! Its serialized key layout is stable: the context preview endpoint returns
//! it verbatim and [`super::render::render_value`] accepts it back.

use localmind_core::memory::MemoryItem;
use localmind_core::message::Turn;
use localmind_core::profile::{ModelProfile, UserProfile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSchema {
    pub meta: ContextMeta,
    pub system: String,
    pub identity: IdentityBlock,
    pub memory: MemoryBlock,
    pub rag_context: String,
    /// The raw active window, oldest first
    pub history: Vec<Turn>,
    pub current_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMeta {
    pub user_profile: UserProfile,
    pub model_profile: ModelProfile,
    /// Informational only, never enforced
    pub token_estimate: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityBlock {
    pub user_name: String,
    pub workspace: String,
    pub assistant_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBlock {
    /// Semantic hits, best first
    pub long_term: Vec<MemoryItem>,
    /// The deep-past narrative, or the new-session marker
    pub short_term: String,
}

/// `chars / 4 + 500`.
pub fn token_estimate(user_message: &str) -> usize {
    user_message.chars().count() / 4 + 500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_counts_chars() {
        assert_eq!(token_estimate(""), 500);
        assert_eq!(token_estimate("abcdefgh"), 502);
        assert_eq!(token_estimate("ééééé"), 501);
    }
}
