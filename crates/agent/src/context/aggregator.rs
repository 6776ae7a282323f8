//! Memory tier aggregation.
//!
//! Merges the four memory sources into one [`ContextSchema`]:
//!
//! 1. **Profiles** from the [`ProfileResolver`]
//! 2. **Deep past**: the chapter narrative from the summary ledger
//! 3. **Semantic hits** and retrieved documents, supplied by the caller
//! 4. **Active window**: the caller-supplied unsummarized turns
//!
//! [`compose`] is the pure merge step. [`MemoryTierAggregator::assemble`]
//! only adds the two reads it needs (profiles and the ledger narrative).

use crate::compaction::session_narrative;
use crate::context::render::NO_DOCUMENTS;
use crate::context::schema::{ContextMeta, ContextSchema, IdentityBlock, MemoryBlock, token_estimate};
use crate::profile::{ProfileResolver, ResolvedProfiles};
use localmind_core::error::Result;
use localmind_core::memory::MemoryItem;
use localmind_core::message::Turn;
use localmind_core::store::SessionStore;
use std::sync::Arc;
use tracing::debug;

/// Deep-past block for a session with no chapters.
pub const NEW_SESSION_MARKER: &str = "New session started.";

/// System prompt used when neither the caller nor the model profile has one.
pub const GENERIC_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const DEFAULT_USER_NAME: &str = "User";
const DEFAULT_WORKSPACE: &str = "Default";

/// Everything the caller knows about the turn being assembled.
#[derive(Debug, Clone, Default)]
pub struct AssemblyRequest {
    pub session_id: String,
    pub user_message: String,
    pub model_name: String,
    pub system_prompt_override: Option<String>,
    pub semantic_hits: Vec<MemoryItem>,
    /// Already truncated by the retriever
    pub rag_context: String,
    /// Unsummarized turns preceding the current message, oldest first
    pub active_window: Vec<Turn>,
    pub identity_overrides: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Pure merge of resolved inputs into a schema.
pub fn compose(
    request: AssemblyRequest,
    profiles: ResolvedProfiles,
    narrative: &str,
    assistant_name: &str,
    fallback_system_prompt: &str,
) -> ContextSchema {
    let system = [
        request.system_prompt_override.as_deref(),
        Some(profiles.model_profile.base_system_prompt.as_str()),
    ]
    .into_iter()
    .flatten()
    .find(|prompt| !prompt.is_empty())
    .unwrap_or(fallback_system_prompt)
    .to_string();

    let user = &profiles.user_profile;
    let identity = IdentityBlock {
        user_name: non_empty_or(&user.display_name, DEFAULT_USER_NAME),
        workspace: non_empty_or(&user.workspace, DEFAULT_WORKSPACE),
        assistant_name: assistant_name.to_string(),
    };

    let short_term = non_empty_or(narrative, NEW_SESSION_MARKER);
    let rag_context = non_empty_or(&request.rag_context, NO_DOCUMENTS);

    ContextSchema {
        meta: ContextMeta {
            token_estimate: token_estimate(&request.user_message),
            user_profile: profiles.user_profile,
            model_profile: profiles.model_profile,
        },
        system,
        identity,
        memory: MemoryBlock {
            long_term: request.semantic_hits,
            short_term,
        },
        rag_context,
        history: request.active_window,
        current_message: request.user_message,
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Assembles the context schema for one turn.
pub struct MemoryTierAggregator {
    resolver: Arc<ProfileResolver>,
    store: Arc<dyn SessionStore>,
    assistant_name: String,
    fallback_system_prompt: String,
}

impl MemoryTierAggregator {
    pub fn new(
        resolver: Arc<ProfileResolver>,
        store: Arc<dyn SessionStore>,
        assistant_name: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            store,
            assistant_name: assistant_name.into(),
            fallback_system_prompt: GENERIC_SYSTEM_PROMPT.into(),
        }
    }

    pub fn with_fallback_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.fallback_system_prompt = prompt.into();
        self
    }

    /// Build the schema. Ledger read failures propagate.
    pub async fn assemble(&self, request: AssemblyRequest) -> Result<ContextSchema> {
        let profiles = self
            .resolver
            .resolve(&request.model_name, request.identity_overrides.as_ref())
            .await;
        let narrative = session_narrative(self.store.as_ref(), &request.session_id).await?;

        debug!(
            session_id = %request.session_id,
            model = %request.model_name,
            hits = request.semantic_hits.len(),
            history = request.active_window.len(),
            "Assembling context"
        );

        Ok(compose(
            request,
            profiles,
            &narrative,
            &self.assistant_name,
            &self.fallback_system_prompt,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::render::{NO_LONG_TERM_MEMORIES, render};
    use localmind_config::AppConfig;
    use localmind_core::message::Role;
    use localmind_core::profile::{ModelProfile, UserProfile};
    use localmind_core::store::{SummaryLedger, TranscriptStore};
    use localmind_memory::InMemoryStore;

    fn profiles(base_prompt: &str) -> ResolvedProfiles {
        let mut model_profile = ModelProfile::generic("foo-bar");
        model_profile.base_system_prompt = base_prompt.into();
        ResolvedProfiles {
            user_profile: UserProfile::guest(),
            model_profile,
        }
    }

    fn request(message: &str) -> AssemblyRequest {
        AssemblyRequest {
            session_id: "s1".into(),
            user_message: message.into(),
            model_name: "foo-bar".into(),
            ..Default::default()
        }
    }

    #[test]
    fn system_prompt_precedence() {
        let mut req = request("hi");
        req.system_prompt_override = Some("Override".into());
        let schema = compose(req, profiles("Model prompt"), "", "A", GENERIC_SYSTEM_PROMPT);
        assert_eq!(schema.system, "Override");

        let mut req = request("hi");
        req.system_prompt_override = Some(String::new());
        let schema = compose(req, profiles("Model prompt"), "", "A", GENERIC_SYSTEM_PROMPT);
        assert_eq!(schema.system, "Model prompt");

        // Any non-empty override wins, even whitespace.
        let mut req = request("hi");
        req.system_prompt_override = Some("   ".into());
        let schema = compose(req, profiles("Model prompt"), "", "A", GENERIC_SYSTEM_PROMPT);
        assert_eq!(schema.system, "   ");

        let schema = compose(request("hi"), profiles(""), "", "A", GENERIC_SYSTEM_PROMPT);
        assert_eq!(schema.system, GENERIC_SYSTEM_PROMPT);
    }

    #[test]
    fn empty_sources_get_markers() {
        let schema = compose(request("hello"), profiles("p"), "", "LocalMIND Agent", GENERIC_SYSTEM_PROMPT);
        assert_eq!(schema.memory.short_term, NEW_SESSION_MARKER);
        assert_eq!(schema.rag_context, NO_DOCUMENTS);
        assert!(schema.memory.long_term.is_empty());
        assert_eq!(schema.meta.token_estimate, 501);
        assert_eq!(schema.identity.user_name, "Guest");
        assert_eq!(schema.identity.assistant_name, "LocalMIND Agent");

        let prompt = render(&schema);
        assert!(prompt.contains(NEW_SESSION_MARKER));
        assert!(prompt.contains(NO_LONG_TERM_MEMORIES));
        assert!(prompt.contains(NO_DOCUMENTS));
    }

    #[test]
    fn blank_identity_fields_get_defaults() {
        let mut p = profiles("p");
        p.user_profile.display_name.clear();
        p.user_profile.workspace.clear();
        let schema = compose(request("x"), p, "", "A", GENERIC_SYSTEM_PROMPT);
        assert_eq!(schema.identity.user_name, "User");
        assert_eq!(schema.identity.workspace, "Default");
    }

    #[test]
    fn history_passes_through_unmodified() {
        let turns: Vec<Turn> = (1..=3)
            .map(|id| Turn {
                id,
                session_id: "s1".into(),
                role: if id % 2 == 1 { Role::User } else { Role::Assistant },
                content: format!("turn {id}"),
                created_at: chrono::Utc::now(),
                model_used: None,
                summarized: false,
            })
            .collect();
        let mut req = request("x");
        req.active_window = turns.clone();
        let schema = compose(req, profiles("p"), "", "A", GENERIC_SYSTEM_PROMPT);
        assert_eq!(schema.history, turns);
    }

    #[tokio::test]
    async fn assemble_reads_ledger_narrative() {
        let store = Arc::new(InMemoryStore::new());
        let first = store.append("s1", Role::User, "a", None).await.unwrap();
        let second = store.append("s1", Role::Assistant, "b", None).await.unwrap();
        store.append_chapter("s1", "Talked about a", first, first).await.unwrap();
        store.append_chapter("s1", "Then b", second, second).await.unwrap();

        let resolver = Arc::new(ProfileResolver::new(
            store.clone(),
            "demo_user",
            AppConfig::default().model_families,
        ));
        let aggregator = MemoryTierAggregator::new(resolver, store, "LocalMIND Agent");
        let schema = aggregator.assemble(request("next")).await.unwrap();

        assert_eq!(schema.memory.short_term, "- Talked about a\n- Then b");
        assert_eq!(schema.current_message, "next");
    }
}
