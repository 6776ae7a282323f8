//! Profile resolution with override merging and documented fallbacks.
//!
//! A missing user or model record is never an error: users fall back to
//! [`UserProfile::guest`], unknown models get a synthesized profile refined
//! by the configured model-family registry.

use localmind_config::ModelFamilyConfig;
use localmind_core::profile::{ModelProfile, ProfileProvider, UserProfile};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// The profiles used for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedProfiles {
    pub user_profile: UserProfile,
    pub model_profile: ModelProfile,
}

/// Supplies user and model profiles to the aggregator.
pub struct ProfileResolver {
    provider: Arc<dyn ProfileProvider>,
    user_id: String,
    families: Vec<ModelFamilyConfig>,
}

impl ProfileResolver {
    pub fn new(
        provider: Arc<dyn ProfileProvider>,
        user_id: impl Into<String>,
        families: Vec<ModelFamilyConfig>,
    ) -> Self {
        Self {
            provider,
            user_id: user_id.into(),
            families,
        }
    }

    /// Resolve both profiles. Never fails.
    pub async fn resolve(
        &self,
        model_name: &str,
        identity_overrides: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> ResolvedProfiles {
        let mut user_profile = match self.provider.get_user_profile(&self.user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                debug!(user_id = %self.user_id, "User profile missing, using guest");
                UserProfile::guest()
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "User profile lookup failed, using guest");
                UserProfile::guest()
            }
        };
        if let Some(overrides) = identity_overrides {
            user_profile.apply_overrides(overrides);
        }

        let model_profile = match self.provider.get_model_profile(model_name).await {
            Ok(Some(profile)) => profile,
            Ok(None) => synthesize_model_profile(model_name, &self.families),
            Err(e) => {
                warn!(model = model_name, error = %e, "Model profile lookup failed, synthesizing");
                synthesize_model_profile(model_name, &self.families)
            }
        };

        ResolvedProfiles {
            user_profile,
            model_profile,
        }
    }
}

/// Build a profile for a model with no stored record.
///
/// Every family whose token occurs in the (lowercased) model name applies.
/// Families are applied shortest token first, ties broken lexicographically,
/// so a more specific token overrides a generic one field by field and the
/// result does not depend on registry order.
pub fn synthesize_model_profile(model_name: &str, families: &[ModelFamilyConfig]) -> ModelProfile {
    let lowered = model_name.to_lowercase();
    let mut matching: Vec<&ModelFamilyConfig> = families
        .iter()
        .filter(|f| !f.token.is_empty() && lowered.contains(&f.token.to_lowercase()))
        .collect();
    matching.sort_by(|a, b| {
        a.token
            .len()
            .cmp(&b.token.len())
            .then_with(|| a.token.cmp(&b.token))
    });

    let mut profile = ModelProfile::generic(model_name);
    for family in matching {
        if let Some(name) = &family.display_name {
            profile.display_name = name.clone();
        }
        if let Some(limit) = family.context_limit {
            profile.context_limit = limit;
        }
        if let Some(prompt) = &family.base_system_prompt {
            profile.base_system_prompt = prompt.clone();
        }
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use localmind_config::AppConfig;
    use localmind_core::error::StoreError;
    use localmind_core::profile::DEFAULT_MODEL_SYSTEM_PROMPT;
    use localmind_memory::InMemoryStore;
    use serde_json::json;

    fn families() -> Vec<ModelFamilyConfig> {
        AppConfig::default().model_families
    }

    fn family(token: &str, name: &str) -> ModelFamilyConfig {
        ModelFamilyConfig {
            token: token.into(),
            display_name: Some(name.into()),
            context_limit: None,
            base_system_prompt: None,
        }
    }

    #[test]
    fn unknown_model_gets_generic_profile() {
        let profile = synthesize_model_profile("foo-bar", &families());
        assert_eq!(profile.display_name, "foo-bar");
        assert_eq!(profile.context_limit, 4096);
        assert_eq!(profile.base_system_prompt, DEFAULT_MODEL_SYSTEM_PROMPT);
        assert_eq!(profile.prompt_template, "standard_chat");
    }

    #[test]
    fn family_tokens_refine_profile() {
        let phi = synthesize_model_profile("phi3:latest", &families());
        assert_eq!(phi.display_name, "Phi-3 Mini");
        assert_eq!(phi.context_limit, 128_000);

        let qwen = synthesize_model_profile("Qwen2:7b-instruct", &families());
        assert_eq!(qwen.display_name, "Qwen 2.5");
        assert_eq!(qwen.context_limit, 4096);
        assert_eq!(qwen.base_system_prompt, "You are Qwen, a helpful assistant.");
    }

    #[test]
    fn registry_order_does_not_matter() {
        let forward = vec![family("qwen", "Qwen"), family("qwen2.5", "Qwen 2.5")];
        let reversed: Vec<_> = forward.iter().cloned().rev().collect();

        let a = synthesize_model_profile("qwen2.5:0.5b", &forward);
        let b = synthesize_model_profile("qwen2.5:0.5b", &reversed);
        assert_eq!(a, b);
        assert_eq!(a.display_name, "Qwen 2.5");
    }

    #[tokio::test]
    async fn stored_profiles_win() {
        let store = InMemoryStore::new();
        store
            .put_user_profile(UserProfile {
                user_id: "demo_user".into(),
                display_name: "Jacob".into(),
                workspace: "Lab".into(),
                preferences: serde_json::Map::new(),
            })
            .await;
        let mut stored = ModelProfile::generic("phi3");
        stored.display_name = "Custom Phi".into();
        store.put_model_profile(stored).await;

        let resolver = ProfileResolver::new(Arc::new(store), "demo_user", families());
        let resolved = resolver.resolve("phi3", None).await;
        assert_eq!(resolved.user_profile.display_name, "Jacob");
        assert_eq!(resolved.model_profile.display_name, "Custom Phi");
    }

    #[tokio::test]
    async fn missing_user_is_guest_with_overrides() {
        let resolver = ProfileResolver::new(Arc::new(InMemoryStore::new()), "nobody", families());
        let overrides = json!({"workspace": "Scratch", "tone": "dry"});
        let resolved = resolver
            .resolve("foo-bar", overrides.as_object())
            .await;

        assert_eq!(resolved.user_profile.display_name, "Guest");
        assert_eq!(resolved.user_profile.workspace, "Scratch");
        assert_eq!(resolved.user_profile.preferences["tone"], "dry");
        assert_eq!(resolved.model_profile.display_name, "foo-bar");
    }

    struct BrokenProfiles;

    #[async_trait::async_trait]
    impl ProfileProvider for BrokenProfiles {
        async fn get_user_profile(&self, _: &str) -> Result<Option<UserProfile>, StoreError> {
            Err(StoreError::QueryFailed("disk I/O error".into()))
        }

        async fn get_model_profile(&self, _: &str) -> Result<Option<ModelProfile>, StoreError> {
            Err(StoreError::QueryFailed("disk I/O error".into()))
        }
    }

    #[tokio::test]
    async fn lookup_failures_fall_back() {
        let resolver = ProfileResolver::new(Arc::new(BrokenProfiles), "demo_user", families());
        let resolved = resolver.resolve("phi3", None).await;
        assert_eq!(resolved.user_profile, UserProfile::guest());
        assert_eq!(resolved.model_profile.display_name, "Phi-3 Mini");
    }
}
