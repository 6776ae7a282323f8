//! User and model profiles: read-only configuration records.
//!
//! Both lookups are allowed to miss. A missing user falls back to
//! [`UserProfile::guest`]; a missing model is synthesized by the profile
//! resolver. A miss is never an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Template id used for every model profile.
pub const STANDARD_CHAT_TEMPLATE: &str = "standard_chat";

/// Context window assumed for models nobody configured.
pub const DEFAULT_CONTEXT_LIMIT: u32 = 4096;

/// Base system prompt for synthesized model profiles.
pub const DEFAULT_MODEL_SYSTEM_PROMPT: &str = "You are a helpful local assistant.";

/// A user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub workspace: String,
    #[serde(default)]
    pub preferences: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Profile used when the requested user does not exist.
    pub fn guest() -> Self {
        Self {
            user_id: "guest".into(),
            display_name: "Guest".into(),
            workspace: "Guest Workspace".into(),
            preferences: serde_json::Map::new(),
        }
    }

    /// Merge override keys into this profile; overrides win key-by-key.
    ///
    /// Keys that match a profile field replace it (string values only);
    /// any other key lands in `preferences`.
    pub fn apply_overrides(&mut self, overrides: &serde_json::Map<String, serde_json::Value>) {
        for (key, value) in overrides {
            let text = value.as_str().map(str::to_string);
            match (key.as_str(), text) {
                ("user_id", Some(v)) => self.user_id = v,
                ("display_name", Some(v)) => self.display_name = v,
                ("workspace", Some(v)) => self.workspace = v,
                ("preferences", _) => {
                    if let Some(prefs) = value.as_object() {
                        for (k, v) in prefs {
                            self.preferences.insert(k.clone(), v.clone());
                        }
                    }
                }
                _ => {
                    self.preferences.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// A model profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub model_id: String,
    pub display_name: String,
    pub context_limit: u32,
    pub base_system_prompt: String,
    pub prompt_template: String,
}

impl ModelProfile {
    /// The generic profile synthesized for an unknown model.
    pub fn generic(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            display_name: model_id.to_string(),
            context_limit: DEFAULT_CONTEXT_LIMIT,
            base_system_prompt: DEFAULT_MODEL_SYSTEM_PROMPT.into(),
            prompt_template: STANDARD_CHAT_TEMPLATE.into(),
        }
    }
}

/// Raw profile lookups. Implementations return `None` on a miss.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn get_model_profile(&self, model_id: &str) -> Result<Option<ModelProfile>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guest_profile_defaults() {
        let guest = UserProfile::guest();
        assert_eq!(guest.display_name, "Guest");
        assert!(guest.preferences.is_empty());
    }

    #[test]
    fn overrides_win_key_by_key() {
        let mut profile = UserProfile::guest();
        let overrides = json!({
            "display_name": "Ada",
            "theme": "dark",
            "preferences": {"detail_level": "low"}
        });
        profile.apply_overrides(overrides.as_object().unwrap());

        assert_eq!(profile.display_name, "Ada");
        assert_eq!(profile.workspace, "Guest Workspace");
        assert_eq!(profile.preferences["theme"], "dark");
        assert_eq!(profile.preferences["detail_level"], "low");
    }

    #[test]
    fn generic_model_profile() {
        let profile = ModelProfile::generic("foo-bar");
        assert_eq!(profile.display_name, "foo-bar");
        assert_eq!(profile.context_limit, 4096);
        assert_eq!(profile.prompt_template, "standard_chat");
    }
}
