//! Configuration loading, validation, and management for LocalMind.
//!
//! Loads configuration from `~/.localmind/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.localmind/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// System prompt used when neither the request nor the model profile has one
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    /// User whose profile is loaded for every turn
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Name the assistant goes by in the identity block
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// Directory holding the transcript database and the vector store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Ollama connection settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Deep-past compaction settings
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Semantic retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Summarizer model selection and fact extraction
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Startup model availability checks
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Known model families and the profile adjustments they imply
    #[serde(default = "default_model_families")]
    pub model_families: Vec<ModelFamilyConfig>,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_model() -> String {
    "qwen2:7b-instruct".into()
}
fn default_system_prompt() -> String {
    "You are a helpful assistant.".into()
}
fn default_user_id() -> String {
    "demo_user".into()
}
fn default_assistant_name() -> String {
    "LocalMIND Agent".into()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where compaction runs relative to the request path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionMode {
    /// Queue on the background scheduler and return immediately (default)
    #[default]
    Background,
    /// Run inside the request after the reply is produced
    Inline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Unsummarized turns tolerated before compaction kicks in
    #[serde(default = "default_active_window_size")]
    pub active_window_size: usize,

    /// Turns folded into one chapter per compaction
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub mode: CompactionMode,

    /// First retry delay after a failed background compaction
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,

    /// Upper bound for the retry delay
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

fn default_active_window_size() -> usize {
    10
}
fn default_chunk_size() -> usize {
    5
}
fn default_initial_backoff_secs() -> u64 {
    5
}
fn default_max_backoff_secs() -> u64 {
    300
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            active_window_size: default_active_window_size(),
            chunk_size: default_chunk_size(),
            mode: CompactionMode::default(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub use_memory: bool,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Ceiling applied to the aggregated RAG text
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_top_k() -> usize {
    5
}
fn default_max_context_chars() -> usize {
    12_000
}
fn default_embedding_model() -> String {
    "mxbai-embed-large".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            use_memory: true,
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Trusted summarizers, smallest to largest
    #[serde(default = "default_preferred_summarizers")]
    pub preferred: Vec<String>,

    /// Used when none of the preferred models is installed
    #[serde(default = "default_summarizer_fallback")]
    pub fallback: String,

    /// Extract long-term facts from every exchange
    #[serde(default = "default_true")]
    pub extract_facts: bool,
}

fn default_preferred_summarizers() -> Vec<String> {
    vec![
        "qwen2.5:0.5b-instruct".into(),
        "qwen2.5:0.5b".into(),
        "llama3.2:1b".into(),
        "qwen2:0.5b".into(),
        "phi3".into(),
    ]
}
fn default_summarizer_fallback() -> String {
    "qwen2.5:0.5b-instruct".into()
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            preferred: default_preferred_summarizers(),
            fallback: default_summarizer_fallback(),
            extract_facts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_required_models")]
    pub required_models: Vec<String>,

    /// Pull missing models at startup
    #[serde(default = "default_true")]
    pub auto_pull: bool,
}

fn default_required_models() -> Vec<String> {
    vec![
        "mxbai-embed-large".into(),
        "qwen2.5:0.5b-instruct".into(),
        "qwen2:7b-instruct".into(),
    ]
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            required_models: default_required_models(),
            auto_pull: true,
        }
    }
}

/// Profile adjustments for every model whose name contains `token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFamilyConfig {
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_system_prompt: Option<String>,
}

fn default_model_families() -> Vec<ModelFamilyConfig> {
    vec![
        ModelFamilyConfig {
            token: "phi3".into(),
            display_name: Some("Phi-3 Mini".into()),
            context_limit: Some(128_000),
            base_system_prompt: None,
        },
        ModelFamilyConfig {
            token: "qwen".into(),
            display_name: Some("Qwen 2.5".into()),
            context_limit: None,
            base_system_prompt: Some("You are Qwen, a helpful assistant.".into()),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.localmind/config.toml).
    ///
    /// Environment variable overrides (highest priority):
    /// - `LOCALMIND_MODEL`
    /// - `LOCALMIND_OLLAMA_URL`
    /// - `LOCALMIND_DATA_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(model) = std::env::var("LOCALMIND_MODEL") {
            config.default_model = model;
        }
        if let Ok(url) = std::env::var("LOCALMIND_OLLAMA_URL") {
            config.ollama.base_url = url;
        }
        if let Ok(dir) = std::env::var("LOCALMIND_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".localmind")
    }

    /// Directory holding persistent state.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Self::config_dir)
    }

    /// The transcript / ledger / profile database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("localmind.db")
    }

    /// The semantic memory vector store.
    pub fn vector_store_path(&self) -> PathBuf {
        self.data_dir().join("vectors.db")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.compaction.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "compaction.chunk_size must be at least 1".into(),
            ));
        }

        if self.compaction.active_window_size == 0 {
            return Err(ConfigError::ValidationError(
                "compaction.active_window_size must be at least 1".into(),
            ));
        }

        if self.compaction.initial_backoff_secs > self.compaction.max_backoff_secs {
            return Err(ConfigError::ValidationError(
                "compaction.initial_backoff_secs must not exceed max_backoff_secs".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        let mut tokens: Vec<&str> = self
            .model_families
            .iter()
            .map(|f| f.token.as_str())
            .collect();
        if tokens.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "model_families tokens must not be empty".into(),
            ));
        }
        tokens.sort_unstable();
        if let Some(dup) = tokens.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::ValidationError(format!(
                "model_families token '{}' is declared twice",
                dup[0]
            )));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_system_prompt: default_system_prompt(),
            user_id: default_user_id(),
            assistant_name: default_assistant_name(),
            data_dir: None,
            ollama: OllamaConfig::default(),
            compaction: CompactionConfig::default(),
            retrieval: RetrievalConfig::default(),
            summarizer: SummarizerConfig::default(),
            bootstrap: BootstrapConfig::default(),
            model_families: default_model_families(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compaction.active_window_size, 10);
        assert_eq!(config.compaction.chunk_size, 5);
        assert_eq!(config.retrieval.max_context_chars, 12_000);
        assert_eq!(config.compaction.mode, CompactionMode::Background);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.model_families, config.model_families);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut config = AppConfig::default();
        config.compaction.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_family_token_rejected() {
        let mut config = AppConfig::default();
        config.model_families.push(ModelFamilyConfig {
            token: "qwen".into(),
            display_name: None,
            context_limit: Some(32_768),
            base_system_prompt: None,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("qwen"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.default_model, "qwen2:7b-instruct");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "llama3.2:1b"

[compaction]
chunk_size = 3
mode = "inline"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "llama3.2:1b");
        assert_eq!(config.compaction.chunk_size, 3);
        assert_eq!(config.compaction.active_window_size, 10);
        assert_eq!(config.compaction.mode, CompactionMode::Inline);
        assert_eq!(config.model_families.len(), 2);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn data_paths_follow_data_dir() {
        let config = AppConfig {
            data_dir: Some(PathBuf::from("/var/lib/localmind")),
            ..AppConfig::default()
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/localmind/localmind.db")
        );
        assert_eq!(
            config.vector_store_path(),
            PathBuf::from("/var/lib/localmind/vectors.db")
        );
    }
}
