pub mod chat;
pub mod compact;
pub mod models;
pub mod reset;
pub mod serve;
pub mod summarizers;
pub mod summary;

use localmind_agent::TurnPipeline;
use localmind_config::AppConfig;
use localmind_memory::{SqliteStore, SqliteVectorStore};
use localmind_providers::OllamaClient;
use std::sync::Arc;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The persistent collaborators every command works against.
pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub memory: Arc<SqliteVectorStore>,
    pub inference: Arc<OllamaClient>,
}

impl Runtime {
    pub async fn open(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(SqliteStore::open(&config.database_path()).await?);
        let memory = Arc::new(SqliteVectorStore::open(&config.vector_store_path()).await?);
        let inference = Arc::new(OllamaClient::from_config(&config.ollama)?);
        Ok(Self {
            config,
            store,
            memory,
            inference,
        })
    }

    /// Offline commands only need the model service client.
    pub fn inference_only(config: &AppConfig) -> Result<OllamaClient, Box<dyn std::error::Error>> {
        Ok(OllamaClient::from_config(&config.ollama)?)
    }

    pub fn pipeline(&self) -> TurnPipeline {
        TurnPipeline::from_config(
            &self.config,
            self.store.clone(),
            self.store.clone(),
            self.memory.clone(),
            self.inference.clone(),
        )
    }
}
