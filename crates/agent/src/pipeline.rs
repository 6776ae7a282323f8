//! The per-turn pipeline.
//!
//! ```text
//! append user turn → retrieve → assemble → render → chat → append reply
//!                                                          │
//!                         sidecar fact extraction ◄────────┤
//!                         compaction (queued or inline) ◄──┘
//! ```
//!
//! Inference and retrieval failures propagate and fail the turn. Fact
//! extraction and compaction failures never reach the caller.

use crate::compaction::{CompactionEngine, CompactionOutcome, CompactionPolicy};
use crate::context::{AssemblyRequest, ContextSchema, MemoryTierAggregator, render};
use crate::profile::ProfileResolver;
use crate::retrieval::{Retrieval, Retriever};
use crate::scheduler::{BackoffPolicy, CompactionScheduler};
use crate::sidecar::{FactExtractor, NewMemory};
use localmind_config::{AppConfig, CompactionMode, SummarizerConfig};
use localmind_core::error::Result;
use localmind_core::memory::SemanticMemory;
use localmind_core::message::{ChatMessage, Role, Turn, TurnId};
use localmind_core::profile::ProfileProvider;
use localmind_core::provider::InferenceService;
use localmind_core::store::SessionStore;
use localmind_providers::select_summarizer;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One inbound user message.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub message: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub use_memory: bool,
    /// Model used for compaction and fact extraction; auto-selected if absent
    pub summarizer_model: Option<String>,
    pub identity_overrides: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TurnRequest {
    pub fn new(
        session_id: impl Into<String>,
        message: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            model: model.into(),
            system_prompt: None,
            use_memory: true,
            summarizer_model: None,
            identity_overrides: None,
        }
    }
}

/// How compaction was handled for a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CompactionReport {
    /// Queued on the background scheduler
    Scheduled { summarizer_model: String, queued: bool },
    /// Ran inside the request after the reply
    Inline {
        summarizer_model: String,
        outcome: CompactionOutcome,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub response: String,
    pub new_memory: Option<NewMemory>,
    pub prompt: String,
    pub compaction: CompactionReport,
}

/// The context a turn would be answered with, without running inference.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPreview {
    pub schema: ContextSchema,
    pub prompt: String,
}

pub struct TurnPipeline {
    store: Arc<dyn SessionStore>,
    inference: Arc<dyn InferenceService>,
    retriever: Retriever,
    aggregator: MemoryTierAggregator,
    extractor: Option<FactExtractor>,
    engine: Arc<CompactionEngine>,
    scheduler: Option<Arc<CompactionScheduler>>,
    summarizer: SummarizerConfig,
}

impl TurnPipeline {
    /// Wire every component from configuration.
    ///
    /// In background mode this spawns the compaction worker, so it must be
    /// called from within a tokio runtime.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn SessionStore>,
        profiles: Arc<dyn ProfileProvider>,
        memory: Arc<dyn SemanticMemory>,
        inference: Arc<dyn InferenceService>,
    ) -> Self {
        let resolver = Arc::new(ProfileResolver::new(
            profiles,
            config.user_id.clone(),
            config.model_families.clone(),
        ));
        let aggregator = MemoryTierAggregator::new(resolver, store.clone(), config.assistant_name.clone())
            .with_fallback_system_prompt(config.default_system_prompt.clone());
        let retriever = Retriever::new(inference.clone(), memory.clone(), &config.retrieval);
        let extractor = config.summarizer.extract_facts.then(|| {
            FactExtractor::new(
                inference.clone(),
                memory.clone(),
                config.retrieval.embedding_model.clone(),
            )
        });
        let engine = Arc::new(CompactionEngine::new(
            store.clone(),
            inference.clone(),
            CompactionPolicy::from(&config.compaction),
        ));
        let scheduler = match config.compaction.mode {
            CompactionMode::Background => Some(Arc::new(CompactionScheduler::start(
                engine.clone(),
                BackoffPolicy::from(&config.compaction),
            ))),
            CompactionMode::Inline => None,
        };

        Self {
            store,
            inference,
            retriever,
            aggregator,
            extractor,
            engine,
            scheduler,
            summarizer: config.summarizer.clone(),
        }
    }

    pub fn engine(&self) -> &Arc<CompactionEngine> {
        &self.engine
    }

    /// The background scheduler, absent in inline mode.
    pub fn scheduler(&self) -> Option<&Arc<CompactionScheduler>> {
        self.scheduler.as_ref()
    }

    /// Answer one user message.
    pub async fn handle(&self, request: TurnRequest) -> Result<TurnResponse> {
        let session_id = request.session_id.clone();
        let turn_id = self
            .store
            .append(&session_id, Role::User, &request.message, Some(&request.model))
            .await?;

        let schema = self.build_context(&request, Some(turn_id)).await?;
        let prompt = render(&schema);

        debug!(
            session_id = %session_id,
            model = %request.model,
            prompt_chars = prompt.len(),
            "Sending prompt"
        );
        let reply = self
            .inference
            .chat(&request.model, &[ChatMessage::user(prompt.clone())])
            .await?;

        self.store
            .append(&session_id, Role::Assistant, &reply, Some(&request.model))
            .await?;

        let summarizer_model = self.resolve_summarizer(request.summarizer_model.as_deref()).await;

        let new_memory = match &self.extractor {
            Some(extractor) => {
                extractor
                    .extract(&summarizer_model, &request.message, &reply)
                    .await
            }
            None => None,
        };

        let compaction = self.compact(&session_id, summarizer_model).await;

        info!(
            session_id = %session_id,
            model = %request.model,
            remembered = new_memory.is_some(),
            "Turn complete"
        );
        Ok(TurnResponse {
            response: reply,
            new_memory,
            prompt,
            compaction,
        })
    }

    /// Assemble and render the context for `request` without recording
    /// anything or calling the chat model.
    pub async fn preview(&self, request: &TurnRequest) -> Result<ContextPreview> {
        let schema = self.build_context(request, None).await?;
        let prompt = render(&schema);
        Ok(ContextPreview { schema, prompt })
    }

    async fn build_context(
        &self,
        request: &TurnRequest,
        current_turn: Option<TurnId>,
    ) -> Result<ContextSchema> {
        let Retrieval { hits, rag_context } = if request.use_memory {
            self.retriever.retrieve(&request.message).await?
        } else {
            Retrieval::default()
        };

        let active_window = self.active_window(&request.session_id, current_turn).await?;

        self.aggregator
            .assemble(AssemblyRequest {
                session_id: request.session_id.clone(),
                user_message: request.message.clone(),
                model_name: request.model.clone(),
                system_prompt_override: request.system_prompt.clone(),
                semantic_hits: hits,
                rag_context,
                active_window,
                identity_overrides: request.identity_overrides.clone(),
            })
            .await
    }

    /// Every unsummarized turn before the current one, oldest first.
    async fn active_window(&self, session_id: &str, current_turn: Option<TurnId>) -> Result<Vec<Turn>> {
        let count = self.store.count_unsummarized(session_id).await?;
        let mut turns = self.store.oldest_unsummarized(session_id, count).await?;
        if let Some(current) = current_turn {
            turns.retain(|turn| turn.id < current);
        }
        Ok(turns)
    }

    /// The caller's choice, else the first installed preferred summarizer.
    pub async fn resolve_summarizer(&self, requested: Option<&str>) -> String {
        if let Some(model) = requested.filter(|m| !m.trim().is_empty()) {
            return model.to_string();
        }
        match self.inference.list_models().await {
            Ok(installed) => {
                select_summarizer(&installed, &self.summarizer.preferred, &self.summarizer.fallback)
            }
            Err(e) => {
                warn!(error = %e, "Could not list models, using fallback summarizer");
                self.summarizer.fallback.clone()
            }
        }
    }

    async fn compact(&self, session_id: &str, summarizer_model: String) -> CompactionReport {
        match &self.scheduler {
            Some(scheduler) => {
                let queued = scheduler.schedule(session_id, &summarizer_model).await;
                CompactionReport::Scheduled {
                    summarizer_model,
                    queued,
                }
            }
            None => {
                let outcome = self
                    .engine
                    .check_and_compact(session_id, &summarizer_model)
                    .await;
                CompactionReport::Inline {
                    summarizer_model,
                    outcome,
                }
            }
        }
    }

    /// Stop the background worker, if any.
    pub async fn shutdown(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown().await;
        }
    }
}
