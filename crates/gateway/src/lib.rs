//! HTTP API gateway for LocalMind.
//!
//! Exposes the turn pipeline, model catalog, semantic memory management,
//! session history and compaction status over REST.
//!
//! Built on Axum for high performance async HTTP.

pub mod handlers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use localmind_agent::TurnPipeline;
use localmind_config::AppConfig;
use localmind_core::memory::SemanticMemory;
use localmind_core::provider::InferenceService;
use localmind_core::store::SessionStore;
use localmind_memory::{SqliteStore, SqliteVectorStore};
use localmind_providers::{ModelBootstrap, OllamaClient};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Arc<TurnPipeline>,
    pub store: Arc<dyn SessionStore>,
    pub memory: Arc<dyn SemanticMemory>,
    pub inference: Arc<dyn InferenceService>,
}

pub type SharedState = Arc<AppState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Permissive CORS (the UI runs on a different local port)
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/context/preview", post(handlers::context_preview))
        .route("/context/render", post(handlers::render_schema))
        .route("/models", get(handlers::list_models))
        .route("/summarizers", get(handlers::summarizers))
        .route("/memories", get(handlers::list_memories))
        .route(
            "/memories/{id}",
            put(handlers::update_memory).delete(handlers::delete_memory),
        )
        .route("/history", get(handlers::history))
        .route("/sessions/{id}/summary", get(handlers::session_summary))
        .route("/sessions/{id}/compaction", get(handlers::compaction_status))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Opens both databases, runs the model bootstrap once, then serves until
/// Ctrl-C. Pending background compactions are stopped on the way out.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = Arc::new(SqliteStore::open(&config.database_path()).await?);
    let memory: Arc<dyn SemanticMemory> =
        Arc::new(SqliteVectorStore::open(&config.vector_store_path()).await?);
    let inference: Arc<dyn InferenceService> = Arc::new(OllamaClient::from_config(&config.ollama)?);

    let bootstrap = ModelBootstrap::from_config(&config.bootstrap);
    let report = bootstrap.ensure(inference.as_ref()).await;
    if !report.is_complete() {
        warn!(
            missing = ?report.missing,
            failed = report.failed.len(),
            "Some required models are unavailable; affected requests will fail"
        );
    }

    let pipeline = Arc::new(TurnPipeline::from_config(
        &config,
        store.clone(),
        store.clone(),
        memory.clone(),
        inference.clone(),
    ));

    let state = Arc::new(AppState {
        config,
        pipeline: pipeline.clone(),
        store,
        memory,
        inference,
    });
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
            }
        })
        .await?;

    pipeline.shutdown().await;
    info!("Gateway stopped");
    Ok(())
}
