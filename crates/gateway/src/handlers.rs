//! Route handlers and wire types.

use crate::SharedState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use localmind_agent::{
    CompactionReport, CompactionStatus, ContextPreview, NewMemory, TurnRequest, render_value,
};
use localmind_config::CompactionMode;
use localmind_core::error::{Error, MemoryError, ProviderError, StoreError};
use localmind_core::message::DEFAULT_SESSION;
use localmind_providers::{SummarizerStatus, summarizer_status};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

const DEFAULT_HISTORY_LIMIT: usize = 20;

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub use_memory: Option<bool>,
    #[serde(default)]
    pub summarizer_model: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub identity_overrides: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub new_memory: Option<NewMemory>,
    pub compaction: CompactionReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenderResponse {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelDto {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub models: Vec<ModelDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryDto {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryListResponse {
    pub memories: Vec<MemoryDto>,
}

#[derive(Debug, Deserialize)]
pub struct MemoryListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MemoryUpdateBody {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub session_id: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct CompactionStatusResponse {
    pub session_id: String,
    pub mode: CompactionMode,
    pub status: CompactionStatus,
}

// ── Error mapping ─────────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a domain error onto an HTTP status.
fn api_error(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        Error::Provider(ProviderError::ModelNotFound(_)) => StatusCode::NOT_FOUND,
        Error::Provider(_) => StatusCode::BAD_GATEWAY,
        Error::Memory(MemoryError::NotFound(_)) | Error::Store(StoreError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        Error::Memory(MemoryError::DimensionMismatch { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Render(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "Request failed");
    }
    error_response(status, err.to_string())
}

fn require_text(field: &str, value: &str) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if value.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("`{field}` must not be empty"),
        ));
    }
    Ok(())
}

fn turn_request(state: &SharedState, body: ChatBody) -> TurnRequest {
    let model = body
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.default_model.clone());
    let session_id = body
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());

    let mut request = TurnRequest::new(session_id, body.message, model);
    request.system_prompt = body.system_prompt;
    request.use_memory = body.use_memory.unwrap_or(state.config.retrieval.use_memory);
    request.summarizer_model = body.summarizer_model;
    request.identity_overrides = body.identity_overrides;
    request
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

pub async fn chat(State(state): State<SharedState>, Json(body): Json<ChatBody>) -> ApiResult<ChatResponse> {
    require_text("message", &body.message)?;
    let request = turn_request(&state, body);
    info!(session_id = %request.session_id, model = %request.model, "chat request");

    let turn = state.pipeline.handle(request).await.map_err(api_error)?;
    Ok(Json(ChatResponse {
        response: turn.response,
        new_memory: turn.new_memory,
        compaction: turn.compaction,
    }))
}

pub async fn context_preview(
    State(state): State<SharedState>,
    Json(body): Json<ChatBody>,
) -> ApiResult<ContextPreview> {
    let request = turn_request(&state, body);
    let preview = state.pipeline.preview(&request).await.map_err(api_error)?;
    Ok(Json(preview))
}

/// Render a client-supplied context schema to the prompt string.
pub async fn render_schema(Json(schema): Json<serde_json::Value>) -> ApiResult<RenderResponse> {
    let prompt = render_value(&schema).map_err(|e| api_error(e.into()))?;
    Ok(Json(RenderResponse { prompt }))
}

pub async fn list_models(State(state): State<SharedState>) -> ApiResult<ModelListResponse> {
    let installed = state
        .inference
        .list_models()
        .await
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(ModelListResponse {
        models: installed.into_iter().map(|name| ModelDto { name }).collect(),
    }))
}

/// Preferred summarizers split into installed and missing. Degrades to two
/// empty lists when the inference service cannot be reached.
pub async fn summarizers(State(state): State<SharedState>) -> Json<SummarizerStatus> {
    match state.inference.list_models().await {
        Ok(installed) => Json(summarizer_status(&installed, &state.config.summarizer.preferred)),
        Err(e) => {
            warn!(error = %e, "Could not list models for summarizer status");
            Json(SummarizerStatus::default())
        }
    }
}

pub async fn list_memories(
    State(state): State<SharedState>,
    Query(query): Query<MemoryListQuery>,
) -> Json<MemoryListResponse> {
    let memories = match state.memory.list(query.limit).await {
        Ok(items) => items
            .into_iter()
            .map(|item| MemoryDto {
                id: item.id,
                content: item.content,
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "Could not list memories");
            Vec::new()
        }
    };
    Json(MemoryListResponse { memories })
}

/// Replace a memory's text and re-embed it.
pub async fn update_memory(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<MemoryUpdateBody>,
) -> ApiResult<StatusResponse> {
    require_text("content", &body.content)?;

    let vector = state
        .inference
        .embed(&state.config.retrieval.embedding_model, &body.content)
        .await
        .map_err(|e| api_error(e.into()))?;
    state
        .memory
        .update(&id, &body.content, Some(vector))
        .await
        .map_err(|e| api_error(e.into()))?;

    info!(memory_id = %id, "Memory updated");
    Ok(Json(StatusResponse {
        status: "success".into(),
    }))
}

pub async fn delete_memory(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<StatusResponse> {
    let removed = state
        .memory
        .delete(std::slice::from_ref(&id))
        .await
        .map_err(|e| api_error(e.into()))?;
    if removed == 0 {
        return Err(api_error(MemoryError::NotFound(id).into()));
    }

    info!(memory_id = %id, "Memory deleted");
    Ok(Json(StatusResponse {
        status: "success".into(),
    }))
}

/// The most recent turns of a session, oldest first.
pub async fn history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let session_id = query.session_id.unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    let turns = state
        .store
        .recent(&session_id, limit)
        .await
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(HistoryResponse {
        history: turns
            .into_iter()
            .map(|turn| HistoryEntry {
                role: turn.role.as_str().to_string(),
                content: turn.content,
            })
            .collect(),
    }))
}

pub async fn session_summary(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> ApiResult<SummaryResponse> {
    let summary = state
        .pipeline
        .engine()
        .get_session_summary(&session_id)
        .await
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(SummaryResponse { session_id, summary }))
}

pub async fn compaction_status(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Json<CompactionStatusResponse> {
    let status = match state.pipeline.scheduler() {
        Some(scheduler) => scheduler.status(&session_id).await,
        None => CompactionStatus::Idle,
    };
    Json(CompactionStatusResponse {
        session_id,
        mode: state.config.compaction.mode,
        status,
    })
}
