//! Ollama HTTP client.
//!
//! Talks to a local Ollama daemon:
//! - `POST /api/chat` (non-streaming chat completion)
//! - `POST /api/embeddings`
//! - `GET /api/tags` (installed models)
//! - `POST /api/pull`

use crate::catalog::normalize_model_listing;
use async_trait::async_trait;
use localmind_config::OllamaConfig;
use localmind_core::error::ProviderError;
use localmind_core::message::ChatMessage;
use localmind_core::provider::InferenceService;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// An [`InferenceService`] backed by Ollama.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self, ProviderError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }

    /// Turn a non-2xx response into a `ProviderError`.
    async fn check_status(
        response: reqwest::Response,
        model: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        warn!(status, model, error = %message, "Ollama returned error");

        if status == 404 {
            return Err(ProviderError::ModelNotFound(format!("{model}: {message}")));
        }
        Err(ProviderError::ApiError {
            status_code: status,
            message,
        })
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        model: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::check_status(response, model).await
    }
}

#[async_trait]
impl InferenceService for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        debug!(provider = "ollama", model, messages = messages.len(), "Sending chat request");

        let body = ApiChatRequest {
            model,
            messages,
            stream: false,
        };
        let response = self.post("/api/chat", model, &body).await?;
        let parsed: ApiChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("chat response: {e}")))?;

        Ok(parsed.message.content)
    }

    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        debug!(provider = "ollama", model, chars = text.len(), "Sending embedding request");

        let body = ApiEmbeddingRequest {
            model,
            prompt: text,
        };
        let response = self.post("/api/embeddings", model, &body).await?;
        let parsed: ApiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("embedding response: {e}")))?;

        if parsed.embedding.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "{model} returned an empty embedding"
            )));
        }
        Ok(parsed.embedding)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        let response = Self::check_status(response, "").await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("tags response: {e}")))?;
        Ok(normalize_model_listing(&body))
    }

    async fn pull_model(&self, model: &str) -> Result<(), ProviderError> {
        info!(model, "Pulling model (this may take a while)");
        let body = ApiPullRequest {
            model,
            stream: false,
        };
        let response = self.post("/api/pull", model, &body).await?;
        let parsed: ApiPullResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("pull response: {e}")))?;

        if parsed.status != "success" {
            return Err(ProviderError::InvalidResponse(format!(
                "pull of {model} ended with status '{}'",
                parsed.status
            )));
        }
        info!(model, "Model installed");
        Ok(())
    }
}

// --- Ollama API types (private) ---

#[derive(Serialize)]
struct ApiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ApiChatResponse {
    message: ApiChatMessage,
}

#[derive(Deserialize)]
struct ApiChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct ApiEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct ApiEmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ApiPullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct ApiPullResponse {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Json;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::{json, Value};

    /// Serve a fake Ollama on an ephemeral port and return its base URL.
    async fn fake_ollama() -> String {
        let app = Router::new()
            .route(
                "/api/chat",
                post(|Json(body): Json<Value>| async move {
                    if body["model"] == "missing" {
                        return (
                            StatusCode::NOT_FOUND,
                            Json(json!({"error": "model 'missing' not found"})),
                        );
                    }
                    let last = body["messages"][0]["content"].as_str().unwrap_or("").to_string();
                    (
                        StatusCode::OK,
                        Json(json!({
                            "model": body["model"],
                            "message": {"role": "assistant", "content": format!("echo: {last}")},
                            "done": true
                        })),
                    )
                }),
            )
            .route(
                "/api/embeddings",
                post(|Json(_): Json<Value>| async { Json(json!({"embedding": [0.25, 0.5, 0.75]})) }),
            )
            .route(
                "/api/tags",
                get(|| async {
                    Json(json!({"models": [
                        {"name": "qwen2:7b-instruct", "size": 1},
                        {"model": "mxbai-embed-large:latest"}
                    ]}))
                }),
            )
            .route(
                "/api/pull",
                post(|Json(body): Json<Value>| async move {
                    if body["stream"] != false {
                        return (StatusCode::BAD_REQUEST, Json(json!({"error": "stream"})));
                    }
                    (StatusCode::OK, Json(json!({"status": "success"})))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(url: &str) -> OllamaClient {
        OllamaClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trailing_slash_trimmed() {
        let c = client("http://localhost:11434/");
        assert_eq!(c.base_url(), "http://localhost:11434");
        assert_eq!(c.name(), "ollama");
    }

    #[test]
    fn chat_request_shape() {
        let messages = vec![ChatMessage::user("hi")];
        let body = ApiChatRequest {
            model: "qwen2:7b-instruct",
            messages: &messages,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], false);
    }

    #[tokio::test]
    async fn chat_round_trip() {
        let url = fake_ollama().await;
        let reply = client(&url)
            .chat("qwen2:7b-instruct", &[ChatMessage::user("ping")])
            .await
            .unwrap();
        assert_eq!(reply, "echo: ping");
    }

    #[tokio::test]
    async fn unknown_model_maps_to_model_not_found() {
        let url = fake_ollama().await;
        let err = client(&url)
            .chat("missing", &[ChatMessage::user("ping")])
            .await
            .unwrap_err();
        match err {
            ProviderError::ModelNotFound(msg) => assert!(msg.contains("not found")),
            other => panic!("expected ModelNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn embed_and_list_and_pull() {
        let url = fake_ollama().await;
        let c = client(&url);

        assert_eq!(c.embed("mxbai-embed-large", "x").await.unwrap(), vec![0.25, 0.5, 0.75]);
        assert_eq!(
            c.list_models().await.unwrap(),
            vec!["qwen2:7b-instruct", "mxbai-embed-large:latest"]
        );
        c.pull_model("phi3").await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_daemon_is_network_error() {
        // Nothing listens on port 9 locally.
        let err = client("http://127.0.0.1:9")
            .embed("mxbai-embed-large", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_) | ProviderError::Timeout(_)));
    }
}
