//! Inference collaborators for LocalMind.
//!
//! [`OllamaClient`] implements `localmind_core::InferenceService` over the
//! Ollama HTTP API. The catalog helpers turn raw model listings into plain
//! names and pick a summarizer; [`ModelBootstrap`] is the explicit startup
//! step that makes sure required models are installed.

pub mod bootstrap;
pub mod catalog;
pub mod ollama;

pub use bootstrap::{BootstrapReport, ModelBootstrap};
pub use catalog::{SummarizerStatus, normalize_model_listing, select_summarizer, summarizer_status};
pub use ollama::OllamaClient;
