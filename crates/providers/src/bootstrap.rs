//! Explicit startup check that the required models are installed.
//!
//! The service entry point calls [`ModelBootstrap::ensure`] once before it
//! starts serving. Repeated calls reuse the first report, and no failure here
//! is fatal: a missing model surfaces later as an inference error.

use localmind_config::BootstrapConfig;
use localmind_core::provider::InferenceService;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// What the bootstrap found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Already installed
    pub ready: Vec<String>,
    /// Installed by this run
    pub pulled: Vec<String>,
    /// Absent and not pulled (auto-pull disabled)
    pub missing: Vec<String>,
    /// `(model, error)` for pulls that failed
    pub failed: Vec<(String, String)>,
    /// Set when the installed-model listing itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
}

impl BootstrapReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty() && self.listing_error.is_none()
    }
}

pub struct ModelBootstrap {
    required: Vec<String>,
    auto_pull: bool,
    report: OnceCell<BootstrapReport>,
}

impl ModelBootstrap {
    pub fn new(required: Vec<String>, auto_pull: bool) -> Self {
        Self {
            required,
            auto_pull,
            report: OnceCell::new(),
        }
    }

    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self::new(config.required_models.clone(), config.auto_pull)
    }

    /// Check (and, if enabled, pull) every required model. Runs at most once.
    pub async fn ensure(&self, service: &dyn InferenceService) -> &BootstrapReport {
        self.report
            .get_or_init(|| async { self.run(service).await })
            .await
    }

    /// The report of a completed `ensure`, if any.
    pub fn report(&self) -> Option<&BootstrapReport> {
        self.report.get()
    }

    async fn run(&self, service: &dyn InferenceService) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        let installed = match service.list_models().await {
            Ok(installed) => installed,
            Err(e) => {
                warn!(error = %e, "Could not check installed models");
                report.listing_error = Some(e.to_string());
                return report;
            }
        };

        for model in &self.required {
            // `mxbai-embed-large` is satisfied by `mxbai-embed-large:latest`.
            if installed.iter().any(|name| name.contains(model.as_str())) {
                info!(model = %model, "Model is ready");
                report.ready.push(model.clone());
                continue;
            }

            if !self.auto_pull {
                warn!(model = %model, "Model missing and auto-pull disabled");
                report.missing.push(model.clone());
                continue;
            }

            info!(model = %model, "Model missing, pulling now");
            match service.pull_model(model).await {
                Ok(()) => report.pulled.push(model.clone()),
                Err(e) => {
                    warn!(model = %model, error = %e, "Model pull failed");
                    report.failed.push((model.clone(), e.to_string()));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use localmind_core::error::ProviderError;
    use localmind_core::message::ChatMessage;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDaemon {
        installed: Vec<String>,
        listing_fails: bool,
        unpullable: Vec<String>,
        list_calls: AtomicUsize,
        pulled: Mutex<Vec<String>>,
    }

    impl FakeDaemon {
        fn new(installed: &[&str]) -> Self {
            Self {
                installed: installed.iter().map(|s| s.to_string()).collect(),
                listing_fails: false,
                unpullable: Vec::new(),
                list_calls: AtomicUsize::new(0),
                pulled: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InferenceService for FakeDaemon {
        fn name(&self) -> &str {
            "fake"
        }

        async fn chat(&self, _: &str, _: &[ChatMessage]) -> Result<String, ProviderError> {
            Ok(String::new())
        }

        async fn embed(&self, _: &str, _: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![])
        }

        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.listing_fails {
                return Err(ProviderError::Network("connection refused".into()));
            }
            Ok(self.installed.clone())
        }

        async fn pull_model(&self, model: &str) -> Result<(), ProviderError> {
            if self.unpullable.iter().any(|m| m == model) {
                return Err(ProviderError::ModelNotFound(model.into()));
            }
            self.pulled.lock().unwrap().push(model.to_string());
            Ok(())
        }
    }

    fn required() -> Vec<String> {
        vec!["mxbai-embed-large".into(), "qwen2:7b-instruct".into()]
    }

    #[tokio::test]
    async fn pulls_only_missing_models() {
        let daemon = FakeDaemon::new(&["mxbai-embed-large:latest"]);
        let bootstrap = ModelBootstrap::new(required(), true);

        let report = bootstrap.ensure(&daemon).await;
        assert_eq!(report.ready, vec!["mxbai-embed-large"]);
        assert_eq!(report.pulled, vec!["qwen2:7b-instruct"]);
        assert!(report.is_complete());
        assert_eq!(*daemon.pulled.lock().unwrap(), vec!["qwen2:7b-instruct"]);
    }

    #[tokio::test]
    async fn runs_only_once() {
        let daemon = FakeDaemon::new(&[]);
        let bootstrap = ModelBootstrap::new(required(), true);

        bootstrap.ensure(&daemon).await;
        bootstrap.ensure(&daemon).await;
        assert_eq!(daemon.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(daemon.pulled.lock().unwrap().len(), 2);
        assert!(bootstrap.report().is_some());
    }

    #[tokio::test]
    async fn failures_are_reported_not_fatal() {
        let mut daemon = FakeDaemon::new(&[]);
        daemon.unpullable = vec!["qwen2:7b-instruct".into()];
        let bootstrap = ModelBootstrap::new(required(), true);

        let report = bootstrap.ensure(&daemon).await;
        assert_eq!(report.pulled, vec!["mxbai-embed-large"]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn listing_failure_skips_pulls() {
        let mut daemon = FakeDaemon::new(&[]);
        daemon.listing_fails = true;
        let bootstrap = ModelBootstrap::new(required(), true);

        let report = bootstrap.ensure(&daemon).await;
        assert!(report.listing_error.is_some());
        assert!(daemon.pulled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auto_pull_disabled_reports_missing() {
        let daemon = FakeDaemon::new(&[]);
        let bootstrap = ModelBootstrap::new(required(), false);

        let report = bootstrap.ensure(&daemon).await;
        assert_eq!(report.missing.len(), 2);
        assert!(daemon.pulled.lock().unwrap().is_empty());
    }
}
