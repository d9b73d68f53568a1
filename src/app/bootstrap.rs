use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::backend::{Analyzer, BackendClient, OllamaClient};
use crate::config::{resolve_runtime_config, BackendEndpoint, LocalConfig, RuntimeConfig};
use crate::error::AppResult;

const LOCAL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) struct AppBootstrap {
    pub(super) config: RuntimeConfig,
    pub(super) backend: Arc<BackendClient>,
}

impl AppBootstrap {
    /// Endpoint to probe at startup, if the Local backend is active and probing is on.
    pub(super) fn local_probe_target(&self) -> Option<LocalConfig> {
        if !self.config.probe_local_backend {
            return None;
        }
        match &self.config.backend.endpoint {
            BackendEndpoint::Local(local) => Some(local.clone()),
            BackendEndpoint::Cloud(_) => None,
        }
    }
}

pub(super) fn bootstrap_app_runtime() -> AppResult<AppBootstrap> {
    let config = resolve_runtime_config()?;
    tracing::info!(
        backend = config.backend.variant().display_name(),
        model = config.backend.model(),
        hotkey = %config.hotkey,
        error_dismiss_secs = config.error_dismiss_after.map(|delay| delay.as_secs()),
        "resolved runtime config"
    );

    let backend = BackendClient::from_config(&config.backend)?;
    debug_assert_eq!(backend.variant(), config.backend.variant());

    Ok(AppBootstrap {
        config,
        backend: Arc::new(backend),
    })
}

/// Checks that the Local server answers and has the configured model pulled.
pub(super) fn probe_local_backend(target: LocalConfig) -> anyhow::Result<()> {
    let client = OllamaClient::new(target, LOCAL_PROBE_TIMEOUT)
        .context("failed to build probe client")?;
    let present = client.has_model(client.model()).with_context(|| {
        format!(
            "local vision server at {} is not reachable; is `ollama serve` running?",
            client.base_url()
        )
    })?;
    if !present {
        bail!(
            "model '{model}' is not available on {url}; run `ollama pull {model}`",
            model = client.model(),
            url = client.base_url()
        );
    }
    tracing::info!(model = client.model(), "local backend probe succeeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::stub::{serve_once, unreachable_url, StubResponse};

    fn target(base_url: &str, model: &str) -> LocalConfig {
        LocalConfig {
            base_url: base_url.to_string(),
            model: model.to_string(),
        }
    }

    #[test]
    fn probe_accepts_pulled_model() {
        let (url, _server) = serve_once(StubResponse::json(
            200,
            r#"{"models":[{"name":"qwen3-vl:8b"}]}"#,
        ));

        probe_local_backend(target(&url, "qwen3-vl:8b")).expect("model is present");
    }

    #[test]
    fn probe_reports_missing_model() {
        let (url, _server) = serve_once(StubResponse::json(
            200,
            r#"{"models":[{"name":"llava:latest"}]}"#,
        ));

        let err = probe_local_backend(target(&url, "qwen3-vl:8b")).expect_err("model missing");
        let message = format!("{err:#}");
        assert!(message.contains("ollama pull qwen3-vl:8b"));
    }

    #[test]
    fn probe_reports_unreachable_server() {
        let err = probe_local_backend(target(&unreachable_url(), "qwen3-vl:8b"))
            .expect_err("server is down");
        let message = format!("{err:#}");
        assert!(message.contains("not reachable"));
        assert!(message.contains("network error"));
    }
}
