//! Vision backends.
//!
//! Exactly two exist: the Gemini cloud API and a local Ollama server. Which one
//! runs is decided once from [`BackendConfig`] and never changes for the life of
//! the process, so the client is a closed enum rather than a boxed trait object.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use thiserror::Error;

use crate::capture::CapturedImage;
use crate::config::{BackendConfig, BackendEndpoint, BackendVariant};

mod gemini;
mod ollama;
#[cfg(test)]
pub(crate) mod stub;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    Network,
    Remote,
    ModelNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("network error: {message}")]
    Network { message: String },
    #[error("{backend} returned an error: {message}")]
    Remote {
        backend: &'static str,
        message: String,
    },
    #[error("model '{model}' was not found on the local server; pull it with `ollama pull {model}`")]
    ModelNotFound { model: String },
}

impl AnalysisError {
    pub fn kind(&self) -> AnalysisErrorKind {
        match self {
            Self::Network { .. } => AnalysisErrorKind::Network,
            Self::Remote { .. } => AnalysisErrorKind::Remote,
            Self::ModelNotFound { .. } => AnalysisErrorKind::ModelNotFound,
        }
    }
}

pub type AnalysisResult<T = String> = std::result::Result<T, AnalysisError>;

/// One image + prompt bound for a specific backend and model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    image: CapturedImage,
    prompt: String,
    variant: BackendVariant,
    model: String,
}

impl AnalysisRequest {
    pub fn new(
        image: CapturedImage,
        prompt: impl Into<String>,
        variant: BackendVariant,
        model: impl Into<String>,
    ) -> Self {
        Self {
            image,
            prompt: prompt.into(),
            variant,
            model: model.into(),
        }
    }

    pub fn image(&self) -> &CapturedImage {
        &self.image
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn variant(&self) -> BackendVariant {
        self.variant
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn image_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.image.bytes)
    }
}

/// Seam between the orchestrator and whatever turns an image into text.
pub trait Analyzer: Send + Sync {
    fn variant(&self) -> BackendVariant;
    fn model(&self) -> &str;
    fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult;
}

#[derive(Debug, Clone)]
pub enum BackendClient {
    Cloud(GeminiClient),
    Local(OllamaClient),
}

impl BackendClient {
    pub fn from_config(config: &BackendConfig) -> reqwest::Result<Self> {
        let client = match &config.endpoint {
            BackendEndpoint::Cloud(cloud) => {
                Self::Cloud(GeminiClient::new(cloud.clone(), config.request_timeout)?)
            }
            BackendEndpoint::Local(local) => {
                Self::Local(OllamaClient::new(local.clone(), config.request_timeout)?)
            }
        };
        tracing::info!(
            backend = client.variant().as_str(),
            model = client.model(),
            timeout_secs = config.request_timeout.as_secs(),
            "backend client ready"
        );
        Ok(client)
    }
}

impl Analyzer for BackendClient {
    fn variant(&self) -> BackendVariant {
        match self {
            Self::Cloud(_) => BackendVariant::Cloud,
            Self::Local(_) => BackendVariant::Local,
        }
    }

    fn model(&self) -> &str {
        match self {
            Self::Cloud(client) => client.model(),
            Self::Local(client) => client.model(),
        }
    }

    fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        match self {
            Self::Cloud(client) => client.analyze(request),
            Self::Local(client) => client.analyze(request),
        }
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
        .build()
}

/// Maps a failure that happened before a usable response arrived.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> AnalysisError {
    let message = if err.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs_f32())
    } else if err.is_connect() {
        match err.url() {
            Some(url) => format!("could not connect to {}", url.origin().ascii_serialization()),
            None => "could not connect to the backend".to_string(),
        }
    } else {
        err.to_string()
    };
    AnalysisError::Network { message }
}

/// Reads the full body so status and payload can be judged together.
pub(crate) fn read_response(
    response: Response,
    timeout: Duration,
) -> AnalysisResult<(StatusCode, String)> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| transport_error(err, timeout))?;
    Ok((status, body))
}

pub(crate) fn truncate_for_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}...")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
pub(crate) fn sample_request(variant: BackendVariant, model: &str) -> AnalysisRequest {
    use crate::capture::ImageFormat;

    AnalysisRequest::new(
        CapturedImage {
            bytes: b"IMG1".to_vec(),
            format: ImageFormat::Png,
            width: 1,
            height: 1,
        },
        "What is on screen?",
        variant,
        model,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CloudConfig, LocalConfig};

    #[test]
    fn request_encodes_image_as_base64() {
        let request = sample_request(BackendVariant::Local, "qwen3-vl:8b");
        assert_eq!(request.image_base64(), "SU1HMQ==");
        assert_eq!(request.model(), "qwen3-vl:8b");
        assert_eq!(request.prompt(), "What is on screen?");
    }

    #[test]
    fn error_kinds_and_messages_are_stable() {
        let not_found = AnalysisError::ModelNotFound {
            model: "qwen3-vl:8b".to_string(),
        };
        assert_eq!(not_found.kind(), AnalysisErrorKind::ModelNotFound);
        assert!(not_found.to_string().contains("qwen3-vl:8b"));

        let remote = AnalysisError::Remote {
            backend: "Gemini",
            message: "HTTP 500".to_string(),
        };
        assert_eq!(remote.kind(), AnalysisErrorKind::Remote);
        assert_eq!(remote.to_string(), "Gemini returned an error: HTTP 500");

        let network = AnalysisError::Network {
            message: "request timed out after 1s".to_string(),
        };
        assert_eq!(network.kind(), AnalysisErrorKind::Network);
        assert_eq!(network.to_string(), "network error: request timed out after 1s");
    }

    #[test]
    fn backend_client_follows_configured_variant() {
        let cloud = BackendClient::from_config(&BackendConfig {
            endpoint: BackendEndpoint::Cloud(CloudConfig {
                api_key: "key".to_string(),
                base_url: "http://127.0.0.1:1".to_string(),
                model: "gemini-3-flash-preview".to_string(),
            }),
            request_timeout: Duration::from_secs(5),
        })
        .expect("cloud client should build");
        assert_eq!(cloud.variant(), BackendVariant::Cloud);
        assert_eq!(cloud.model(), "gemini-3-flash-preview");

        let local = BackendClient::from_config(&BackendConfig {
            endpoint: BackendEndpoint::Local(LocalConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                model: "qwen3-vl:8b".to_string(),
            }),
            request_timeout: Duration::from_secs(5),
        })
        .expect("local client should build");
        assert_eq!(local.variant(), BackendVariant::Local);
        assert_eq!(local.model(), "qwen3-vl:8b");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 50);
        let message = truncate_for_message(&body);
        assert!(message.ends_with("..."));
        assert_eq!(message.chars().count(), MAX_ERROR_BODY_CHARS + 3);
    }
}
