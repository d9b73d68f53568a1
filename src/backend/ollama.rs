use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{
    build_http_client, read_response, transport_error, truncate_for_message, AnalysisError,
    AnalysisRequest, AnalysisResult,
};
use crate::config::LocalConfig;

const BACKEND_NAME: &str = "Ollama";

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    config: LocalConfig,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: LocalConfig, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            config,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let url = format!("{}/api/generate", self.config.base_url);
        let body = OllamaRequest {
            model: request.model(),
            prompt: request.prompt(),
            images: vec![request.image_base64()],
            stream: false,
        };

        tracing::debug!(model = request.model(), %url, "sending generate request");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|err| transport_error(err, self.timeout))?;

        let (status, body) = read_response(response, self.timeout)?;
        if status == StatusCode::NOT_FOUND {
            tracing::warn!(model = request.model(), "local server does not know the model");
            return Err(AnalysisError::ModelNotFound {
                model: request.model().to_string(),
            });
        }
        if !status.is_success() {
            return Err(AnalysisError::Remote {
                backend: BACKEND_NAME,
                message: describe_error_body(status.as_u16(), &body),
            });
        }

        let parsed: OllamaResponse =
            serde_json::from_str(&body).map_err(|err| AnalysisError::Remote {
                backend: BACKEND_NAME,
                message: format!("malformed response: {err}"),
            })?;
        Ok(parsed.response)
    }

    /// Names of the models the server has pulled (`/api/tags`).
    pub fn list_models(&self) -> AnalysisResult<Vec<String>> {
        let url = format!("{}/api/tags", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| transport_error(err, self.timeout))?;
        let (status, body) = read_response(response, self.timeout)?;
        if !status.is_success() {
            return Err(AnalysisError::Remote {
                backend: BACKEND_NAME,
                message: describe_error_body(status.as_u16(), &body),
            });
        }

        let models_response: OllamaModelsResponse =
            serde_json::from_str(&body).map_err(|err| AnalysisError::Remote {
                backend: BACKEND_NAME,
                message: format!("malformed model list: {err}"),
            })?;
        Ok(models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect())
    }

    pub fn has_model(&self, name: &str) -> AnalysisResult<bool> {
        let models = self.list_models()?;
        Ok(models.iter().any(|model| model_names_match(model, name)))
    }
}

/// Ollama reports untagged models as `name:latest`.
fn model_names_match(listed: &str, wanted: &str) -> bool {
    listed == wanted || (!wanted.contains(':') && listed == format!("{wanted}:latest"))
}

fn describe_error_body(status: u16, body: &str) -> String {
    match serde_json::from_str::<OllamaErrorResponse>(body) {
        Ok(error) => format!("HTTP {status}: {}", error.error),
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {}", truncate_for_message(body)),
    }
}
