use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{
    build_http_client, read_response, transport_error, truncate_for_message, AnalysisError,
    AnalysisRequest, AnalysisResult,
};
use crate::config::CloudConfig;

const BACKEND_NAME: &str = "Gemini";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: CloudConfig,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: CloudConfig, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            config,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, model
        )
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.prompt(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image().format.mime_type(),
                            data: request.image_base64(),
                        },
                    },
                ],
            }],
        };

        tracing::debug!(model = request.model(), "sending generateContent request");
        let response = self
            .client
            .post(self.endpoint(request.model()))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .map_err(|err| transport_error(err, self.timeout))?;

        let (status, body) = read_response(response, self.timeout)?;
        if !status.is_success() {
            return Err(AnalysisError::Remote {
                backend: BACKEND_NAME,
                message: describe_error_body(status.as_u16(), &body),
            });
        }

        parse_generate_content(&body)
    }
}

fn describe_error_body(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("HTTP {status} {code}: {}", envelope.error.message),
            None => format!("HTTP {status}: {}", envelope.error.message),
        },
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {}", truncate_for_message(body)),
    }
}

fn parse_generate_content(body: &str) -> AnalysisResult {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|err| AnalysisError::Remote {
            backend: BACKEND_NAME,
            message: format!("malformed response: {err}"),
        })?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .map(|reason| format!("prompt blocked ({reason})"))
            .unwrap_or_else(|| "response contained no candidates".to_string());
        return Err(AnalysisError::Remote {
            backend: BACKEND_NAME,
            message: reason,
        });
    };

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        let message = match candidate.finish_reason {
            Some(reason) => format!("response contained no text (finish reason {reason})"),
            None => "response contained no text".to_string(),
        };
        return Err(AnalysisError::Remote {
            backend: BACKEND_NAME,
            message,
        });
    }

    Ok(text)
}
