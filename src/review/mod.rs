pub mod prompt;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::github::PullRequest;

/// Finish reasons that mean the model withheld its answer.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Request(reqwest::Error),

    #[error("Model request timed out")]
    Timeout,

    #[error("Model quota exhausted ({0})")]
    QuotaExceeded(String),

    #[error("Model API key rejected ({0})")]
    Authentication(String),

    #[error("Model refused to answer: {reason}")]
    Blocked { reason: String },

    #[error("Model API returned {status} ({message})")]
    Api { status: u16, message: String },

    #[error("Failed to decode model response: {0}")]
    Decode(String),

    #[error("Model returned no review text")]
    EmptyResponse,
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout
        } else {
            ModelError::Request(err)
        }
    }
}

/// Review text exactly as the model returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewText(String);

impl ReviewText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReviewText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a pull request into review text.
///
/// The model behind it is opaque; implementations only build the request
/// and relay the answer.
#[async_trait]
pub trait ReviewGenerator: Send + Sync {
    /// Model identifier, for logs and the run report.
    fn model(&self) -> &str;

    async fn generate_review(&self, pr: &PullRequest) -> Result<ReviewText, ModelError>;
}

/// Gemini `generateContent` client.
pub struct GeminiGenerator {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_output_tokens: Option<u32>,
}

impl GeminiGenerator {
    pub fn new(config: &Config, api_key: &str) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.model.timeout_secs))
            .build()
            .map_err(ModelError::Request)?;

        Ok(
            Self::with_http(http, &config.model.api_base, api_key, config.model_name())
                .generation(config.model.temperature, config.model.max_output_tokens),
        )
    }

    pub fn with_http(http: reqwest::Client, api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
            temperature: 0.2,
            max_output_tokens: None,
        }
    }

    pub fn generation(mut self, temperature: f64, max_output_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// One non-streamed `generateContent` round trip.
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = user_prompt.len()))]
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);

        let mut generation_config = json!({ "temperature": self.temperature });
        if let Some(max_tokens) = self.max_output_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        let body = json!({
            "systemInstruction": { "parts": [{ "text": system_prompt }] },
            "contents": [{ "role": "user", "parts": [{ "text": user_prompt }] }],
            "generationConfig": generation_config,
        });

        debug!("sending generateContent request");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            debug!(%status, "model API error response");
            return Err(classify_error(status, &text));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::Decode(e.to_string()))?;
        let review = extract_text(parsed)?;
        debug!(review_chars = review.len(), "received model response");
        Ok(review)
    }
}

#[async_trait]
impl ReviewGenerator for GeminiGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_review(&self, pr: &PullRequest) -> Result<ReviewText, ModelError> {
        let user_prompt = prompt::build_prompt(pr);
        let text = self.complete(prompt::REVIEW_INSTRUCTIONS, &user_prompt).await?;
        Ok(ReviewText::new(text))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Text of the first candidate, its parts concatenated unchanged.
fn extract_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ModelError::Blocked { reason });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ModelError::EmptyResponse);
    };
    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return match candidate.finish_reason {
            Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
                Err(ModelError::Blocked { reason })
            }
            _ => Err(ModelError::EmptyResponse),
        };
    }
    Ok(text)
}

/// Google error bodies look like
/// `{"error": {"code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED"}}`.
fn classify_error(status: StatusCode, body: &str) -> ModelError {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: String,
        #[serde(default)]
        status: String,
    }

    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.trim().chars().take(300).collect(), String::new()),
    };

    match status.as_u16() {
        429 => ModelError::QuotaExceeded(message),
        _ if api_status == "RESOURCE_EXHAUSTED" => ModelError::QuotaExceeded(message),
        401 | 403 => ModelError::Authentication(message),
        400 if message.contains("API key") => ModelError::Authentication(message),
        504 => ModelError::Timeout,
        code => ModelError::Api {
            status: code,
            message,
        },
    }
}
