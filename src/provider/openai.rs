//! OpenAI gateway implementation using the `/v1/chat/completions` API.
//!
//! One completion per call. Transport errors, 429, and 5xx responses are
//! retried with bounded exponential backoff and jitter under a hard
//! per-request timeout; everything else surfaces immediately.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;

use super::{check_http_response, ChatGateway, ChatRequest, ProviderError};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_JITTER_MS: u64 = 250;

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Chat completions request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier.
    pub model: String,
    /// System + user messages.
    pub messages: Vec<OpenAiMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum completion tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A message in chat format.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiMessage {
    /// Role (`system` or `user`).
    pub role: &'static str,
    /// Plain text content.
    pub content: String,
}

/// Chat completions response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiResponse {
    /// Response choices; only the first is used.
    pub choices: Vec<OpenAiChoice>,
}

/// One response choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    /// Assistant message for this choice.
    pub message: OpenAiChoiceMessage,
}

/// Assistant message payload.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiChoiceMessage {
    /// Text content; absent for refusals and tool-only replies.
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Request / response mapping (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build the wire request from a gateway request.
#[doc(hidden)]
pub fn build_request(model: &str, request: &ChatRequest) -> OpenAiRequest {
    OpenAiRequest {
        model: model.to_owned(),
        messages: vec![
            OpenAiMessage {
                role: "system",
                content: request.system.clone(),
            },
            OpenAiMessage {
                role: "user",
                content: request.user.clone(),
            },
        ],
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

/// Extract the trimmed assistant text from a response body.
///
/// # Errors
///
/// Returns [`ProviderError::Envelope`] when the body is not the expected
/// envelope or carries no text content.
#[doc(hidden)]
pub fn extract_text(body: &str) -> Result<String, ProviderError> {
    let response: OpenAiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Envelope(format!("malformed completion body: {e}")))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Envelope("missing choices[0]".to_owned()))?;

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_owned()),
        _ => Err(ProviderError::Envelope(
            "completion carried no text content".to_owned(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Chat gateway backed by the OpenAI API.
#[derive(Debug, Clone)]
pub struct OpenAiGateway {
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiGateway {
    /// Build a gateway from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let body = build_request(&self.model, request);
        let response = self
            .client
            .post(format!("{}{COMPLETIONS_PATH}", self.base_url))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;
        let payload = check_http_response(response).await?;
        extract_text(&payload)
    }
}

fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::Transport(_) => true,
        ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
        ProviderError::Envelope(_) => false,
    }
}

fn backoff_jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS))
}

#[async_trait::async_trait]
impl ChatGateway for OpenAiGateway {
    async fn complete(&self, request: ChatRequest) -> Result<String, ProviderError> {
        let mut delay = INITIAL_BACKOFF;
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(&request).await {
                Ok(text) => {
                    debug!(model = %self.model, chars = text.len(), "completion received");
                    return Ok(text);
                }
                Err(error) => {
                    if attempt >= self.max_retries || !is_retryable(&error) {
                        return Err(error);
                    }
                    attempt = attempt.saturating_add(1);
                    warn!(attempt, error = %error, "provider call failed, backing off");
                    tokio::time::sleep(delay.saturating_add(backoff_jitter())).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
