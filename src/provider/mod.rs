//! Model gateway abstraction over the external chat-completion provider.
//!
//! The gateway is the single integration point with the model: one
//! stateless request per call, raw assistant text back. It sits behind
//! the [`ChatGateway`] trait so the orchestration layer and its tests can
//! substitute scripted or counting fakes.

use async_trait::async_trait;
use regex::Regex;

use crate::prompt::ChatPrompt;

pub mod openai;

/// Sampling temperature used for every model call.
pub const TEMPERATURE: f32 = 0.7;

/// A single chat request: two messages plus generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// System message setting the model's role.
    pub system: String,
    /// User message with instructions and data.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Optional cap on generated tokens.
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Build a request from a stage prompt with the fixed temperature.
    pub fn from_prompt(prompt: ChatPrompt, max_tokens: Option<u32>) -> Self {
        Self {
            system: prompt.system,
            user: prompt.user,
            temperature: TEMPERATURE,
            max_tokens,
        }
    }
}

/// Errors returned by the model gateway.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP transport failure (connect, timeout, TLS, body read).
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Provider answered with a non-success status.
    #[error("provider returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Redacted, truncated response body.
        body: String,
    },
    /// Provider envelope did not contain a usable completion.
    #[error("provider response envelope invalid: {0}")]
    Envelope(String),
}

/// Gateway to the chat-completion provider.
///
/// Implementations own their transport concerns (timeout, retry) and are
/// `Send + Sync` for use across handler tasks.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send one chat request and return the model's raw text reply.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport, status, or envelope
    /// failure after any internal retries are exhausted.
    async fn complete(&self, request: ChatRequest) -> Result<String, ProviderError>;

    /// Model identifier, for logs.
    fn model_id(&self) -> &str;
}

/// Read an HTTP response, returning the body on success and a redacted,
/// truncated [`ProviderError::Status`] otherwise.
///
/// # Errors
///
/// Returns [`ProviderError::Transport`] if the body cannot be read and
/// [`ProviderError::Status`] on any non-2xx status.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    Err(ProviderError::Status {
        status: status.as_u16(),
        body: scrub_error_body(&body),
    })
}

/// Collapse whitespace, redact token-like values, and truncate an error
/// body so it is safe to log and to carry in an error.
fn scrub_error_body(raw: &str) -> String {
    const MAX_CHARS: usize = 300;

    let mut scrubbed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    for pattern in [r"(?i)bearer\s+[A-Za-z0-9._\-]+", r"sk-[A-Za-z0-9_\-]{16,}"] {
        if let Ok(regex) = Regex::new(pattern) {
            scrubbed = regex.replace_all(&scrubbed, "[REDACTED]").into_owned();
        }
    }

    if scrubbed.chars().count() > MAX_CHARS {
        let head: String = scrubbed.chars().take(MAX_CHARS).collect();
        return format!("{head}...[truncated]");
    }
    scrubbed
}
