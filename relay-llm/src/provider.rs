//! Chat completion provider.
//!
//! DeepSeek speaks the OpenAI-compatible `chat/completions` format. The
//! [`Provider`] trait is the seam between the completion client and the
//! network; [`DeepSeekProvider`] is the HTTP implementation.

use crate::message::Turn;
use async_trait::async_trait;
use relay_common::config::LlmConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// ============================================================================
// Provider Trait
// ============================================================================

/// Interface for a chat completion backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Send a single non-streaming chat completion request.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Error from a provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Connection, DNS, TLS or body read failure
    #[error("Request failed: {0}")]
    Transport(String),

    /// No response within the configured bound
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Non-success HTTP status
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// Body was not the expected JSON shape
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Well-formed response without any choice
    #[error("Response contained no choices")]
    EmptyChoices,
}

impl ProviderError {
    /// Whether this failure happened talking to the endpoint rather than
    /// interpreting its answer.
    ///
    /// HTTP error statuses count as transport failures.
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::Status { .. }
        )
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub stream: bool,
}

/// Parsed completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Text of the first choice
    pub content: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    total_tokens: Option<i64>,
}

/// Parse a raw response body into the first choice.
fn parse_completion(body: &str) -> Result<(String, Option<String>, TokenUsage), ProviderError> {
    let result: CompletionResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let usage = result.usage.map_or(TokenUsage::default(), |u| TokenUsage {
        input_tokens: u.prompt_tokens.unwrap_or(0),
        output_tokens: u.completion_tokens.unwrap_or(0),
        total_tokens: u.total_tokens.unwrap_or(0),
    });

    let choice = result
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyChoices)?;

    Ok((choice.message.content, choice.finish_reason, usage))
}

// ============================================================================
// DeepSeek
// ============================================================================

/// DeepSeek chat completions over HTTPS.
pub struct DeepSeekProvider {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl DeepSeekProvider {
    /// Create a provider for `endpoint` authenticated with `api_key`.
    ///
    /// The timeout covers the whole request, connect through body.
    pub fn new(api_key: &str, endpoint: impl Into<String>, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(&format!("Bearer {}", api_key.trim())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::error!(
                    "API key is not a valid header value, requests will be unauthenticated"
                );
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: endpoint.into(),
            timeout_secs: timeout.as_secs(),
        }
    }

    /// Create a provider from configuration.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            &config.api_key,
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Provider for DeepSeekProvider {
    fn name(&self) -> &str {
        "deepseek"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let (content, finish_reason, usage) = parse_completion(&body)?;

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_correctly() {
        let req = ChatRequest {
            model: "deepseek-chat".into(),
            messages: vec![Turn::system("Be helpful"), Turn::user("Hello")],
            max_tokens: 2000,
            temperature: 0.7,
            stream: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["stream"], false);
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
    }

    #[test]
    fn response_parses_first_choice() {
        let body = r#"{
            "id": "x",
            "model": "deepseek-chat",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "Other"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let (content, finish_reason, usage) = parse_completion(body).unwrap();
        assert_eq!(content, "Hello!");
        assert_eq!(finish_reason.as_deref(), Some("stop"));
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn response_without_usage() {
        let body = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let (content, _, usage) = parse_completion(body).unwrap();
        assert_eq!(content, "ok");
        assert_eq!(usage, TokenUsage::default());
    }

    #[test]
    fn empty_choices_is_not_transport() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyChoices));
        assert!(!err.is_transport());
    }

    #[test]
    fn malformed_body_is_parse_error() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
        assert!(!err.is_transport());
    }

    #[test]
    fn error_classification() {
        assert!(ProviderError::Transport("refused".into()).is_transport());
        assert!(ProviderError::Timeout(30).is_transport());
        assert!(ProviderError::Status {
            status: 502,
            body: String::new()
        }
        .is_transport());
    }

    #[test]
    fn provider_from_config() {
        let config = LlmConfig::default();
        let provider = DeepSeekProvider::from_config(&config);
        assert_eq!(provider.name(), "deepseek");
        assert_eq!(provider.endpoint(), "https://api.deepseek.com/chat/completions");
        assert_eq!(provider.timeout_secs, 30);
    }
}
