//! Text-generation gateway: the trait the responder calls, and an
//! OpenAI-compatible chat-completions client implementing it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GatewayConfig;

/// Generates text from a system prompt and a user prompt.
///
/// Implementations bound their own latency; callers never time them out.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
    ) -> Result<String, GatewayError>;
}

#[derive(Debug)]
pub enum GatewayError {
    Http(String),
    Timeout,
    /// HTTP 429: rate limit or quota exhausted.
    Quota(String),
    Api { status: u16, body: String },
    Parse(String),
    Empty,
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Http(e) => write!(f, "HTTP error: {e}"),
            GatewayError::Timeout => write!(f, "request timed out"),
            GatewayError::Quota(e) => write!(f, "quota exhausted: {e}"),
            GatewayError::Api { status, body } => write!(f, "API error: {status}: {body}"),
            GatewayError::Parse(e) => write!(f, "Parse error: {e}"),
            GatewayError::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for GatewayError {}

pub struct OpenAiClient {
    config: GatewayConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }
}

#[async_trait]
impl Gateway for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
    ) -> Result<String, GatewayError> {
        let request = ApiRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: build_messages(system_prompt, user_prompt),
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        debug!("Chat completion response status: {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(GatewayError::Quota(body));
            }
            return Err(GatewayError::Api { status: status.as_u16(), body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        parse_completion(&body)
    }
}

fn build_messages<'a>(system_prompt: Option<&'a str>, user_prompt: &'a str) -> Vec<ApiMessage<'a>> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt {
        messages.push(ApiMessage { role: "system", content: system });
    }
    messages.push(ApiMessage { role: "user", content: user_prompt });
    messages
}

fn parse_completion(body: &str) -> Result<String, GatewayError> {
    let parsed: ApiResponse =
        serde_json::from_str(body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(GatewayError::Empty);
    }
    Ok(text)
}
