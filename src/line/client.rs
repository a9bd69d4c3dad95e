//! Reply delivery through the LINE Messaging API.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

const REPLY_URL: &str = "https://api.line.me/v2/bot/message/reply";

/// LINE rejects text messages longer than this many characters.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Sends the single reply allowed for a reply token.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError>;
}

#[derive(Debug)]
pub enum ReplyError {
    Http(String),
    Api { status: u16, body: String },
}

impl std::fmt::Display for ReplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyError::Http(e) => write!(f, "HTTP error: {e}"),
            ReplyError::Api { status, body } => write!(f, "reply rejected: {status}: {body}"),
        }
    }
}

impl std::error::Error for ReplyError {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// LINE API client.
pub struct LineClient {
    access_token: String,
    endpoint: String,
    http: reqwest::Client,
    dry_run: bool,
}

impl LineClient {
    pub fn new(access_token: String, dry_run: bool) -> Result<Self, ReplyError> {
        Self::with_endpoint(access_token, REPLY_URL.to_string(), dry_run)
    }

    /// Client posting to a custom reply endpoint.
    pub fn with_endpoint(
        access_token: String,
        endpoint: String,
        dry_run: bool,
    ) -> Result<Self, ReplyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReplyError::Http(e.to_string()))?;
        Ok(Self {
            access_token,
            endpoint,
            http,
            dry_run,
        })
    }
}

#[async_trait]
impl ReplySink for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        let text = truncate_chars(text, MAX_TEXT_CHARS);

        if self.dry_run {
            info!("[DRY RUN] Would reply: {text:?}");
            return Ok(());
        }

        let request = ReplyRequest {
            reply_token,
            messages: [TextMessage { kind: "text", text }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Failed to send reply: {e}");
                warn!("{}", msg);
                ReplyError::Http(msg)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplyError::Api { status: status.as_u16(), body });
        }
        Ok(())
    }
}

/// Cut `s` to at most `max_chars` characters, on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
