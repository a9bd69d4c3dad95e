//! Webhook HTTP handlers.

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::event::InboundEvent;
use crate::line::types::WebhookBody;
use crate::responder::{Outcome, Responder};
use crate::router::{RoutingDecision, RoutingEngine};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    channel_secret: Arc<str>,
    engine: Arc<RoutingEngine>,
    responder: Arc<Responder>,
    /// In-flight event tasks.
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl WebhookState {
    pub fn new(channel_secret: &str, engine: Arc<RoutingEngine>, responder: Arc<Responder>) -> Self {
        Self {
            channel_secret: Arc::from(channel_secret),
            engine,
            responder,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    async fn spawn_event(&self, event: InboundEvent) {
        let state = self.clone();
        let mut tasks = self.tasks.lock().await;
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                error!("Event task failed: {e}");
            }
        }
        tasks.spawn(async move { handle_event(&state, event).await });
    }

    /// Wait for every event task spawned so far to finish.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            info!("Waiting for {} in-flight event(s)", tasks.len());
        }
        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!("Event task failed: {e}");
            }
        }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Serve the webhook until Ctrl-C, then finish the events already accepted.
pub async fn run_server(addr: SocketAddr, state: WebhookState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Webhook server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    state.drain().await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("📢 Shutdown signal received"),
        Err(e) => error!("Unable to listen for shutdown signal: {e}"),
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("HTTP {} {}", method, path);
    let response = next.run(req).await;
    debug!("HTTP {} {} -> {}", method, path, response.status());

    response
}

/// Check `X-Line-Signature`: base64 of HMAC-SHA256 over the raw body, keyed
/// with the channel secret. Comparison is constant-time.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Receive a webhook delivery (POST from LINE).
///
/// Responds as soon as the payload is verified and parsed; each text message
/// is then routed and answered on its own task.
async fn callback(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook request without signature");
            StatusCode::BAD_REQUEST
        })?;

    if !verify_signature(&state.channel_secret, &body, signature) {
        warn!("Invalid webhook signature");
        return Err(StatusCode::BAD_REQUEST);
    }

    let payload: WebhookBody = serde_json::from_slice(&body).map_err(|e| {
        error!("Failed to parse webhook body: {e}");
        StatusCode::BAD_REQUEST
    })?;

    debug!("Webhook delivery with {} event(s)", payload.events.len());

    for event in payload.events {
        if !event.is_text_message() {
            debug!("Skipping {} event", event.kind);
            continue;
        }
        match event.into_inbound() {
            Ok(inbound) => state.spawn_event(inbound).await,
            Err(e) => warn!("Dropping event: {e}"),
        }
    }

    Ok("OK")
}

async fn handle_event(state: &WebhookState, event: InboundEvent) {
    info!(
        "Message from {} in {}: \"{}\"",
        event.sender_id(),
        event.group_id().unwrap_or("direct chat"),
        event.preview()
    );

    // Authorizing may sync the grant log to disk
    let engine = state.engine.clone();
    let routed = tokio::task::spawn_blocking(move || {
        let decision = engine.route(&event);
        (event, decision)
    })
    .await;
    let (event, decision) = match routed {
        Ok((event, Ok(decision))) => (event, decision),
        Ok((_, Err(e))) => {
            error!("Routing failed: {e}");
            return;
        }
        Err(e) => {
            error!("Routing task failed: {e}");
            return;
        }
    };

    match &decision {
        RoutingDecision::Ignore => debug!("→ ignore"),
        RoutingDecision::AssistantQuery { .. } => info!("→ assistant query"),
        RoutingDecision::Translate { direction, .. } => info!("→ translate {direction:?}"),
    }

    match state.responder.respond(&decision, event.reply_token()).await {
        Ok(Outcome::Silent) => {}
        Ok(Outcome::Replied) => debug!("Reply sent to {}", event.sender_id()),
        Err(e) => error!("Failed to respond to {}: {e}", event.sender_id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"destination":"U1","events":[]}"#;
        let signature = sign("channel-secret", body);
        assert!(verify_signature("channel-secret", body, &signature));
    }

    #[test]
    fn test_wrong_secret() {
        let body = br#"{"events":[]}"#;
        let signature = sign("other-secret", body);
        assert!(!verify_signature("channel-secret", body, &signature));
    }

    #[test]
    fn test_tampered_body() {
        let signature = sign("channel-secret", br#"{"events":[]}"#);
        assert!(!verify_signature("channel-secret", br#"{"events":[1]}"#, &signature));
    }

    #[test]
    fn test_garbage_signature() {
        assert!(!verify_signature("channel-secret", b"{}", "not base64!!"));
        assert!(!verify_signature("channel-secret", b"{}", ""));
    }
}
