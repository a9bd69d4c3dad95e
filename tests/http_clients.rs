//! Integration test: point the gateway and reply clients at a local stub API
//! and check what they send and how they map HTTP statuses.

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, http::HeaderMap, http::StatusCode, routing::post};
use tokio::sync::Mutex;

use kanabot::config::GatewayConfig;
use kanabot::gateway::{Gateway, GatewayError, OpenAiClient};
use kanabot::line::{LineClient, ReplyError, ReplySink};

/// Canned answer plus a record of every request received.
#[derive(Clone)]
struct StubApi {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    seen: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>,
}

impl StubApi {
    fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            delay: Duration::ZERO,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

async fn stub_handler(
    State(stub): State<StubApi>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, String) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    stub.seen.lock().await.push((auth, body));
    tokio::time::sleep(stub.delay).await;
    (stub.status, stub.body.to_string())
}

/// Serve `stub` at `path` on a free port; returns the base URL.
async fn serve(path: &str, stub: StubApi) -> String {
    let app = Router::new().route(path, post(stub_handler)).with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn gateway(base_url: String, timeout_secs: u64) -> OpenAiClient {
    OpenAiClient::new(GatewayConfig {
        api_key: "sk-test".to_string(),
        base_url,
        model: "gpt-test".to_string(),
        temperature: 0.7,
        timeout_secs,
    })
    .unwrap()
}

#[tokio::test]
async fn completion_request_and_answer() {
    let stub = StubApi::new(
        StatusCode::OK,
        r#"{"choices":[{"message":{"role":"assistant","content":" Привет! "}}]}"#,
    );
    let base = serve("/v1/chat/completions", stub.clone()).await;

    let answer = gateway(format!("{base}/v1"), 5)
        .complete(Some("be nice"), "こんにちは")
        .await
        .unwrap();
    assert_eq!(answer, "Привет!");

    let seen = stub.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("Bearer sk-test"));
    assert_eq!(seen[0].1["model"], "gpt-test");
    assert_eq!(seen[0].1["messages"][0]["role"], "system");
    assert_eq!(seen[0].1["messages"][1]["content"], "こんにちは");
}

#[tokio::test]
async fn too_many_requests_is_quota() {
    let stub = StubApi::new(
        StatusCode::TOO_MANY_REQUESTS,
        r#"{"error":{"code":"insufficient_quota"}}"#,
    );
    let base = serve("/chat/completions", stub).await;

    let err = gateway(base, 5).complete(None, "hi").await.unwrap_err();
    match err {
        GatewayError::Quota(body) => assert!(body.contains("insufficient_quota")),
        other => panic!("expected Quota, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_api_error() {
    let stub = StubApi::new(StatusCode::INTERNAL_SERVER_ERROR, "upstream broke");
    let base = serve("/chat/completions", stub).await;

    let err = gateway(base, 5).complete(None, "hi").await.unwrap_err();
    match err {
        GatewayError::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream broke");
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_completion_times_out() {
    let mut stub = StubApi::new(StatusCode::OK, r#"{"choices":[]}"#);
    stub.delay = Duration::from_secs(3);
    let base = serve("/chat/completions", stub).await;

    let err = gateway(base, 1).complete(None, "hi").await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn reply_posts_token_and_text() {
    let stub = StubApi::new(StatusCode::OK, "{}");
    let base = serve("/v2/bot/message/reply", stub.clone()).await;

    let client = LineClient::with_endpoint(
        "line-token".into(),
        format!("{base}/v2/bot/message/reply"),
        false,
    )
    .unwrap();
    client.reply("reply-token", "こんにちは").await.unwrap();

    let seen = stub.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("Bearer line-token"));
    assert_eq!(
        seen[0].1,
        serde_json::json!({
            "replyToken": "reply-token",
            "messages": [{"type": "text", "text": "こんにちは"}]
        })
    );
}

#[tokio::test]
async fn rejected_reply_is_api_error() {
    let stub = StubApi::new(StatusCode::BAD_REQUEST, r#"{"message":"Invalid reply token"}"#);
    let base = serve("/reply", stub).await;

    let client =
        LineClient::with_endpoint("line-token".into(), format!("{base}/reply"), false).unwrap();
    let err = client.reply("stale-token", "hi").await.unwrap_err();
    match err {
        ReplyError::Api { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid reply token"));
        }
        other => panic!("expected Api, got {other:?}"),
    }
}
