//! Integration test: signed LINE webhook in, reply out, against local mocks for the photo API
//! and the LINE reply endpoint.

mod common;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use yuanzhang::channels::sign_body;
use yuanzhang::gateway;

type Replies = Arc<Mutex<Vec<Value>>>;

async fn list_photos(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    Json(match q.get("search").map(String::as_str) {
        None => json!([{ "path": "/Photos/all.jpg" }]),
        Some("颱風") => json!([{ "path": "/Photos/typhoon.jpg", "taken": "2019" }]),
        Some(_) => json!([]),
    })
}

async fn record_reply(State(replies): State<Replies>, Json(body): Json<Value>) -> Json<Value> {
    replies.lock().unwrap().push(body);
    Json(json!({}))
}

/// Start the mock upstream (photo listing + LINE reply) and return its base URL.
async fn start_mock_upstream(replies: Replies) -> String {
    let app = Router::new()
        .route("/list", get(list_photos))
        .route("/v2/bot/message/reply", post(record_reply))
        .with_state(replies);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Start the gateway against `upstream` and wait until it answers the health probe.
async fn start_gateway(upstream: &str) -> String {
    let port = common::free_port();
    let settings = common::test_settings(port, upstream);
    tokio::spawn(async move {
        let _ = gateway::run_gateway(settings).await;
    });
    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{}/", base)).send().await {
            if resp.status().is_success() {
                return base;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway on port {} did not start within 5s", port);
}

fn webhook_body(events: Value) -> String {
    json!({ "destination": "Ubot", "events": events }).to_string()
}

fn text_event(token: &str, source: Value, text: &str) -> Value {
    json!({
        "type": "message",
        "replyToken": token,
        "source": source,
        "message": { "type": "text", "id": "1", "text": text }
    })
}

async fn post_signed(base: &str, body: &str) -> reqwest::StatusCode {
    let signature = sign_body("test-secret", body.as_bytes()).expect("sign body");
    reqwest::Client::new()
        .post(format!("{}/webhook", base))
        .header("x-line-signature", signature)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("post webhook")
        .status()
}

async fn wait_for_replies(replies: &Replies, n: usize) -> Vec<Value> {
    for _ in 0..100 {
        {
            let got = replies.lock().unwrap();
            if got.len() >= n {
                return got.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {} reply call(s), got {:?}", n, replies.lock().unwrap());
}

#[tokio::test]
async fn signed_batch_gets_one_reply_per_answerable_event() {
    let replies: Replies = Arc::new(Mutex::new(Vec::new()));
    let upstream = start_mock_upstream(replies.clone()).await;
    let base = start_gateway(&upstream).await;

    let body = webhook_body(json!([
        text_event("tok-greet", json!({ "type": "user", "userId": "U1" }), "院長好"),
        text_event("tok-tag", json!({ "type": "group", "groupId": "G1" }), "院長，颱風"),
        text_event("tok-chat", json!({ "type": "group", "groupId": "G1" }), "大家晚安"),
        { "type": "follow", "replyToken": "tok-follow", "source": { "type": "user", "userId": "U2" } }
    ]));
    assert_eq!(post_signed(&base, &body).await, reqwest::StatusCode::OK);

    let mut got = wait_for_replies(&replies, 2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(replies.lock().unwrap().len(), 2, "suppressed events must not reply");

    got.sort_by_key(|v| v["replyToken"].as_str().unwrap_or("").to_string());
    assert_eq!(got[0]["replyToken"], "tok-greet");
    assert_eq!(got[0]["messages"][0]["type"], "image");
    assert_eq!(
        got[0]["messages"][0]["originalContentUrl"],
        "https://cdn.example/Photos/all.jpg"
    );
    assert_eq!(got[1]["replyToken"], "tok-tag");
    assert_eq!(
        got[1]["messages"][0]["previewImageUrl"],
        "https://cdn.example/Photos/typhoon.jpg"
    );
    assert_eq!(got[1]["messages"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn bad_signature_is_rejected_without_reply() {
    let replies: Replies = Arc::new(Mutex::new(Vec::new()));
    let upstream = start_mock_upstream(replies.clone()).await;
    let base = start_gateway(&upstream).await;

    let body = webhook_body(json!([text_event(
        "tok",
        json!({ "type": "user", "userId": "U1" }),
        "院長好"
    )]));
    let status = reqwest::Client::new()
        .post(format!("{}/webhook", base))
        .header("x-line-signature", "c2lnbmF0dXJl")
        .body(body)
        .send()
        .await
        .expect("post webhook")
        .status();
    assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(replies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let replies: Replies = Arc::new(Mutex::new(Vec::new()));
    let upstream = start_mock_upstream(replies.clone()).await;
    let base = start_gateway(&upstream).await;
    assert_eq!(
        post_signed(&base, "{not json").await,
        reqwest::StatusCode::BAD_REQUEST
    );
}
