#![cfg(feature = "web")]

use std::sync::Arc;

use axum::body::{Body, Bytes, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::routing::post;
use axum::{Json, Router};
use databoard::app::router;
use databoard::autosave::DEFAULT_QUIET_INTERVAL;
use databoard::chat::{ChatClient, ChatEvent, ChatOutcome, ChatRequest, ChatTranscript};
use databoard::codec;
use databoard::error::NetworkError;
use databoard::node::{ChartKind, Node, Position};
use databoard::session::CanvasSession;
use databoard::store::{CanvasStore, HttpCanvasStore, MemoryCanvasStore};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceExt;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Serves `app` on an ephemeral port and returns its base URL.
async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(router(MemoryCanvasStore::new()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    println!("✓ Health endpoint answers");
}

#[tokio::test]
async fn test_canvas_lifecycle() {
    let store = MemoryCanvasStore::new();
    let app = router(store.clone());

    let (status, body) = send(
        app.clone(),
        json_request("POST", "/canvas/alice", json!({ "name": "Sales" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["canvas"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["canvas"]["script"], json!(codec::EMPTY_DOCUMENT));

    let (status, body) = send(
        app.clone(),
        json_request(
            "PATCH",
            &format!("/canvas/alice/{}/script", id),
            json!({ "script": "{\"nodes\":[],\"edges\":[]}" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(body["updatedAt"].is_string());

    let (status, body) = send(app.clone(), get(&format!("/canvas/alice/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canvas"]["script"], json!("{\"nodes\":[],\"edges\":[]}"));

    let (_, body) = send(app.clone(), get("/canvas/alice")).await;
    assert_eq!(body["canvases"].as_array().unwrap().len(), 1);
    assert!(body["canvases"][0].get("script").is_none(), "listings omit the script");

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/canvas/alice/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app.clone(), delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app, get(&format!("/canvas/alice/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    println!("✓ Canvases can be created, saved, read and deleted");
}

#[tokio::test]
async fn test_create_requires_name_and_patch_requires_canvas() {
    let app = router(MemoryCanvasStore::new());
    let (status, _) = send(
        app.clone(),
        json_request("POST", "/canvas/alice", json!({ "name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        app,
        json_request("PATCH", "/canvas/alice/nope/script", json!({ "script": "{}" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    println!("✓ Bad requests are rejected with the right status");
}

#[tokio::test]
async fn test_export_endpoint() {
    let store = MemoryCanvasStore::new();
    let doc = databoard::GraphDocument::empty()
        .add_node(Node::chart(ChartKind::Line, Position::new(0.0, 0.0)))
        .unwrap();
    let record = store.insert("alice", "Q1 board", &codec::encode(&doc));
    let app = router(store);

    let response = app
        .clone()
        .oneshot(get(&format!("/canvas/alice/{}/export/json", record.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("Q1 board-"));

    let (status, _) = send(app, get(&format!("/canvas/alice/{}/export/gif", record.id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    println!("✓ Exports download with a file name");
}

#[tokio::test]
async fn test_http_store_against_live_server() {
    let store = MemoryCanvasStore::new();
    let base = spawn_server(router(store.clone())).await;
    let client = HttpCanvasStore::new(format!("{}/", base));
    assert_eq!(client.base_url(), base, "trailing slash is dropped");

    let record = client.create("bob", "Ops").await.unwrap();
    assert_eq!(client.list("bob").await.unwrap().len(), 1);

    let saved_at = client
        .save_script("bob", &record.id, "{\"nodes\":[]}")
        .await
        .unwrap();
    let loaded = client.load("bob", &record.id).await.unwrap();
    assert_eq!(loaded.script, "{\"nodes\":[]}");
    assert_eq!(loaded.updated_at, saved_at);

    match client.save_script("bob", "missing", "{}").await {
        Err(NetworkError::Rejected(message)) => assert!(message.contains("missing")),
        other => panic!("expected a rejection, got {:?}", other),
    }

    client.delete("bob", &record.id).await.unwrap();
    assert!(client.load("bob", &record.id).await.is_err());
    println!("✓ The HTTP client speaks the backend's REST API");
}

#[tokio::test]
async fn test_session_over_http_saves_last_write() {
    let store = MemoryCanvasStore::new();
    let record = store.create("carol", "Live");
    let base = spawn_server(router(store.clone())).await;
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap();
    let client = Arc::new(HttpCanvasStore::with_client(http, base));

    let mut session = CanvasSession::open(client, "carol", &record.id, DEFAULT_QUIET_INTERVAL)
        .await
        .unwrap();
    let node = Node::chart(ChartKind::Scatter, Position::new(10.0, 10.0));
    session.edit(|g| g.add_node(node)).unwrap();
    session.save_now().await.unwrap();

    let stored = store.get("carol", &record.id).unwrap();
    assert_eq!(codec::decode(&stored.script).unwrap(), *session.document());
    println!("✓ A session saves through the REST backend");
}

fn ndjson_router(body: &'static str, hang: bool) -> Router {
    Router::new().route(
        "/api/chat/stream",
        post(move |Json(request): Json<ChatRequest>| async move {
            assert!(!request.messages.is_empty());
            let lines = futures::stream::iter(
                body.split_inclusive('\n')
                    .map(|line| Ok::<_, std::io::Error>(Bytes::from(line)))
                    .collect::<Vec<_>>(),
            );
            if hang {
                Body::from_stream(lines.chain(futures::stream::pending()))
            } else {
                Body::from_stream(lines)
            }
        }),
    )
}

#[tokio::test]
async fn test_chat_stream_delivers_events() {
    let body = concat!(
        "{\"type\":\"tool_start\",\"tool_name\":\"update_canvas\",\"message\":\"Editing\"}\n",
        "garbage\n",
        "{\"type\":\"canvas_update\",\"canvas\":\"{\\\"nodes\\\":[]}\",\"explanation\":\"Cleared\"}\n",
        "{\"type\":\"text_delta\",\"text\":\"All clear.\"}\n",
        "{\"type\":\"done\",\"usage\":{}}"
    );
    let base = spawn_server(ndjson_router(body, false)).await;

    let mut transcript = ChatTranscript::default();
    transcript.ask("clear the board");
    let (_cancel, cancel_rx) = watch::channel(false);
    let mut events = Vec::new();
    let outcome = ChatClient::new(&base)
        .stream(&transcript.request("{}", Vec::new()), cancel_rx, |event| {
            events.push(event)
        })
        .await
        .unwrap();

    assert_eq!(outcome, ChatOutcome::Completed);
    assert_eq!(events.len(), 4, "malformed line is skipped");
    assert!(matches!(events[1], ChatEvent::CanvasUpdate { .. }));
    for event in &events {
        transcript.apply(event);
    }
    assert_eq!(transcript.messages.last().unwrap().content, "All clear.");
    println!("✓ Chat events stream in order");
}

#[tokio::test]
async fn test_chat_stream_can_be_cancelled() {
    let body = "{\"type\":\"text_delta\",\"text\":\"Thinking\"}\n";
    let base = spawn_server(ndjson_router(body, true)).await;

    let mut transcript = ChatTranscript::default();
    transcript.ask("take your time");
    let (cancel, cancel_rx) = watch::channel(false);
    let mut received = 0;
    let outcome = ChatClient::new(&base)
        .stream(&transcript.request("{}", Vec::new()), cancel_rx, |_| {
            received += 1;
            let _ = cancel.send(true);
        })
        .await
        .unwrap();

    assert_eq!(outcome, ChatOutcome::Cancelled);
    assert_eq!(received, 1);
    println!("✓ Stopping a reply ends a stream that never closes");
}
