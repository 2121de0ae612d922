//! End-to-end tests driving a live gateway over a real WebSocket connection
//! and real `/bin/sh` processes.

#![cfg(unix)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use term_gateway::app_state::AppState;
use term_gateway::config::ServerConfig;
use term_gateway::pty::default_factory;
use term_gateway::server::build_router;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_gateway() -> (SocketAddr, AppState) {
    let state = AppState::new(ServerConfig::for_tests(), default_factory());
    let router = build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect failed");
    ws
}

async fn send(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Read frames until one satisfies the predicate; panics after 15 seconds.
async fn recv_until<F>(ws: &mut WsStream, pred: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    timeout(Duration::from_secs(15), async {
        loop {
            let msg = ws
                .next()
                .await
                .expect("connection closed unexpectedly")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).expect("invalid JSON frame");
                if pred(&value) {
                    return value;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for expected message")
}

async fn http_request(addr: SocketAddr, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("{method} {path} HTTP/1.1\r\nHost: gateway\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn create_data_kill_roundtrip() {
    let (addr, _state) = start_gateway().await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        json!({"type": "create", "sessionId": "s1", "shell": "/bin/sh", "cols": 80, "rows": 24}),
    )
    .await;
    let created = recv_until(&mut ws, |v| v["type"] == "created").await;
    assert_eq!(created["sessionId"], "s1");
    assert!(created["pid"].as_u64().unwrap() > 0);

    send(
        &mut ws,
        json!({"type": "data", "sessionId": "s1", "data": "echo gateway_roundtrip_ok\n"}),
    )
    .await;
    let data = recv_until(&mut ws, |v| {
        v["type"] == "data"
            && v["data"]
                .as_str()
                .is_some_and(|d| d.contains("gateway_roundtrip_ok"))
    })
    .await;
    assert_eq!(data["sessionId"], "s1");

    send(&mut ws, json!({"type": "process-list"})).await;
    let listing = recv_until(&mut ws, |v| v["type"] == "process-list").await;
    let ids: Vec<&str> = listing["processes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["sessionId"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"s1"));

    send(&mut ws, json!({"type": "kill", "sessionId": "s1"})).await;
    let killed = recv_until(&mut ws, |v| v["type"] == "killed").await;
    assert_eq!(killed["sessionId"], "s1");

    send(&mut ws, json!({"type": "process-list"})).await;
    let listing = recv_until(&mut ws, |v| v["type"] == "process-list").await;
    assert!(listing["processes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn protocol_errors_do_not_drop_the_connection() {
    let (addr, _state) = start_gateway().await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        json!({"type": "create", "sessionId": "dup", "shell": "/bin/sh"}),
    )
    .await;
    recv_until(&mut ws, |v| v["type"] == "created").await;

    send(
        &mut ws,
        json!({"type": "create", "sessionId": "dup", "shell": "/bin/sh"}),
    )
    .await;
    let err = recv_until(&mut ws, |v| v["type"] == "error").await;
    assert_eq!(err["error"], "Session already exists");

    send(
        &mut ws,
        json!({"type": "data", "sessionId": "ghost", "data": "ls\n"}),
    )
    .await;
    let err = recv_until(&mut ws, |v| v["type"] == "error" && v["sessionId"] == "ghost").await;
    assert_eq!(err["error"], "Session not found");

    ws.send(Message::Text("definitely not json".to_string()))
        .await
        .unwrap();
    let err = recv_until(&mut ws, |v| v["type"] == "error" && v["sessionId"] == "system").await;
    assert_eq!(err["error"], "Invalid message format");

    // The channel is still usable after every error above.
    send(&mut ws, json!({"type": "kill", "sessionId": "dup"})).await;
    recv_until(&mut ws, |v| v["type"] == "killed").await;
}

#[tokio::test]
async fn closing_the_channel_kills_its_sessions() {
    let (addr, state) = start_gateway().await;
    let mut ws = connect(addr).await;

    for id in ["a", "b"] {
        send(
            &mut ws,
            json!({"type": "create", "sessionId": id, "shell": "/bin/sh"}),
        )
        .await;
        recv_until(&mut ws, |v| v["type"] == "created").await;
    }
    assert_eq!(state.registry.counts().await, (2, 2));

    ws.close(None).await.unwrap();
    drop(ws);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if state.registry.counts().await == (0, 0) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "sessions were not cleaned up after channel close"
        );
        sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn control_surface_health_and_delete() {
    let (addr, state) = start_gateway().await;

    let health = http_request(addr, "GET", "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains("\"status\":\"ok\""));
    assert!(health.contains("\"sessionCount\":0"));

    let mut ws = connect(addr).await;
    send(
        &mut ws,
        json!({"type": "create", "sessionId": "ctl", "shell": "/bin/sh"}),
    )
    .await;
    recv_until(&mut ws, |v| v["type"] == "created").await;

    let listing = http_request(addr, "GET", "/api/sessions").await;
    assert!(listing.starts_with("HTTP/1.1 200"));
    assert!(listing.contains("\"id\":\"ctl\""));

    let deleted = http_request(addr, "DELETE", "/api/sessions/ctl").await;
    assert!(deleted.starts_with("HTTP/1.1 200"));
    assert_eq!(state.registry.counts().await, (0, 0));

    let missing = http_request(addr, "DELETE", "/api/sessions/ctl").await;
    assert!(missing.starts_with("HTTP/1.1 404"));
}
