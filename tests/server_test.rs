//! End-to-end tests over real WebSocket connections and HTTP routes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use strictly_rooms::{ChessEngine, Gateway, ServerConfig, chess_gateway, router, serve_on};
use tokio::net::TcpListener;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> (String, Arc<Gateway<ChessEngine>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind ephemeral port");
    let address = listener.local_addr().expect("Local address");
    let gateway = chess_gateway(&ServerConfig::default());
    let served = Arc::clone(&gateway);
    tokio::spawn(async move {
        serve_on(listener, served).await.expect("Server runs");
    });
    (format!("ws://{}/ws", address), gateway)
}

async fn open(url: &str) -> Socket {
    let (socket, _) = connect_async(url).await.expect("WebSocket handshake");
    socket
}

async fn send(socket: &mut Socket, frame: Value) {
    socket
        .send(Message::text(frame.to_string()))
        .await
        .expect("Send frame");
}

/// Reads events until one has the wanted `type`, returning it.
async fn expect_event(socket: &mut Socket, kind: &str) -> Value {
    let read = async {
        while let Some(message) = socket.next().await {
            if let Message::Text(text) = message.expect("Read frame") {
                let event: Value = serde_json::from_str(text.as_str()).expect("Event is JSON");
                if event["type"] == kind {
                    return event;
                }
            }
        }
        panic!("Socket closed before {} arrived", kind);
    };
    timeout(Duration::from_secs(5), read)
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for {}", kind))
}

#[tokio::test]
async fn test_websocket_game_flow() {
    let (url, gateway) = start_server().await;
    let mut a = open(&url).await;
    let mut b = open(&url).await;

    send(&mut a, json!({"type": "join", "session_key": "g1"})).await;
    let assigned = expect_event(&mut a, "role_assigned").await;
    assert_eq!(assigned["role"], "first_mover");

    send(&mut b, json!({"type": "join", "session_key": "g1"})).await;
    let assigned = expect_event(&mut b, "role_assigned").await;
    assert_eq!(assigned["role"], "second_mover");

    send(
        &mut a,
        json!({"type": "move", "session_key": "g1", "move": {"from": "e2", "to": "e4"}}),
    )
    .await;
    for socket in [&mut a, &mut b] {
        let applied = expect_event(socket, "move_applied").await;
        assert_eq!(applied["move"], json!({"from": "e2", "to": "e4"}));
        let history = expect_event(socket, "move_history_snapshot").await;
        assert_eq!(history["moves"], json!(["e4"]));
    }

    let mut c = open(&url).await;
    send(&mut c, json!({"type": "join", "session_key": "g1"})).await;
    expect_event(&mut c, "spectator_assigned").await;
    let history = expect_event(&mut c, "move_history_snapshot").await;
    assert_eq!(history["moves"], json!(["e4"]));

    send(&mut c, json!({"type": "chat", "session_key": "g1", "message": "hello"})).await;
    let chat = expect_event(&mut a, "chat_delivered").await;
    assert_eq!(chat["sender"], "spectator");
    assert_eq!(chat["display_name"], "Spectator");

    a.close(None).await.expect("Close");
    let left = expect_event(&mut b, "participant_left").await;
    assert_eq!(left["role"], "first_mover");
    expect_event(&mut c, "participant_left").await;
    assert!(gateway.registry().get("g1").is_some());
}

#[tokio::test]
async fn test_websocket_invalid_frame() {
    let (url, _gateway) = start_server().await;
    let mut a = open(&url).await;

    send(&mut a, json!({"type": "fly", "session_key": "g1"})).await;
    let reply = expect_event(&mut a, "invalid_command").await;
    assert!(reply["reason"].as_str().is_some_and(|reason| !reason.is_empty()));
}

#[tokio::test]
async fn test_session_removed_after_both_close() {
    let (url, gateway) = start_server().await;
    let mut a = open(&url).await;
    let mut b = open(&url).await;
    send(&mut a, json!({"type": "join", "session_key": "gone"})).await;
    expect_event(&mut a, "role_assigned").await;
    send(&mut b, json!({"type": "join", "session_key": "gone"})).await;
    expect_event(&mut b, "role_assigned").await;

    a.close(None).await.expect("Close");
    b.close(None).await.expect("Close");

    let emptied = timeout(Duration::from_secs(5), async {
        while gateway.registry().get("gone").is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(emptied.is_ok(), "Session should be removed once empty");
}

#[tokio::test]
async fn test_health_route() {
    let app = router(chess_gateway(&ServerConfig::default()));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).expect("Request"))
        .await
        .expect("Response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .expect("Body");
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_sessions_route_lists_summaries() {
    let gateway = chess_gateway(&ServerConfig::default());
    gateway.registry().get_or_create("lobby");
    let app = router(Arc::clone(&gateway));

    let response = app
        .oneshot(Request::get("/sessions").body(Body::empty()).expect("Request"))
        .await
        .expect("Response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("Body");
    let sessions: Value = serde_json::from_slice(&body).expect("JSON body");
    assert_eq!(sessions[0]["key"], "lobby");
    assert_eq!(sessions[0]["moves"], 0);
    assert_eq!(sessions[0]["first_mover_present"], false);
}
