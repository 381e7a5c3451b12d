//! End-to-end room synchronization tests.
//!
//! Real WebSocket clients against a server on a random port.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sketchpad_server::RateLimitConfig;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use common::TestServer;

struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    async fn connect(server: &TestServer) -> Self {
        let (ws, _) = connect_async(server.ws_url())
            .await
            .expect("failed to connect");
        Self { ws }
    }

    async fn send(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string()))
            .await
            .expect("send failed");
    }

    async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .expect("send failed");
    }

    /// Next JSON text frame, or `None` after a timeout.
    async fn recv_within(&mut self, wait: Duration) -> Option<Value> {
        loop {
            let msg = timeout(wait, self.ws.next()).await.ok()??.ok()?;
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).ok();
            }
        }
    }

    async fn recv(&mut self) -> Value {
        self.recv_within(Duration::from_secs(5))
            .await
            .expect("expected a message")
    }

    async fn join(&mut self, room: &str, username: &str) -> Value {
        self.send(json!({"type": "join-room", "roomId": room, "username": username}))
            .await;
        let initial = self.recv().await;
        assert_eq!(initial["type"], "initial-state");
        initial
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Wait until the server has applied `count` operations to a room.
async fn wait_for_operations(server: &TestServer, room: &str, count: usize) {
    for _ in 0..100 {
        if server.authority().room_snapshot(room).map(|ops| ops.len()) == Some(count) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("room {room} never reached {count} operations");
}

fn stroke(color: &str) -> Value {
    json!({
        "type": "draw",
        "points": [{"x": 10, "y": 10}, {"x": 20, "y": 25.5}],
        "tool": "brush",
        "color": color,
        "strokeWidth": 4
    })
}

#[tokio::test]
async fn join_receives_history_and_roster() {
    let server = TestServer::start().await;

    let mut ada = Client::connect(&server).await;
    let initial = ada.join("studio", "Ada").await;
    assert_eq!(initial["operations"], json!([]));
    assert_eq!(initial["users"].as_array().map(Vec::len), Some(1));
    let ada_color = initial["userColor"].clone();
    assert_eq!(initial["users"][0]["color"], ada_color);

    ada.send(stroke("#ff0000")).await;
    wait_for_operations(&server, "studio", 1).await;

    let mut bob = Client::connect(&server).await;
    let initial = bob.join("studio", "Bob").await;
    let operations = initial["operations"].as_array().expect("operations array");
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0]["color"], "#ff0000");
    assert_eq!(operations[0]["strokeWidth"], 4.0);
    let names: Vec<_> = initial["users"]
        .as_array()
        .expect("users array")
        .iter()
        .map(|u| u["username"].clone())
        .collect();
    assert_eq!(names, vec![json!("Ada"), json!("Bob")]);
    assert_ne!(initial["userColor"], ada_color);

    let joined = ada.recv().await;
    assert_eq!(joined["type"], "user-joined");
    assert_eq!(joined["username"], "Bob");
    assert_eq!(joined["color"], initial["userColor"]);

    ada.close().await;
    bob.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn draw_skips_sender_and_undo_reaches_everyone() {
    let server = TestServer::start().await;

    let mut s = Client::connect(&server).await;
    let mut t = Client::connect(&server).await;
    s.join("scenario", "S").await;
    t.join("scenario", "T").await;
    assert_eq!(s.recv().await["type"], "user-joined");

    s.send(json!({
        "type": "draw",
        "id": "forged",
        "userId": "someone-else",
        "timestamp": 1,
        "points": [{"x": 1, "y": 2}],
        "tool": "eraser",
        "strokeWidth": 30
    }))
    .await;

    let drawn = t.recv().await;
    assert_eq!(drawn["type"], "draw");
    assert_ne!(drawn["id"], "forged");
    assert_ne!(drawn["userId"], "someone-else");
    assert_ne!(drawn["timestamp"], 1);
    assert_eq!(drawn["tool"], "eraser");
    assert!(drawn.get("color").is_none());
    let operation_id = drawn["id"].clone();

    t.send(json!({"type": "undo"})).await;

    // The drawer never saw its own stroke, so its next event is the undo.
    let s_undo = s.recv().await;
    let t_undo = t.recv().await;
    assert_eq!(s_undo, json!({"type": "undo", "operationId": operation_id}));
    assert_eq!(t_undo, s_undo);

    s.close().await;
    t.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn redo_and_clear_reach_everyone() {
    let server = TestServer::start().await;

    let mut a = Client::connect(&server).await;
    let mut b = Client::connect(&server).await;
    a.join("board", "A").await;
    b.join("board", "B").await;
    a.recv().await; // user-joined

    a.send(stroke("#00ff00")).await;
    let drawn = b.recv().await;

    a.send(json!({"type": "undo"})).await;
    assert_eq!(a.recv().await["type"], "undo");
    assert_eq!(b.recv().await["type"], "undo");

    b.send(json!({"type": "redo"})).await;
    let redo_a = a.recv().await;
    let redo_b = b.recv().await;
    assert_eq!(redo_a["type"], "redo");
    assert_eq!(redo_a["operation"]["id"], drawn["id"]);
    assert_eq!(redo_a, redo_b);

    // Nothing left to redo: no broadcast, so the next event is the clear.
    a.send(json!({"type": "redo"})).await;
    b.send(json!({"type": "clear-canvas"})).await;
    assert_eq!(a.recv().await, json!({"type": "clear-canvas"}));
    assert_eq!(b.recv().await, json!({"type": "clear-canvas"}));

    assert_eq!(server.authority().room_snapshot("board"), Some(Vec::new()));

    a.close().await;
    b.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn malformed_frames_are_dropped_silently() {
    let server = TestServer::start().await;

    let mut a = Client::connect(&server).await;
    let mut b = Client::connect(&server).await;
    a.join("quiet", "A").await;
    b.join("quiet", "B").await;
    a.recv().await; // user-joined

    a.send_raw("this is not json").await;
    a.send(json!({"type": "teleport"})).await;
    a.send(json!({
        "type": "draw",
        "points": [{"x": 1, "y": 1}],
        "tool": "brush",
        "color": "#ZZZZZZ",
        "strokeWidth": 4
    }))
    .await;
    a.send(json!({
        "type": "draw",
        "points": [],
        "tool": "brush",
        "color": "#123456",
        "strokeWidth": 4
    }))
    .await;
    a.send(json!({
        "type": "draw",
        "points": [{"x": 1, "y": 1}],
        "tool": "pencil",
        "color": "#123456",
        "strokeWidth": 4
    }))
    .await;
    a.send(stroke("#AbC123")).await;

    let next = b.recv().await;
    assert_eq!(next["type"], "draw");
    assert_eq!(next["color"], "#AbC123");
    assert!(a
        .recv_within(Duration::from_millis(200))
        .await
        .is_none());
    assert_eq!(
        server.authority().room_snapshot("quiet").map(|ops| ops.len()),
        Some(1)
    );

    a.close().await;
    b.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn intents_before_join_are_ignored() {
    let server = TestServer::start().await;

    let mut lurker = Client::connect(&server).await;
    lurker.send(stroke("#123456")).await;
    lurker.send(json!({"type": "clear-canvas"})).await;
    assert!(lurker
        .recv_within(Duration::from_millis(200))
        .await
        .is_none());
    assert!(server.authority().ledgers().is_empty());

    lurker.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn cursor_moves_are_relayed_to_others() {
    let server = TestServer::start().await;

    let mut a = Client::connect(&server).await;
    let mut b = Client::connect(&server).await;
    a.join("cursors", "A").await;
    let initial = b.join("cursors", "B").await;
    let b_id = initial["users"][1]["userId"].clone();
    a.recv().await; // user-joined

    b.send(json!({"type": "cursor-move", "x": 12.5, "y": 40})).await;
    let moved = a.recv().await;
    assert_eq!(
        moved,
        json!({"type": "cursor-move", "userId": b_id, "x": 12.5, "y": 40.0})
    );
    assert!(b.recv_within(Duration::from_millis(200)).await.is_none());

    a.close().await;
    b.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn disconnect_announces_departure_and_keeps_history() {
    let server = TestServer::start().await;

    let mut stay = Client::connect(&server).await;
    let mut go = Client::connect(&server).await;
    stay.join("lounge", "Stay").await;
    let initial = go.join("lounge", "Go").await;
    let go_id = initial["users"][1]["userId"].clone();
    stay.recv().await; // user-joined

    go.send(stroke("#0000ff")).await;
    stay.recv().await; // draw
    go.close().await;

    let left = stay.recv().await;
    assert_eq!(
        left,
        json!({"type": "user-left", "userId": go_id, "username": "Go"})
    );
    assert_eq!(
        server.authority().room_snapshot("lounge").map(|ops| ops.len()),
        Some(1)
    );

    let mut late = Client::connect(&server).await;
    let initial = late.join("lounge", "Late").await;
    assert_eq!(initial["operations"].as_array().map(Vec::len), Some(1));
    assert_eq!(initial["users"].as_array().map(Vec::len), Some(2));

    stay.close().await;
    late.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn switching_rooms_leaves_the_previous_room() {
    let server = TestServer::start().await;

    let mut stayer = Client::connect(&server).await;
    let mut mover = Client::connect(&server).await;
    stayer.join("north", "Stayer").await;
    mover.join("north", "Mover").await;
    stayer.recv().await; // user-joined

    mover.join("south", "Mover").await;
    let left = stayer.recv().await;
    assert_eq!(left["type"], "user-left");
    assert_eq!(left["username"], "Mover");

    mover.send(stroke("#010203")).await;
    assert!(stayer
        .recv_within(Duration::from_millis(200))
        .await
        .is_none());
    assert_eq!(
        server.authority().room_snapshot("south").map(|ops| ops.len()),
        Some(1)
    );

    stayer.close().await;
    mover.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn rate_limited_frames_are_dropped() {
    let server = TestServer::start_with(RateLimitConfig {
        burst: 2,
        sustained: 0,
    })
    .await;

    let mut a = Client::connect(&server).await;
    a.join("limited", "A").await;
    a.send(stroke("#111111")).await;
    a.send(stroke("#222222")).await;
    a.send(stroke("#333333")).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    let colors: Vec<String> = server
        .authority()
        .room_snapshot("limited")
        .expect("room exists")
        .iter()
        .filter_map(|op| op.color().map(str::to_string))
        .collect();
    assert_eq!(colors, vec!["#111111".to_string()]);

    a.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn rooms_api_reports_rooms_and_history() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();

    let mut a = Client::connect(&server).await;
    a.join("gallery", "A").await;
    a.send(stroke("#abcdef")).await;
    a.send(stroke("#fedcba")).await;
    a.send(json!({"type": "undo"})).await;
    assert_eq!(a.recv().await["type"], "undo");

    let rooms: Value = http
        .get(server.http_url("/api/rooms"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(
        rooms,
        json!([{"roomId": "gallery", "operationCount": 1, "undoDepth": 1, "participants": 1}])
    );

    let detail: Value = http
        .get(server.http_url("/api/rooms/gallery"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(detail["roomId"], "gallery");
    assert_eq!(detail["operations"][0]["color"], "#abcdef");

    let missing = http
        .get(server.http_url("/api/rooms/nowhere"))
        .send()
        .await
        .expect("request");
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let health: Value = http
        .get(server.http_url("/health"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["rooms"], 1);

    a.close().await;
    server.shutdown().await;
}
