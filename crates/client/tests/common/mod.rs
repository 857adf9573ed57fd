#![allow(dead_code)]

//! In-process stub of the marketplace backend: the four messaging REST
//! endpoints plus the chat and global socket routes, with just enough
//! behavior to exercise the client (bearer/query-token auth, idempotent
//! room creation, echo broadcast, global notification fan-out).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use campusmarket_client::ClientConfig;

pub const TOKEN: &str = "test-token";

const CHANNEL_CAPACITY: usize = 100;

pub struct StubBackend {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
}

impl StubBackend {
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(format!("127.0.0.1:{}", self.addr.port()))
    }
}

pub struct StubState {
    rooms: Mutex<HashMap<i64, Value>>,
    pairs: Mutex<HashMap<(i64, String), i64>>,
    history: Mutex<HashMap<i64, Vec<Value>>>,
    channels: Mutex<HashMap<i64, broadcast::Sender<String>>>,
    global: broadcast::Sender<String>,
    connections: Mutex<HashMap<i64, usize>>,
    next_rid: AtomicI64,
    pub fail_history: AtomicBool,
    mid_fetch: Mutex<Option<(String, String)>>,
}

impl StubState {
    fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            pairs: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            global: broadcast::channel(CHANNEL_CAPACITY).0,
            connections: Mutex::new(HashMap::new()),
            next_rid: AtomicI64::new(42),
            fail_history: AtomicBool::new(false),
            mid_fetch: Mutex::new(None),
        }
    }

    fn channel(&self, rid: i64) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(rid)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Number of live chat sockets for a room.
    pub fn live_connections(&self, rid: i64) -> usize {
        *self.connections.lock().unwrap().get(&rid).unwrap_or(&0)
    }

    /// Pre-populate a room's persisted history.
    pub fn seed_history(&self, rid: i64, sender: &str, content: &str, time_sent: &str) {
        self.history.lock().unwrap().entry(rid).or_default().push(json!({
            "sender": sender,
            "content": content,
            "timeSent": time_sent,
        }));
    }

    /// Push a frame to a room's live channel, as if another member sent it.
    pub fn broadcast_room_frame(&self, rid: i64, sender: &str, message: &str, time_sent: &str) {
        let frame = json!({
            "sender": sender,
            "message": message,
            "timeSent": time_sent,
        });
        let _ = self.channel(rid).send(frame.to_string());
    }

    /// Push a raw text payload to a room's live channel, bypassing frame
    /// construction. Used to exercise client-side boundary validation.
    pub fn broadcast_room_frame_raw(&self, rid: i64, text: &str) {
        let _ = self.channel(rid).send(text.to_string());
    }

    /// Arrange for a message to land (persist + broadcast) during the next
    /// history fetch, after its snapshot is taken. The broadcast waits for
    /// the room socket to subscribe, so the frame is carried live.
    pub fn inject_during_history_fetch(&self, sender: &str, message: &str) {
        *self.mid_fetch.lock().unwrap() = Some((sender.to_string(), message.to_string()));
    }

    /// Push a notification to the global channel.
    pub fn broadcast_global(&self, sender: &str, message: &str, room: &str) {
        let frame = json!({
            "sender": sender,
            "message": message,
            "room": room,
        });
        let _ = self.global.send(frame.to_string());
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub async fn start() -> StubBackend {
    init_tracing();
    let state = Arc::new(StubState::new());

    let app = Router::new()
        .route("/api/message/get_rooms/", get(get_rooms))
        .route("/api/message/get_room/{rid}", get(get_room))
        .route("/api/message/get_messages/{rid}", get(get_messages))
        .route("/api/message/get_or_create_room/", post(get_or_create_room))
        .route("/ws/chat/{rid}/", get(chat_ws))
        .route("/ws/global/", get(global_ws))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubBackend { addr, state }
}

fn authed(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TOKEN}"))
        .unwrap_or(false)
}

async fn get_rooms(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    if !authed(&headers) {
        return Err((StatusCode::UNAUTHORIZED, "invalid token".to_string()));
    }
    let rooms: Vec<Value> = state.rooms.lock().unwrap().values().cloned().collect();
    Ok(Json(Value::Array(rooms)))
}

async fn get_room(
    State(state): State<Arc<StubState>>,
    Path(rid): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    if !authed(&headers) {
        return Err((StatusCode::UNAUTHORIZED, "invalid token".to_string()));
    }
    state
        .rooms
        .lock()
        .unwrap()
        .get(&rid)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("no room {rid}")))
}

async fn get_messages(
    State(state): State<Arc<StubState>>,
    Path(rid): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    if !authed(&headers) {
        return Err((StatusCode::UNAUTHORIZED, "invalid token".to_string()));
    }
    if state.fail_history.load(Ordering::SeqCst) {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "history store down".to_string()));
    }
    let snapshot = state
        .history
        .lock()
        .unwrap()
        .get(&rid)
        .cloned()
        .unwrap_or_default();

    // The snapshot above is already taken, so the injected message reaches
    // the client only through its live socket.
    let injected = state.mid_fetch.lock().unwrap().take();
    if let Some((sender, message)) = injected {
        for _ in 0..100 {
            if state.live_connections(rid) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        let time_sent = Utc::now().to_rfc3339();
        state.history.lock().unwrap().entry(rid).or_default().push(json!({
            "sender": sender,
            "content": message,
            "timeSent": time_sent,
        }));
        let _ = state.channel(rid).send(
            json!({"sender": sender, "message": message, "timeSent": time_sent}).to_string(),
        );
    }

    Ok(Json(Value::Array(snapshot)))
}

async fn get_or_create_room(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if !authed(&headers) {
        return Err((StatusCode::UNAUTHORIZED, "invalid token".to_string()));
    }
    let (Some(listing_id), Some(buyer_id)) = (
        body.get("listingId").and_then(Value::as_i64),
        body.get("buyerId").and_then(Value::as_str),
    ) else {
        return Err((StatusCode::BAD_REQUEST, "malformed body".to_string()));
    };

    // Lock held across lookup and insert so concurrent calls for the same
    // pair observe one room.
    let mut pairs = state.pairs.lock().unwrap();
    let rid = match pairs.get(&(listing_id, buyer_id.to_string())) {
        Some(rid) => *rid,
        None => {
            let rid = state.next_rid.fetch_add(1, Ordering::SeqCst);
            pairs.insert((listing_id, buyer_id.to_string()), rid);
            state.rooms.lock().unwrap().insert(
                rid,
                json!({
                    "rid": rid,
                    "listingId": listing_id,
                    "listingName": format!("Listing {listing_id}"),
                    "seller": "seller",
                    "buyer": buyer_id,
                }),
            );
            rid
        }
    };
    Ok(Json(json!({ "roomId": rid })))
}

async fn chat_ws(
    State(state): State<Arc<StubState>>,
    Path(rid): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Result<Response, (StatusCode, String)> {
    if params.get("token").map(String::as_str) != Some(TOKEN) {
        return Err((StatusCode::UNAUTHORIZED, "invalid token".to_string()));
    }
    Ok(ws.on_upgrade(move |socket| handle_chat(socket, state, rid)))
}

async fn handle_chat(socket: WebSocket, state: Arc<StubState>, rid: i64) {
    let tx = state.channel(rid);
    let mut rx = tx.subscribe();
    // Counted only once subscribed: a nonzero count means broadcast frames
    // are being carried to this socket.
    *state.connections.lock().unwrap().entry(rid).or_insert(0) += 1;

    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Ok(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                    continue;
                };
                let (Some(from), Some(message)) = (
                    value.get("sender").and_then(Value::as_str),
                    value.get("message").and_then(Value::as_str),
                ) else {
                    continue;
                };

                let time_sent = Utc::now().to_rfc3339();
                state.history.lock().unwrap().entry(rid).or_default().push(json!({
                    "sender": from,
                    "content": message,
                    "timeSent": time_sent,
                }));

                // Echo back to every room member, including the sender.
                let _ = tx.send(
                    json!({"sender": from, "message": message, "timeSent": time_sent}).to_string(),
                );
                let _ = state.global.send(
                    json!({"sender": from, "message": message, "room": rid.to_string()}).to_string(),
                );
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    send_task.abort();
    *state.connections.lock().unwrap().entry(rid).or_insert(1) -= 1;
}

async fn global_ws(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Result<Response, (StatusCode, String)> {
    if params.get("token").map(String::as_str) != Some(TOKEN) {
        return Err((StatusCode::UNAUTHORIZED, "invalid token".to_string()));
    }
    Ok(ws.on_upgrade(move |socket| handle_global(socket, state)))
}

async fn handle_global(socket: WebSocket, state: Arc<StubState>) {
    let mut rx = state.global.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Ok(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    send_task.abort();
}
