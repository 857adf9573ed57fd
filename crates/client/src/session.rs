//! Session orchestration: the authenticated client, per-room sessions, and
//! the connection lifecycle invariants.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use campusmarket_shared::{ChatError, ChatMessage, InboundFrame, OutgoingFrame, Room};
use tokio::sync::{mpsc, oneshot};

use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::notifications::NotificationService;
use crate::stores::Transcript;
use crate::token::TokenProvider;
use crate::ws::{self, ChatSocket, Endpoint, SocketEvent};

/// Lifecycle of one room connection.
///
/// `Idle → FetchingHistory → HistoryLoaded → SocketConnecting → SocketOpen
/// → Closed`. Sending is permitted only in `SocketOpen`. Every transition
/// into `Closed` is terminal for the handle; reopening the room starts a
/// fresh session from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Idle,
    FetchingHistory,
    HistoryLoaded,
    SocketConnecting,
    SocketOpen,
    Closed,
}

/// Updates produced by driving a [`RoomSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum RoomUpdate {
    /// The room socket is open; sending is now permitted.
    Opened,
    /// A new message entered the transcript.
    Message(ChatMessage),
    /// The socket handshake was rejected. Terminal.
    Denied(String),
    /// Non-fatal socket error (e.g. a dropped malformed frame), or a failed
    /// history fetch (terminal; check [`RoomSession::error`]).
    Error(String),
    /// The connection closed. Terminal; reopen to continue.
    Closed,
}

type SocketRegistry = Arc<Mutex<HashMap<i64, Arc<ChatSocket>>>>;

/// Top-level client for the messaging subsystem.
///
/// Owns the backend configuration, the token provider seam, the global
/// notification service, and the registry that enforces at most one live
/// socket per room.
pub struct ChatClient {
    config: ClientConfig,
    tokens: Arc<dyn TokenProvider>,
    display_name: String,
    rooms: SocketRegistry,
    notifications: Arc<NotificationService>,
}

impl ChatClient {
    pub fn new(
        config: ClientConfig,
        tokens: Arc<dyn TokenProvider>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            config,
            tokens,
            display_name: display_name.into(),
            rooms: Arc::new(Mutex::new(HashMap::new())),
            notifications: Arc::new(NotificationService::new()),
        }
    }

    /// REST client carrying a fresh bearer credential.
    pub async fn api(&self) -> Result<ApiClient, ChatError> {
        let token = self.tokens.fresh_token().await?;
        Ok(ApiClient::new()
            .with_base_url(self.config.api_base_url())
            .with_bearer(token))
    }

    /// List the caller's rooms, newest activity first.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, ChatError> {
        self.api().await?.get_rooms().await
    }

    /// Get or create the room for a (listing, buyer) pair and return its
    /// id. Safe to repeat; the backend guarantees idempotency.
    pub async fn start_chat(&self, listing_id: i64, buyer_id: &str) -> Result<i64, ChatError> {
        self.api().await?.get_or_create_room(listing_id, buyer_id).await
    }

    /// Mount a room: open the room socket, fetch metadata and history, and
    /// return a session that reconciles the two feeds.
    ///
    /// The socket is opened before the history snapshot is requested.
    /// Frames that arrive while the fetch is in flight are held by the
    /// session and replayed once the snapshot is applied, so a message
    /// landing mid-fetch is never lost; the transcript's de-duplication
    /// absorbs the overlap between the two feeds. A failed history fetch
    /// surfaces as a terminal error update, never as an empty transcript.
    /// If this room already has a live socket, it is closed before the new
    /// one opens (at most one connection per room).
    pub async fn open_room(&self, rid: i64) -> Result<RoomSession, ChatError> {
        let token = self.tokens.fresh_token().await?;
        let api = ApiClient::new()
            .with_base_url(self.config.api_base_url())
            .with_bearer(&token);

        let (socket, events) = ws::connect(&self.config, Endpoint::Room(rid), &token);
        let socket = Arc::new(socket);

        let previous = {
            let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
            rooms.insert(rid, socket.clone())
        };
        if let Some(previous) = previous {
            tracing::debug!(rid, "closing superseded room socket");
            previous.close();
        }

        // Metadata and history are independent; fetch them in parallel.
        let (history_tx, history_rx) = oneshot::channel();
        {
            let api = api.clone();
            tokio::spawn(async move {
                let _ = history_tx.send(api.get_messages(rid).await);
            });
        }

        let room = match api.get_room(rid).await {
            Ok(room) => room,
            Err(e) => {
                socket.close();
                let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(current) = rooms.get(&rid) {
                    if Arc::ptr_eq(current, &socket) {
                        rooms.remove(&rid);
                    }
                }
                return Err(e);
            }
        };

        self.notifications.set_active_room(Some(rid));

        let mut session = RoomSession {
            room,
            sender: self.display_name.clone(),
            phase: RoomPhase::Idle,
            transcript: Transcript::new(),
            socket,
            events,
            events_open: true,
            history: None,
            pending: Vec::new(),
            rooms: self.rooms.clone(),
            notifications: self.notifications.clone(),
            error: None,
        };
        session.await_history(history_rx);
        Ok(session)
    }

    /// Open the global notification channel for this session.
    pub async fn start_notifications(&self) -> Result<(), ChatError> {
        let token = self.tokens.fresh_token().await?;
        self.notifications.start(&self.config, &token);
        Ok(())
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Tear down every connection: all room sockets and the global channel.
    /// Called on logout or token invalidation.
    pub fn shutdown(&self) {
        let sockets: Vec<_> = {
            let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
            rooms.drain().map(|(_, s)| s).collect()
        };
        for socket in sockets {
            socket.close();
        }
        self.notifications.stop();
    }
}

type HistoryResult = Result<Vec<ChatMessage>, ChatError>;

/// One mounted room view: reconciled transcript plus the live socket.
///
/// Dropping the session closes its socket and releases its registrations,
/// so teardown is tied to the owning view's unmount.
pub struct RoomSession {
    room: Room,
    sender: String,
    phase: RoomPhase,
    transcript: Transcript,
    socket: Arc<ChatSocket>,
    events: mpsc::UnboundedReceiver<SocketEvent>,
    events_open: bool,
    history: Option<oneshot::Receiver<HistoryResult>>,
    /// Socket events held back until the history snapshot is applied.
    pending: Vec<SocketEvent>,
    rooms: SocketRegistry,
    notifications: Arc<NotificationService>,
    error: Option<ChatError>,
}

impl RoomSession {
    /// Track an in-flight history fetch. Socket events are buffered until
    /// the snapshot lands and are replayed through the transcript after it.
    fn await_history(&mut self, history: oneshot::Receiver<HistoryResult>) {
        self.history = Some(history);
        self.phase = RoomPhase::FetchingHistory;
    }

    /// Drive the session: wait for the next socket event or the history
    /// snapshot and fold it into the transcript and phase. Returns `None`
    /// once the event stream ends.
    pub async fn next(&mut self) -> Option<RoomUpdate> {
        loop {
            if self.transcript.is_loaded() {
                // Replay events held back while the snapshot was in flight.
                while !self.pending.is_empty() {
                    let event = self.pending.remove(0);
                    if let Some(update) = self.fold(event) {
                        return Some(update);
                    }
                }
            }

            if let Some(mut rx) = self.history.take() {
                if self.events_open {
                    tokio::select! {
                        res = &mut rx => {
                            if let Some(update) = self.apply_history(res) {
                                return Some(update);
                            }
                        }
                        event = self.events.recv() => {
                            self.history = Some(rx);
                            match event {
                                Some(event) => self.pending.push(event),
                                None => self.events_open = false,
                            }
                        }
                    }
                } else {
                    let res = (&mut rx).await;
                    if let Some(update) = self.apply_history(res) {
                        return Some(update);
                    }
                }
                continue;
            }

            if self.phase == RoomPhase::HistoryLoaded {
                // Snapshot applied; the handshake outcome is still pending.
                self.phase = RoomPhase::SocketConnecting;
            }

            let Some(event) = self.events.recv().await else {
                self.phase = RoomPhase::Closed;
                return None;
            };
            if let Some(update) = self.fold(event) {
                return Some(update);
            }
        }
    }

    fn apply_history(
        &mut self,
        res: Result<HistoryResult, oneshot::error::RecvError>,
    ) -> Option<RoomUpdate> {
        self.history = None;
        let error = match res {
            Ok(Ok(history)) => {
                self.transcript.set_history(history);
                self.phase = RoomPhase::HistoryLoaded;
                return None;
            }
            Ok(Err(e)) => e,
            Err(_) => ChatError::ServiceUnavailable("history fetch was dropped".to_string()),
        };
        // The view must show "couldn't load", not "no messages".
        self.error = Some(error.clone());
        self.teardown();
        Some(RoomUpdate::Error(error.to_string()))
    }

    fn fold(&mut self, event: SocketEvent) -> Option<RoomUpdate> {
        match event {
            SocketEvent::Opened => {
                if self.phase == RoomPhase::Closed {
                    return None;
                }
                self.phase = RoomPhase::SocketOpen;
                Some(RoomUpdate::Opened)
            }
            SocketEvent::Message(InboundFrame::Room(frame)) => {
                let msg = frame.into_message();
                if self.transcript.append(msg.clone()) {
                    Some(RoomUpdate::Message(msg))
                } else {
                    // Duplicate of the history snapshot; already reconciled.
                    None
                }
            }
            SocketEvent::Message(InboundFrame::Global(_)) => {
                tracing::warn!(rid = self.room.rid, "global frame on a room socket");
                None
            }
            SocketEvent::Denied(reason) => {
                self.error = Some(ChatError::ConnectionDenied(reason.clone()));
                self.teardown();
                Some(RoomUpdate::Denied(reason))
            }
            SocketEvent::Error(reason) => Some(RoomUpdate::Error(reason)),
            SocketEvent::Closed => {
                self.teardown();
                Some(RoomUpdate::Closed)
            }
        }
    }

    /// Send a message to the room, fire-and-forget.
    ///
    /// Permitted only while the socket is open; the text is trimmed and
    /// must be non-empty. The message shows up in the transcript when the
    /// server echoes it back, keeping the displayed order identical to the
    /// server-accepted order.
    pub fn send(&self, text: &str) -> Result<(), ChatError> {
        if self.phase != RoomPhase::SocketOpen {
            return Err(ChatError::ConnectionDenied(
                "room socket is not open".to_string(),
            ));
        }
        self.socket.send(OutgoingFrame {
            sender: self.sender.clone(),
            message: text.to_string(),
        })
    }

    /// Close the room socket. Idempotent; the session is terminal after.
    pub fn close(&mut self) {
        self.teardown();
    }

    /// Release everything this session holds: close the socket, drop the
    /// registry entry, and clear the active-room registration. Skipped for
    /// state a newer session for the same room has taken over.
    fn teardown(&mut self) {
        self.phase = RoomPhase::Closed;
        self.socket.close();
        let ours = {
            let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
            match rooms.get(&self.room.rid) {
                Some(current) if Arc::ptr_eq(current, &self.socket) => {
                    rooms.remove(&self.room.rid);
                    true
                }
                _ => false,
            }
        };
        if ours {
            self.notifications.clear_active_room(self.room.rid);
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Reconciled transcript, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    /// Terminal error, if the session ended abnormally.
    pub fn error(&self) -> Option<&ChatError> {
        self.error.as_ref()
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
