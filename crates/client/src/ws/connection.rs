//! A single managed WebSocket connection: one chat room or the global
//! notification channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use campusmarket_shared::{ChatError, InboundFrame, OutgoingFrame, SocketKind};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::config::ClientConfig;

/// Socket endpoint selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Per-room chat channel.
    Room(i64),
    /// Process-wide notification channel.
    Global,
}

impl Endpoint {
    pub fn kind(self) -> SocketKind {
        match self {
            Endpoint::Room(_) => SocketKind::Room,
            Endpoint::Global => SocketKind::Global,
        }
    }

    fn path(self) -> String {
        match self {
            Endpoint::Room(rid) => format!("/ws/chat/{rid}/"),
            Endpoint::Global => "/ws/global/".to_string(),
        }
    }
}

/// Events emitted by a connection, in transport delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// Handshake completed; `send` is now permitted.
    Opened,
    /// A frame that passed boundary validation.
    Message(InboundFrame),
    /// Handshake rejected (bad token, or no access to the room). Always
    /// followed by `Closed`.
    Denied(String),
    /// A non-fatal error, e.g. a malformed frame that was dropped. The
    /// connection may still be up.
    Error(String),
    /// Terminal. Reopening requires a fresh [`connect`].
    Closed,
}

/// Handle to one live socket.
///
/// The handle owns the connection: dropping it closes the socket, so a view
/// unmount tears the connection down with it. `close` is idempotent.
pub struct ChatSocket {
    endpoint: Endpoint,
    outgoing: mpsc::UnboundedSender<String>,
    open: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
}

impl ChatSocket {
    /// Enqueue a message frame, fire-and-forget.
    ///
    /// The body is trimmed and must be non-empty; a whitespace-only send is
    /// rejected without any network write. The sender's own copy enters the
    /// transcript only via server echo, never optimistically.
    pub fn send(&self, frame: OutgoingFrame) -> Result<(), ChatError> {
        let trimmed = frame.message.trim();
        if trimmed.is_empty() {
            return Err(ChatError::ValidationError("empty message body".to_string()));
        }
        if !self.is_open() {
            return Err(ChatError::ConnectionDenied("socket is not open".to_string()));
        }

        let json = OutgoingFrame {
            sender: frame.sender,
            message: trimmed.to_string(),
        }
        .encode()?;
        self.outgoing
            .send(json)
            .map_err(|_| ChatError::ConnectionDenied("socket is not open".to_string()))
    }

    /// Whether the handshake has completed and the connection is still up.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Close the connection. Calling this on an already-closed handle is a
    /// no-op; the handle cannot be reopened.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.store(false, Ordering::SeqCst);
            self.shutdown.notify_one();
        }
    }
}

impl Drop for ChatSocket {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open a connection to a socket endpoint.
///
/// Returns immediately; the handshake happens on a background task. A
/// rejected handshake surfaces as [`SocketEvent::Denied`] on the event
/// stream rather than an `Err`, since the failure is asynchronous relative
/// to this call. The bearer credential rides as a `token` query parameter
/// because the transport cannot carry an Authorization header past the
/// handshake.
pub fn connect(
    config: &ClientConfig,
    endpoint: Endpoint,
    token: &str,
) -> (ChatSocket, mpsc::UnboundedReceiver<SocketEvent>) {
    let url = format!(
        "{}?token={}",
        config.ws_url(&endpoint.path()),
        urlencoding::encode(token)
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(Notify::new());

    tokio::spawn(run_connection(
        url,
        endpoint.kind(),
        event_tx,
        out_rx,
        open.clone(),
        shutdown.clone(),
    ));

    let socket = ChatSocket {
        endpoint,
        outgoing: out_tx,
        open,
        shutdown,
        closed: AtomicBool::new(false),
    };
    (socket, event_rx)
}

async fn run_connection(
    url: String,
    kind: SocketKind,
    events: mpsc::UnboundedSender<SocketEvent>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    open: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    let mut ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(tungstenite::Error::Http(response)) => {
            let status = response.status();
            tracing::warn!(?kind, %status, "socket handshake rejected");
            let _ = events.send(SocketEvent::Denied(format!("handshake rejected: {status}")));
            let _ = events.send(SocketEvent::Closed);
            return;
        }
        Err(e) => {
            tracing::warn!(?kind, "socket connect failed: {e}");
            let _ = events.send(SocketEvent::Error(format!("connect failed: {e}")));
            let _ = events.send(SocketEvent::Closed);
            return;
        }
    };

    open.store(true, Ordering::SeqCst);
    let _ = events.send(SocketEvent::Opened);
    tracing::debug!(?kind, "socket opened");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                let _ = ws.close(None).await;
                break;
            }
            msg = outgoing.recv() => {
                match msg {
                    Some(json) => {
                        if let Err(e) = ws.send(Message::text(json)).await {
                            let _ = events.send(SocketEvent::Error(format!("send failed: {e}")));
                            break;
                        }
                    }
                    // Handle dropped without an explicit close.
                    None => {
                        let _ = ws.close(None).await;
                        break;
                    }
                }
            }
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match InboundFrame::decode(kind, text.as_str()) {
                            Ok(frame) => {
                                let _ = events.send(SocketEvent::Message(frame));
                            }
                            Err(e) => {
                                tracing::warn!(?kind, "dropping malformed frame: {e}");
                                let _ = events.send(SocketEvent::Error(e.to_string()));
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary: not part of the protocol
                    Some(Err(e)) => {
                        let _ = events.send(SocketEvent::Error(format!("socket error: {e}")));
                        break;
                    }
                }
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    let _ = events.send(SocketEvent::Closed);
    tracing::debug!(?kind, "socket closed");
}
