//! Process-wide notification service over the global socket.
//!
//! Exactly one instance exists per authenticated session, constructed at
//! the application root and started/stopped with the session lifecycle.
//! Components subscribe to its event stream; they never open their own
//! global connection.

use std::sync::{Arc, Mutex};

use campusmarket_shared::{GlobalFrame, InboundFrame, Notification};
use tokio::sync::{broadcast, mpsc};

use crate::config::ClientConfig;
use crate::ws::{self, ChatSocket, Endpoint, SocketEvent};

/// Fan-out capacity; a lagging subscriber loses oldest toasts, not the feed.
const CHANNEL_CAPACITY: usize = 100;

/// Cap on the in-memory recent list. The feed is a live-session
/// convenience, not a notification of record.
const RECENT_CAP: usize = 100;

#[derive(Debug, Default)]
struct FeedState {
    /// Most-recent-first.
    recent: Vec<Notification>,
    /// Room the user is currently viewing; its notifications are
    /// suppressed (the room socket already updates that transcript).
    active_room: Option<i64>,
}

/// Owner of the global notification channel and the in-memory feed.
pub struct NotificationService {
    feed: Arc<Mutex<FeedState>>,
    events: broadcast::Sender<Notification>,
    socket: Mutex<Option<ChatSocket>>,
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationService {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            feed: Arc::new(Mutex::new(FeedState::default())),
            events,
            socket: Mutex::new(None),
        }
    }

    /// Open the global socket with the given credential.
    ///
    /// Any previous connection (e.g. from a stale token) is closed first;
    /// the feed starts empty for the new session.
    pub fn start(&self, config: &ClientConfig, token: &str) {
        let (socket, event_rx) = ws::connect(config, Endpoint::Global, token);

        {
            let mut guard = self.socket.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(prev) = guard.replace(socket) {
                prev.close();
            }
        }
        {
            let mut feed = self.feed.lock().unwrap_or_else(|e| e.into_inner());
            feed.recent.clear();
        }

        tokio::spawn(run_feed(event_rx, self.feed.clone(), self.events.clone()));
    }

    /// Close the global socket and clear the feed. Idempotent; called on
    /// logout or token loss.
    pub fn stop(&self) {
        let prev = {
            let mut guard = self.socket.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(socket) = prev {
            socket.close();
        }
        let mut feed = self.feed.lock().unwrap_or_else(|e| e.into_inner());
        feed.recent.clear();
        feed.active_room = None;
    }

    /// Subscribe to live notifications (toast display).
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    /// Snapshot of the recent list, most-recent-first.
    pub fn recent(&self) -> Vec<Notification> {
        self.feed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recent
            .clone()
    }

    /// Mark which room the user is actively viewing, or `None` for no room.
    ///
    /// Notifications for the active room are filtered here on the client;
    /// its transcript updates through the room socket, so a toast would be
    /// redundant.
    pub fn set_active_room(&self, rid: Option<i64>) {
        self.feed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .active_room = rid;
    }

    /// Clear the active room, but only if it is still `rid`. A session that
    /// was superseded must not clobber its successor's registration.
    pub fn clear_active_room(&self, rid: i64) {
        let mut feed = self.feed.lock().unwrap_or_else(|e| e.into_inner());
        if feed.active_room == Some(rid) {
            feed.active_room = None;
        }
    }
}

async fn run_feed(
    mut events: mpsc::UnboundedReceiver<SocketEvent>,
    feed: Arc<Mutex<FeedState>>,
    out: broadcast::Sender<Notification>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Message(InboundFrame::Global(frame)) => {
                deliver(&feed, &out, frame);
            }
            SocketEvent::Message(InboundFrame::Room(_)) => {
                tracing::warn!("room frame on the global socket");
            }
            SocketEvent::Opened => {
                tracing::info!("global notification socket connected");
            }
            SocketEvent::Denied(reason) => {
                tracing::warn!("global notification socket denied: {reason}");
            }
            SocketEvent::Error(reason) => {
                tracing::warn!("global notification socket error: {reason}");
            }
            SocketEvent::Closed => break,
        }
    }
    tracing::info!("global notification socket disconnected");
}

/// Apply one incoming notification: suppress it for the active room,
/// otherwise record it and fan it out to subscribers exactly once.
fn deliver(feed: &Mutex<FeedState>, out: &broadcast::Sender<Notification>, frame: GlobalFrame) {
    let notification = frame.into_notification();
    {
        let mut state = feed.lock().unwrap_or_else(|e| e.into_inner());
        let viewing = state
            .active_room
            .is_some_and(|rid| rid.to_string() == notification.room);
        if viewing {
            return;
        }
        state.recent.insert(0, notification.clone());
        state.recent.truncate(RECENT_CAP);
    }
    // No subscribers is fine; the recent list still records it.
    let _ = out.send(notification);
}
