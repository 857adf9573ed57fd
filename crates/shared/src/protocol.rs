//! Socket wire protocol: typed frames for the per-room chat channel and the
//! global notification channel.
//!
//! Frames are validated at the network boundary: an undecodable payload is
//! rejected as [`ChatError::MalformedFrame`] instead of propagating missing
//! fields into client state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChatError, ChatMessage, Notification};

/// Which socket endpoint a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Per-room chat channel (`/ws/chat/{rid}/`).
    Room,
    /// Global notification channel (`/ws/global/`).
    Global,
}

/// Incoming frame on a room channel: `{sender, message, timeSent}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomFrame {
    pub sender: String,
    pub message: String,
    pub time_sent: DateTime<Utc>,
}

impl RoomFrame {
    /// Convert an echoed frame into a transcript message.
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            sender: self.sender,
            content: self.message,
            time_sent: self.time_sent,
        }
    }
}

/// Outgoing frame on a room channel: `{sender, message}`.
///
/// The timestamp is server-assigned; the sender's own copy only enters the
/// transcript when the server echoes it back as a [`RoomFrame`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingFrame {
    pub sender: String,
    pub message: String,
}

impl OutgoingFrame {
    pub fn encode(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(|e| ChatError::MalformedFrame(e.to_string()))
    }
}

/// Incoming frame on the global channel: `{sender, message, room}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalFrame {
    pub sender: String,
    pub message: String,
    pub room: String,
}

impl GlobalFrame {
    pub fn into_notification(self) -> Notification {
        Notification {
            sender: self.sender,
            message: self.message,
            room: self.room,
        }
    }
}

/// A decoded incoming frame, tagged by the channel it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Room(RoomFrame),
    Global(GlobalFrame),
}

impl InboundFrame {
    /// Decode a text payload for the given endpoint kind.
    pub fn decode(kind: SocketKind, text: &str) -> Result<Self, ChatError> {
        match kind {
            SocketKind::Room => serde_json::from_str::<RoomFrame>(text)
                .map(InboundFrame::Room)
                .map_err(|e| ChatError::MalformedFrame(e.to_string())),
            SocketKind::Global => serde_json::from_str::<GlobalFrame>(text)
                .map(InboundFrame::Global)
                .map_err(|e| ChatError::MalformedFrame(e.to_string())),
        }
    }
}

/// Check if a host is a local/development address.
pub fn is_local_address(host: &str) -> bool {
    let host_part = host.split(':').next().unwrap_or(host);
    host_part == "localhost"
        || host_part == "127.0.0.1"
        || host_part == "0.0.0.0"
        || host_part.starts_with("192.168.")
        || host_part.starts_with("10.")
}
