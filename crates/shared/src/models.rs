//! Data model for the CampusMarket messaging subsystem.
//!
//! Wire field names are camelCase to match the marketplace backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat conversation scoped to one listing and one (seller, buyer) pair.
///
/// At most one room exists per (listing, buyer) pair: creation is
/// idempotent on the backend, and `get_or_create_room` returns the existing
/// room id when the pair already has one. Rooms are never deleted by this
/// subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Server-assigned room id, stable for the lifetime of the pairing.
    pub rid: i64,
    pub listing_id: i64,
    /// Listing title snapshot taken when the room was created.
    pub listing_name: String,
    pub seller: String,
    pub buyer: String,
    /// Preview of the most recent message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_message: Option<String>,
}

/// A single message in a room's transcript.
///
/// Messages are append-only and immutable; `time_sent` is server-assigned
/// and used for display and de-duplication, never for client-side
/// re-sorting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub time_sent: DateTime<Utc>,
}

/// An ephemeral "message arrived in room R" event from the global socket.
///
/// Not persisted and not replayed after restart; this is a live-session
/// convenience, not a notification of record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub sender: String,
    pub message: String,
    pub room: String,
}

/// Body of `POST /api/message/get_or_create_room/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetOrCreateRoomRequest {
    pub listing_id: i64,
    pub buyer_id: String,
}

/// Response of `POST /api/message/get_or_create_room/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetOrCreateRoomResponse {
    pub room_id: i64,
}
