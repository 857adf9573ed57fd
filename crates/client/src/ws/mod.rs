//! WebSocket layer for real-time messaging.
//!
//! This module provides:
//! - One managed connection per chat room, plus the global notification
//!   channel
//! - Typed events decoded at the network boundary
//! - Explicit close semantics with no auto-reconnect
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                   ChatClient                     │
//! │   (one socket per open room + global channel)    │
//! └──────────────────────────────────────────────────┘
//!             │                        │
//!             ▼                        ▼
//!      ┌────────────┐          ┌──────────────┐
//!      │ ChatSocket │  ......  │  ChatSocket  │
//!      │ (room 42)  │          │   (global)   │
//!      └────────────┘          └──────────────┘
//!             │                        │
//!             ▼                        ▼
//!      ┌────────────┐          ┌──────────────┐
//!      │ Transcript │          │ Notification │
//!      │ (per room) │          │    feed      │
//!      └────────────┘          └──────────────┘
//! ```
//!
//! Consumers read reconciled state (transcripts, the notification feed);
//! they never touch sockets directly.
//!
//! A dropped connection surfaces as [`SocketEvent::Closed`] and is terminal
//! for that handle. Whether to reopen (token refreshed, view still mounted)
//! is the caller's decision; the socket layer performs no retry of its own.

mod connection;

pub use connection::{connect, ChatSocket, Endpoint, SocketEvent};
