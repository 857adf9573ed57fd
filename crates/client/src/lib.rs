//! CampusMarket real-time messaging core.
//!
//! Headless client library for the marketplace's chat and notification
//! subsystem. It owns connection management and reconciliation; rendering
//! surfaces (inbox, chat view, toasts) consume its typed state and event
//! streams and never touch sockets directly.
//!
//! Reads flow one way: the REST history snapshot seeds the transcript and
//! live socket deltas append to it. Writes also flow one way: user input
//! goes out over the socket and enters the transcript when the server
//! broadcasts it back to the room. There is no optimistic local echo.
//!
//! # Components
//!
//! - [`ClientConfig`]: backend endpoints and URL construction
//! - [`TokenProvider`]: seam to the external identity platform
//! - [`ApiClient`]: room directory and message history over REST
//! - [`ws`]: per-room and global socket connections
//! - [`Transcript`]: history/live reconciliation per room
//! - [`NotificationService`]: process-wide notification feed
//! - [`ChatClient`] / [`RoomSession`]: session orchestration

pub mod api_client;
pub mod config;
pub mod notifications;
pub mod session;
pub mod stores;
pub mod token;
pub mod ws;

pub use campusmarket_shared as shared;

pub use api_client::ApiClient;
pub use config::ClientConfig;
pub use notifications::NotificationService;
pub use session::{ChatClient, RoomPhase, RoomSession, RoomUpdate};
pub use stores::Transcript;
pub use token::{StaticToken, TokenProvider};
pub use ws::{ChatSocket, Endpoint, SocketEvent};
