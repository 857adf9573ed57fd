//! HTTP client for the marketplace messaging endpoints.
//!
//! Thin wrapper around `reqwest` that attaches the bearer credential as an
//! `Authorization` header (the socket layer passes it as a query parameter
//! instead; the transport cannot carry headers past the handshake).

use campusmarket_shared::{
    ChatError, ChatMessage, GetOrCreateRoomRequest, GetOrCreateRoomResponse, Room,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// HTTP client for authenticated API requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            token: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the bearer credential attached to every request
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Make an authenticated GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ChatError> {
        let url = self.url(path);
        let mut rb = self.client.get(&url);
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| ChatError::ServiceUnavailable(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ChatError::ServiceUnavailable(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ChatError::from_status(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ChatError::ServiceUnavailable(format!("failed to decode response: {e}")))
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ChatError> {
        let url = self.url(path);
        let mut rb = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| ChatError::ServiceUnavailable(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ChatError::ServiceUnavailable(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ChatError::from_status(status, &text));
        }

        let text = if text.is_empty() { "null".to_string() } else { text };
        serde_json::from_str(&text)
            .map_err(|e| ChatError::ServiceUnavailable(format!("failed to decode response: {e}")))
    }

    // --- Messaging API methods ---

    /// List the caller's rooms, newest activity first.
    ///
    /// Ordering is delegated to the backend; the client does not re-sort.
    pub async fn get_rooms(&self) -> Result<Vec<Room>, ChatError> {
        self.get_json("/api/message/get_rooms/").await
    }

    /// Fetch one room's metadata.
    pub async fn get_room(&self, rid: i64) -> Result<Room, ChatError> {
        self.get_json(&format!("/api/message/get_room/{rid}")).await
    }

    /// Fetch a room's persisted history, oldest first. Used once per
    /// room-view mount to seed the transcript before socket frames arrive.
    pub async fn get_messages(&self, rid: i64) -> Result<Vec<ChatMessage>, ChatError> {
        self.get_json(&format!("/api/message/get_messages/{rid}")).await
    }

    /// Get or create the room for a (listing, buyer) pair.
    ///
    /// Idempotency is a backend guarantee this client depends on: repeated
    /// or concurrent calls with the same arguments return the same room id
    /// and never create a duplicate room.
    pub async fn get_or_create_room(
        &self,
        listing_id: i64,
        buyer_id: &str,
    ) -> Result<i64, ChatError> {
        let req = GetOrCreateRoomRequest {
            listing_id,
            buyer_id: buyer_id.to_string(),
        };
        let resp: GetOrCreateRoomResponse =
            self.post_json("/api/message/get_or_create_room/", &req).await?;
        Ok(resp.room_id)
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}
