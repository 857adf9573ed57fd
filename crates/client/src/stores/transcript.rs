//! Reconciled transcript for a single room.
//!
//! Two independent sources feed a room's transcript: the REST history
//! snapshot and live socket deliveries, and the two may race. The snapshot
//! is authoritative for everything up to "now" and replaces the sequence
//! wholesale. Socket frames are appended in delivery order. Sends are
//! echoed back through the socket rather than added optimistically, so the
//! only remaining duplicate source is a frame that raced the snapshot.
//! Those are dropped by matching on the (sender, content, timestamp)
//! triple the server stamps on every frame.

use campusmarket_shared::ChatMessage;

/// Monotonically growing, de-duplicated message sequence for one room.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    loaded: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the transcript with the REST history snapshot, oldest first.
    ///
    /// The backend owns ordering; the client does not re-sort. Marks the
    /// transcript as loaded.
    pub fn set_history(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.loaded = true;
    }

    /// Append a socket-delivered message in delivery order.
    ///
    /// Never reorders: transport delivery order is the transcript order.
    /// Returns false when the message duplicates an existing entry (same
    /// sender, content, and timestamp) and was dropped.
    pub fn append(&mut self, msg: ChatMessage) -> bool {
        if self.messages.contains(&msg) {
            return false;
        }
        self.messages.push(msg);
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether the history snapshot has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}
