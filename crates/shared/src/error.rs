//! Error taxonomy shared by the REST clients and the socket layer.

use thiserror::Error;

/// Canonical error type for the messaging core.
///
/// REST-layer failures surface as `Err` values to the caller; socket-layer
/// failures surface as terminal events on the connection's event stream
/// (they occur outside the call stack that opened the connection).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Missing, expired, or rejected bearer credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Room or listing does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Socket handshake rejected, or a send was attempted on a handle that
    /// is not open.
    #[error("connection denied: {0}")]
    ConnectionDenied(String),

    /// Network failure or backend error.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rejected input, e.g. a whitespace-only message body.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A socket payload that failed validation at the network boundary.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

impl ChatError {
    /// Map an HTTP response to the client error taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body.trim())
        };
        match status {
            401 | 403 => ChatError::Unauthorized(detail),
            404 => ChatError::NotFound(detail),
            _ => ChatError::ServiceUnavailable(detail),
        }
    }
}
