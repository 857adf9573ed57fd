//! Client configuration and URL construction for the marketplace backend.
//!
//! One backend host serves both the REST API and the socket endpoints; the
//! scheme differs (`http`/`https` vs `ws`/`wss`). Local development hosts
//! get plain `http`/`ws`, anything else is assumed TLS.

use campusmarket_shared::is_local_address;

/// Endpoint configuration for one backend deployment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    domain: String,
}

impl ClientConfig {
    /// Create a config for a backend host.
    ///
    /// Accepts a bare `host[:port]` or a full `http(s)://` base URL.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL for REST calls, e.g. `http://localhost:8000`.
    pub fn api_base_url(&self) -> String {
        if self.domain.contains("://") {
            self.domain.clone()
        } else if is_local_address(&self.domain) {
            format!("http://{}", self.domain)
        } else {
            format!("https://{}", self.domain)
        }
    }

    /// Full URL for a REST path.
    pub fn api_url(&self, path: &str) -> String {
        let base = self.api_base_url();
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Full URL for a socket path, with the scheme mapped to `ws`/`wss`.
    pub fn ws_url(&self, path: &str) -> String {
        let url = self.api_url(path);
        if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            url
        }
    }
}
