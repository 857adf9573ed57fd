//! Token provider seam for the external identity platform.

use async_trait::async_trait;
use campusmarket_shared::ChatError;

/// Issues short-lived bearer credentials for the current identity.
///
/// The core asks for a fresh token before every socket open and for each
/// batch of REST calls, so a refreshed credential is always used for new
/// work. Connections keep the token they were opened with; on token change
/// the caller closes and reopens them.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently valid bearer credential.
    async fn fresh_token(&self) -> Result<String, ChatError>;
}

/// A fixed token. Useful for tests and short-lived tooling; real
/// deployments wrap the identity platform's refresh flow instead.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn fresh_token(&self) -> Result<String, ChatError> {
        Ok(self.0.clone())
    }
}
