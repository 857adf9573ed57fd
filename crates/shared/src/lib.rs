//! Shared types for the CampusMarket messaging core: data model, socket
//! wire protocol, and the error taxonomy used by both the REST and socket
//! layers.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
