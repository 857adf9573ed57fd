//! Client-side state stores.

pub mod transcript;

pub use transcript::Transcript;
