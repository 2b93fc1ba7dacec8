//! Core type definitions for offsync.
//!
//! This crate defines the small, backend-agnostic types every other layer
//! depends on:
//! - Record identities (locally generated placeholders and
//!   authority-assigned permanent identifiers)
//! - Journal kinds (created, updated, removed)
//!
//! Record contents and journal entries live in `offsync-model`.

mod ids;
mod kind;

pub use ids::{Identity, PLACEHOLDER_PREFIX};
pub use kind::Kind;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("unknown journal kind: {0}")]
    UnknownKind(String),
}
