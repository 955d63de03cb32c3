//! Error types for the station engine

use thiserror::Error;

/// Construction-time invariant violations.  Once an [`crate::Engine`] exists
/// nothing it does can fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A playlist must always hold at least one track
    #[error("playlist cannot be empty")]
    EmptyPlaylist,

    /// Agent tracks need at least one stand-in URL
    #[error("fallback URL pool cannot be empty")]
    EmptyFallbackPool,
}

/// Failures of the remote catalog lookup.  All of them degrade to a
/// seed-only playlist.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No catalog endpoint configured
    #[error("catalog unavailable")]
    Unavailable,

    /// Endpoint answered with a non-success status
    #[error("catalog returned HTTP {0}")]
    Status(u16),

    /// Body was not a song listing
    #[error("malformed catalog response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Connection, timeout or other transport failure
    #[error("catalog transport error: {0}")]
    Transport(String),
}
