//! Error types for the sync core.

use thiserror::Error;

use crate::store::StoreError;
use crate::transport::TransportError;

/// Result type alias for sync core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can surface from the sync subsystem.
///
/// Note that most failure paths are recovered internally (enqueue, bounded
/// retry, cache fallback) and never reach callers as an `Err`; see the router
/// and engine modules for the exact boundaries.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport failure while believed online.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Durable store failure on a read path that cannot be recovered locally.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
