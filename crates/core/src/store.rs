//! Durable store contract and the cached-response model.
//!
//! The store owns three logical namespaces: the pending-action list, cached
//! GET responses, and denormalized entity snapshots for offline reads. Every
//! mutating method must be a single atomic store operation (append,
//! delete-by-key, or row update) so a crash mid-drain never leaves a partial
//! write behind.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::sync::PendingAction;

/// Freshness window for cached GET responses. Entries older than this are
/// ignored when serving offline reads (passive staleness check only).
pub const CACHE_FRESHNESS_HOURS: i64 = 24;

/// Errors surfaced by a [`SyncStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage I/O failure.
    #[error("store I/O error: {0}")]
    Io(String),

    /// A stored blob could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serde(String),
}

impl StoreError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde(message.into())
    }
}

/// One cached GET response, keyed externally by the full endpoint string
/// (query parameters included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse {
    pub data: Value,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Wrap a freshly fetched payload with the current timestamp.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    /// Whether this entry is still inside the freshness window at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now - self.cached_at < Duration::hours(CACHE_FRESHNESS_HOURS)
    }

    /// Whether this entry is still fresh right now.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// Durable key-value capability backing the sync subsystem.
///
/// The pending-action list and the cached-response set are exclusively owned
/// by the store; the queue and engine read and remove through it so state
/// survives process restarts.
#[async_trait]
pub trait SyncStore: Send + Sync {
    // Pending actions (FIFO by enqueue order).

    /// Load the whole pending-action list in FIFO order.
    async fn load_actions(&self) -> Result<Vec<PendingAction>, StoreError>;

    /// Append one action to the end of the durable list.
    async fn append_action(&self, action: &PendingAction) -> Result<(), StoreError>;

    /// Delete one action by id. Deleting a missing id is a no-op.
    async fn remove_action(&self, id: &str) -> Result<(), StoreError>;

    /// Persist an updated retry count for one action.
    async fn set_retry_count(&self, id: &str, retry_count: u32) -> Result<(), StoreError>;

    /// Drop the whole pending-action list.
    async fn clear_actions(&self) -> Result<(), StoreError>;

    // Cached GET responses, keyed by endpoint (query included).

    async fn get_cached(&self, endpoint: &str) -> Result<Option<CachedResponse>, StoreError>;

    async fn put_cached(&self, endpoint: &str, entry: &CachedResponse) -> Result<(), StoreError>;

    async fn remove_cached(&self, endpoint: &str) -> Result<(), StoreError>;

    async fn clear_cached(&self) -> Result<(), StoreError>;

    // Denormalized entity snapshots for offline reads.

    async fn get_snapshot(&self, name: &str) -> Result<Option<Value>, StoreError>;

    async fn put_snapshot(&self, name: &str, data: &Value) -> Result<(), StoreError>;

    async fn clear_snapshots(&self) -> Result<(), StoreError>;
}
