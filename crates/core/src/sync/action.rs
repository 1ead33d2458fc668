//! Pending mutation records deferred while offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::transport::HttpMethod;

/// Fixed replay-attempt ceiling. An action that fails this many times is
/// evicted from the queue unconditionally; the drop is reflected in the
/// aggregate sync error summary.
pub const RETRY_CEILING: u32 = 3;

/// Mutation semantics an action carries against the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Upload,
    Update,
    Delete,
}

impl ActionKind {
    /// HTTP verb used when replaying this action.
    pub fn method(&self) -> HttpMethod {
        match self {
            Self::Upload => HttpMethod::Post,
            Self::Update => HttpMethod::Put,
            Self::Delete => HttpMethod::Delete,
        }
    }
}

/// One durable record of a mutating operation that could not be sent while
/// offline. FIFO by `enqueued_at`; replay order is enqueue order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub endpoint: String,
    /// Opaque JSON body to send; absent for deletes.
    pub payload: Option<Value>,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl PendingAction {
    /// Create a fresh action with a generated id and a zero retry count.
    pub fn new(kind: ActionKind, endpoint: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            endpoint: endpoint.into(),
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }
}
