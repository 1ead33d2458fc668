//! Aggregate sync status published to UI indicators.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Current view of the sync subsystem, consumed by offline/sync indicators.
///
/// The monitor owns `is_online`; the engine and the queue own the remaining
/// fields. All other components only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    /// Completion time of the most recent drain pass (successful or partially
    /// failed), absent until the first drain.
    pub last_sync: Option<DateTime<Utc>>,
    pub pending_actions: usize,
    pub sync_in_progress: bool,
    /// Human-readable summary of the last drain's failures, cleared at the
    /// start of the next drain.
    pub sync_error: Option<String>,
}

impl SyncStatus {
    pub fn initial(is_online: bool) -> Self {
        Self {
            is_online,
            last_sync: None,
            pending_actions: 0,
            sync_in_progress: false,
            sync_error: None,
        }
    }
}

/// Single-value broadcast of [`SyncStatus`].
///
/// Updates go through [`StatusPublisher::update`], which replaces the whole
/// value atomically under the watch channel's lock, so observers never see a
/// partially updated status.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<SyncStatus>,
}

impl StatusPublisher {
    pub fn new(initial: SyncStatus) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Subscribe to status changes. The receiver always holds the latest value.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    /// Snapshot of the current status.
    pub fn current(&self) -> SyncStatus {
        self.tx.borrow().clone()
    }

    /// Mutate-and-publish in one atomic replacement.
    pub fn update(&self, mutate: impl FnOnce(&mut SyncStatus)) {
        self.tx.send_modify(mutate);
    }
}
