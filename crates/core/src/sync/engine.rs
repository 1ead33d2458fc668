//! Drain engine: replays queued mutations once connectivity returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::sync::{
    NetworkMonitor, PendingActionQueue, StatusPublisher, RETRY_CEILING,
};
use crate::transport::Transport;

/// Outcome counters for one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Actions confirmed by the transport and removed from the queue.
    pub replayed: usize,
    /// Failed replay attempts during this pass.
    pub failed: usize,
    /// Actions evicted after reaching the retry ceiling.
    pub dropped: usize,
}

/// Replays the pending-action queue against the remote transport.
///
/// The engine is `Idle` except while one `drain` call is on the stack. An
/// internal guard makes re-entrant drains a no-op, so a snapshot is never
/// double-processed. Individual action failures are retried up to
/// [`RETRY_CEILING`] across passes and never raise to the caller; the only
/// externally visible failure signal is the aggregate `sync_error` summary.
pub struct SyncEngine {
    queue: Arc<PendingActionQueue>,
    transport: Arc<dyn Transport>,
    monitor: Arc<NetworkMonitor>,
    status: Arc<StatusPublisher>,
    draining: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<PendingActionQueue>,
        transport: Arc<dyn Transport>,
        monitor: Arc<NetworkMonitor>,
        status: Arc<StatusPublisher>,
    ) -> Self {
        Self {
            queue,
            transport,
            monitor,
            status,
            draining: AtomicBool::new(false),
        }
    }

    /// Run one drain pass over a FIFO snapshot of the queue.
    ///
    /// Returns immediately when offline, when the queue is empty, or when
    /// another drain is already in flight; none of those paths touches
    /// `sync_in_progress` or `last_sync`.
    pub async fn drain(&self) -> DrainSummary {
        if !self.monitor.is_online() || self.queue.is_empty() {
            return DrainSummary::default();
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("drain already in progress, skipping");
            return DrainSummary::default();
        }

        self.status.update(|s| {
            s.sync_in_progress = true;
            s.sync_error = None;
        });

        let snapshot = self.queue.snapshot();
        info!("draining {} pending actions", snapshot.len());

        let mut summary = DrainSummary::default();
        for action in snapshot {
            let result = self
                .transport
                .request(action.kind.method(), &action.endpoint, action.payload.as_ref())
                .await;

            match result {
                Ok(_) => {
                    self.queue.remove(&action.id).await;
                    summary.replayed += 1;
                }
                Err(err) => {
                    summary.failed += 1;
                    let retries = self.queue.record_failure(&action.id).await;
                    if retries >= RETRY_CEILING {
                        warn!(
                            "dropping action {} ({} {}) after {retries} attempts: {err}",
                            action.id,
                            action.kind.method(),
                            action.endpoint
                        );
                        self.queue.remove(&action.id).await;
                        summary.dropped += 1;
                    } else {
                        warn!(
                            "replay of {} {} failed (attempt {retries}): {err}",
                            action.kind.method(),
                            action.endpoint
                        );
                    }
                }
            }
        }

        let error = Self::summarize(&summary);
        self.status.update(|s| {
            s.sync_in_progress = false;
            s.last_sync = Some(Utc::now());
            s.sync_error = error;
        });
        self.draining.store(false, Ordering::Release);

        summary
    }

    fn summarize(summary: &DrainSummary) -> Option<String> {
        if summary.failed == 0 {
            return None;
        }
        let mut message = format!("{} actions failed to sync", summary.failed);
        if summary.dropped > 0 {
            message.push_str(&format!(
                " ({} dropped after {RETRY_CEILING} attempts)",
                summary.dropped
            ));
        }
        Some(message)
    }
}
