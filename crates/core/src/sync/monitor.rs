//! Network state tracking with transition deduplication.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::sync::StatusPublisher;

/// Tracks the last known connectivity state and mirrors it into the status
/// publisher. Transitions are deduplicated: repeated emissions of the same
/// state are dropped before they reach observers or trigger a drain.
#[derive(Debug)]
pub struct NetworkMonitor {
    online: AtomicBool,
    status: Arc<StatusPublisher>,
}

impl NetworkMonitor {
    pub fn new(initial_online: bool, status: Arc<StatusPublisher>) -> Self {
        status.update(|s| s.is_online = initial_online);
        Self {
            online: AtomicBool::new(initial_online),
            status,
        }
    }

    /// Last known connectivity state.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Record an observed connectivity state.
    ///
    /// Returns `true` only when the state actually changed; the caller uses
    /// that to fire the engine drain on offline-to-online transitions. The
    /// published `is_online` field is updated synchronously here.
    pub fn note_transition(&self, online: bool) -> bool {
        let changed = self
            .online
            .compare_exchange(!online, online, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !changed {
            return false;
        }

        if online {
            info!("network: online");
        } else {
            warn!("network: offline");
        }
        self.status.update(|s| s.is_online = online);
        true
    }
}
