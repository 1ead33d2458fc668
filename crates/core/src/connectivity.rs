//! Platform connectivity signal contract.

use tokio::sync::watch;

/// Platform primitive reporting the current online/offline state and emitting
/// transition events. Browser `online`/`offline` events or OS reachability
/// callbacks are adapted to this trait by the embedding application.
pub trait ConnectivitySignal: Send + Sync {
    /// Last known connectivity state.
    fn is_online(&self) -> bool;

    /// Subscribe to state changes. Receivers observe the latest value; the
    /// network monitor deduplicates repeated emissions of the same state.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Manually driven connectivity signal.
///
/// Platform glue feeds OS/browser events into [`ManualConnectivity::set_online`];
/// tests use it to script offline/online transitions.
#[derive(Debug)]
pub struct ManualConnectivity {
    tx: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(initial_online: bool) -> Self {
        let (tx, _) = watch::channel(initial_online);
        Self { tx }
    }

    /// Publish a connectivity state observed from the platform.
    pub fn set_online(&self, online: bool) {
        // send() only errors when every receiver is gone; the state still
        // lands in the channel for future subscribers.
        let _ = self.tx.send(online);
    }
}

impl ConnectivitySignal for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
