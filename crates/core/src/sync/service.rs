//! Assembled offline sync subsystem.

use std::sync::{Arc, Mutex};

use log::debug;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::connectivity::ConnectivitySignal;
use crate::errors::Result;
use crate::store::SyncStore;
use crate::sync::{
    DrainSummary, GetOutcome, MutationResponse, NetworkMonitor, OfflineRouter,
    PendingAction, PendingActionQueue, StatusPublisher, SyncEngine, SyncStatus,
};
use crate::transport::Transport;

/// One explicitly constructed sync subsystem with injected collaborators.
///
/// Callers hold an `Arc<OfflineSyncService>` instead of reaching for module
/// globals, so every embedding (and every test) wires its own transport,
/// store, and connectivity signal.
pub struct OfflineSyncService {
    store: Arc<dyn SyncStore>,
    queue: Arc<PendingActionQueue>,
    engine: Arc<SyncEngine>,
    monitor: Arc<NetworkMonitor>,
    router: OfflineRouter,
    status: Arc<StatusPublisher>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl OfflineSyncService {
    /// Build the subsystem, restore the queue from the store, and start
    /// listening for connectivity transitions. An offline-to-online
    /// transition triggers one automatic drain; manual [`Self::retry_sync`]
    /// is the only other trigger.
    pub async fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn SyncStore>,
        signal: Arc<dyn ConnectivitySignal>,
    ) -> Arc<Self> {
        let status = Arc::new(StatusPublisher::new(SyncStatus::initial(signal.is_online())));
        let monitor = Arc::new(NetworkMonitor::new(signal.is_online(), status.clone()));
        let queue = Arc::new(PendingActionQueue::load(store.clone(), status.clone()).await);
        let engine = Arc::new(SyncEngine::new(
            queue.clone(),
            transport.clone(),
            monitor.clone(),
            status.clone(),
        ));
        let router = OfflineRouter::new(transport, store.clone(), queue.clone(), monitor.clone());

        let listener = spawn_connectivity_listener(signal.subscribe(), monitor.clone(), engine.clone());
        Arc::new(Self {
            store,
            queue,
            engine,
            monitor,
            router,
            status,
            listener: Mutex::new(Some(listener)),
        })
    }

    // Offline-aware verbs.

    pub async fn get(&self, endpoint: &str, fallback: Option<Value>) -> Result<GetOutcome> {
        self.router.get(endpoint, fallback).await
    }

    pub async fn post(&self, endpoint: &str, payload: Value) -> Result<MutationResponse> {
        self.router.post(endpoint, payload).await
    }

    pub async fn put(&self, endpoint: &str, payload: Value) -> Result<MutationResponse> {
        self.router.put(endpoint, payload).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<MutationResponse> {
        self.router.delete(endpoint).await
    }

    // Sync control and introspection.

    /// Manual drain trigger, equivalent to an online transition. Safe to call
    /// while already online and idle; a no-op when the queue is empty.
    pub async fn retry_sync(&self) -> DrainSummary {
        self.engine.drain().await
    }

    /// Subscribe to the aggregate sync status.
    pub fn sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.status.current()
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Copy of the queued actions, for diagnostics.
    pub fn pending_actions(&self) -> Vec<PendingAction> {
        self.queue.snapshot()
    }

    /// Destructive manual reset of the queue.
    pub async fn clear_pending_actions(&self) {
        self.queue.clear().await;
    }

    // Denormalized snapshots and cache management.

    /// Persist a denormalized entity snapshot for offline reads.
    pub async fn store_snapshot(&self, name: &str, data: &Value) -> Result<()> {
        self.store.put_snapshot(name, data).await?;
        Ok(())
    }

    /// Read back a denormalized entity snapshot.
    pub async fn snapshot(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.store.get_snapshot(name).await?)
    }

    /// Drop all denormalized snapshots.
    pub async fn clear_snapshots(&self) -> Result<()> {
        self.store.clear_snapshots().await?;
        Ok(())
    }

    /// Drop all cached GET responses.
    pub async fn clear_cached(&self) -> Result<()> {
        self.store.clear_cached().await?;
        Ok(())
    }
}

impl Drop for OfflineSyncService {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

/// Forward connectivity transitions into the monitor and fire one drain per
/// offline-to-online flip.
fn spawn_connectivity_listener(
    mut rx: watch::Receiver<bool>,
    monitor: Arc<NetworkMonitor>,
    engine: Arc<SyncEngine>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            if monitor.note_transition(online) && online {
                debug!("connectivity restored, draining pending actions");
                engine.drain().await;
            }
        }
    })
}
