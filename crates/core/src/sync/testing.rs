//! Shared test doubles for the sync subsystem.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::store::{CachedResponse, StoreError, SyncStore};
use crate::sync::PendingAction;
use crate::transport::{HttpMethod, Transport, TransportError};

/// One observed transport call.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: HttpMethod,
    pub endpoint: String,
    pub payload: Option<Value>,
}

/// Transport double that records calls and scripts failures.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    fail_all: AtomicBool,
    fail_endpoints: Mutex<HashSet<String>>,
    block_next: AtomicBool,
    blocked: Notify,
    release: Notify,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every subsequent request fail with a 500.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Make requests against one endpoint fail with a 500.
    pub fn fail_endpoint(&self, endpoint: &str) {
        self.fail_endpoints
            .lock()
            .unwrap()
            .insert(endpoint.to_string());
    }

    /// Park the next request until [`Self::release_blocked`] is called.
    pub fn block_next_request(&self) {
        self.block_next.store(true, Ordering::SeqCst);
    }

    /// Wait until a request is parked inside the transport.
    pub async fn wait_for_blocked(&self) {
        self.blocked.notified().await;
    }

    pub fn release_blocked(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            endpoint: endpoint.to_string(),
            payload: payload.cloned(),
        });

        if self.block_next.swap(false, Ordering::SeqCst) {
            self.blocked.notify_one();
            self.release.notified().await;
        }

        let should_fail = self.fail_all.load(Ordering::SeqCst)
            || self.fail_endpoints.lock().unwrap().contains(endpoint);
        if should_fail {
            return Err(TransportError::api(500, "injected failure"));
        }

        Ok(json!({ "success": true }))
    }
}

/// In-memory [`SyncStore`] with scriptable write failures.
#[derive(Default)]
pub(crate) struct MemoryStore {
    actions: Mutex<Vec<PendingAction>>,
    cached: Mutex<HashMap<String, CachedResponse>>,
    snapshots: Mutex<HashMap<String, Value>>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn fail_writes(&self, fail: bool) {
        self.reject_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            Err(StoreError::io("injected write failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn load_actions(&self) -> Result<Vec<PendingAction>, StoreError> {
        Ok(self.actions.lock().unwrap().clone())
    }

    async fn append_action(&self, action: &PendingAction) -> Result<(), StoreError> {
        self.check_write()?;
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn remove_action(&self, id: &str) -> Result<(), StoreError> {
        self.check_write()?;
        self.actions.lock().unwrap().retain(|action| action.id != id);
        Ok(())
    }

    async fn set_retry_count(&self, id: &str, retry_count: u32) -> Result<(), StoreError> {
        self.check_write()?;
        let mut actions = self.actions.lock().unwrap();
        if let Some(action) = actions.iter_mut().find(|action| action.id == id) {
            action.retry_count = retry_count;
        }
        Ok(())
    }

    async fn clear_actions(&self) -> Result<(), StoreError> {
        self.check_write()?;
        self.actions.lock().unwrap().clear();
        Ok(())
    }

    async fn get_cached(&self, endpoint: &str) -> Result<Option<CachedResponse>, StoreError> {
        Ok(self.cached.lock().unwrap().get(endpoint).cloned())
    }

    async fn put_cached(&self, endpoint: &str, entry: &CachedResponse) -> Result<(), StoreError> {
        self.check_write()?;
        self.cached
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), entry.clone());
        Ok(())
    }

    async fn remove_cached(&self, endpoint: &str) -> Result<(), StoreError> {
        self.check_write()?;
        self.cached.lock().unwrap().remove(endpoint);
        Ok(())
    }

    async fn clear_cached(&self) -> Result<(), StoreError> {
        self.check_write()?;
        self.cached.lock().unwrap().clear();
        Ok(())
    }

    async fn get_snapshot(&self, name: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.snapshots.lock().unwrap().get(name).cloned())
    }

    async fn put_snapshot(&self, name: &str, data: &Value) -> Result<(), StoreError> {
        self.check_write()?;
        self.snapshots
            .lock()
            .unwrap()
            .insert(name.to_string(), data.clone());
        Ok(())
    }

    async fn clear_snapshots(&self) -> Result<(), StoreError> {
        self.check_write()?;
        self.snapshots.lock().unwrap().clear();
        Ok(())
    }
}
