//! Offline-aware request routing: network-first mutations, cache-first
//! offline reads, and enqueue-and-stub for mutations without connectivity.

use std::sync::Arc;

use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;
use crate::store::{CachedResponse, SyncStore};
use crate::sync::{ActionKind, NetworkMonitor, PendingActionQueue};
use crate::transport::{HttpMethod, Transport};

/// Result of an offline-aware GET.
#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    /// Fresh data straight from the network (also written through to cache).
    Network(Value),
    /// Served from a fresh cached entry while offline.
    Cached(Value),
    /// Caller-supplied fallback, used when no fresh cache entry exists.
    Fallback(Value),
    /// Offline with no fresh cache entry and no fallback. A valid-but-empty
    /// result, not an error.
    Unavailable,
}

impl GetOutcome {
    /// Payload carried by this outcome, if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Network(data) | Self::Cached(data) | Self::Fallback(data) => Some(data),
            Self::Unavailable => None,
        }
    }
}

/// Response returned by the mutating verbs. Offline calls return a stub with
/// `offline: true` so the UI can proceed optimistically while the action
/// waits in the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub offline: bool,
    pub data: Option<Value>,
}

impl MutationResponse {
    fn online(data: Value) -> Self {
        Self {
            success: true,
            offline: false,
            data: Some(data),
        }
    }

    fn offline_stub(data: Option<Value>) -> Self {
        Self {
            success: true,
            offline: true,
            data,
        }
    }
}

/// Single entry point for GET/POST/PUT/DELETE, deciding per verb and
/// connectivity state whether to hit the network, serve or update the cache,
/// or enqueue a pending action and answer with a stub.
///
/// Transport failures while believed online surface as `Err`: only a
/// confirmed offline state routes to the queue, so a timeout is never
/// silently queued behind the caller's back.
pub struct OfflineRouter {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SyncStore>,
    queue: Arc<PendingActionQueue>,
    monitor: Arc<NetworkMonitor>,
}

impl OfflineRouter {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn SyncStore>,
        queue: Arc<PendingActionQueue>,
        monitor: Arc<NetworkMonitor>,
    ) -> Self {
        Self {
            transport,
            store,
            queue,
            monitor,
        }
    }

    /// GET with cache write-through online and cache-first reads offline.
    pub async fn get(&self, endpoint: &str, fallback: Option<Value>) -> Result<GetOutcome> {
        if self.monitor.is_online() {
            let data = self
                .transport
                .request(HttpMethod::Get, endpoint, None)
                .await?;
            let entry = CachedResponse::new(data.clone());
            if let Err(err) = self.store.put_cached(endpoint, &entry).await {
                warn!("failed to cache GET {endpoint}: {err}");
            }
            return Ok(GetOutcome::Network(data));
        }

        match self.store.get_cached(endpoint).await {
            Ok(Some(entry)) if entry.is_fresh() => return Ok(GetOutcome::Cached(entry.data)),
            Ok(_) => {}
            Err(err) => warn!("cache lookup for {endpoint} failed: {err}"),
        }
        Ok(match fallback {
            Some(data) => GetOutcome::Fallback(data),
            None => GetOutcome::Unavailable,
        })
    }

    /// POST: create on the network when online, enqueue an `upload` otherwise.
    pub async fn post(&self, endpoint: &str, payload: Value) -> Result<MutationResponse> {
        if self.monitor.is_online() {
            let response = self
                .transport
                .request(HttpMethod::Post, endpoint, Some(&payload))
                .await?;
            self.cache_created(endpoint, &payload).await;
            return Ok(MutationResponse::online(response));
        }

        self.queue
            .enqueue(ActionKind::Upload, endpoint, Some(payload.clone()))
            .await;
        Ok(MutationResponse::offline_stub(Some(payload)))
    }

    /// PUT: update on the network when online, enqueue an `update` otherwise.
    pub async fn put(&self, endpoint: &str, payload: Value) -> Result<MutationResponse> {
        if self.monitor.is_online() {
            let response = self
                .transport
                .request(HttpMethod::Put, endpoint, Some(&payload))
                .await?;
            self.cache_updated(endpoint, &payload).await;
            return Ok(MutationResponse::online(response));
        }

        self.queue
            .enqueue(ActionKind::Update, endpoint, Some(payload.clone()))
            .await;
        Ok(MutationResponse::offline_stub(Some(payload)))
    }

    /// DELETE: remove on the network when online, enqueue a `delete` otherwise.
    pub async fn delete(&self, endpoint: &str) -> Result<MutationResponse> {
        if self.monitor.is_online() {
            let response = self
                .transport
                .request(HttpMethod::Delete, endpoint, None)
                .await?;
            self.cache_deleted(endpoint).await;
            return Ok(MutationResponse::online(response));
        }

        self.queue.enqueue(ActionKind::Delete, endpoint, None).await;
        Ok(MutationResponse::offline_stub(None))
    }

    // Cache write-through for confirmed online mutations. All of these are
    // best-effort: a store failure costs cache coherence, not the mutation.

    async fn cache_created(&self, endpoint: &str, payload: &Value) {
        let entry = match self.store.get_cached(endpoint).await {
            Ok(Some(mut entry)) => {
                if let Some(items) = entry.data.as_array_mut() {
                    items.push(payload.clone());
                }
                entry
            }
            Ok(None) => return,
            Err(err) => {
                warn!("cache lookup for {endpoint} failed: {err}");
                return;
            }
        };
        if let Err(err) = self.store.put_cached(endpoint, &entry).await {
            warn!("failed to update cached collection {endpoint}: {err}");
        }
    }

    async fn cache_updated(&self, endpoint: &str, payload: &Value) {
        let entry = CachedResponse::new(payload.clone());
        if let Err(err) = self.store.put_cached(endpoint, &entry).await {
            warn!("failed to refresh cache for {endpoint}: {err}");
        }

        let Some((parent, _)) = split_resource(endpoint) else {
            return;
        };
        let Some(id) = payload.get("id").cloned() else {
            return;
        };
        self.rewrite_collection(parent, |item| {
            if item.get("id") == Some(&id) {
                *item = payload.clone();
            }
        })
        .await;
    }

    async fn cache_deleted(&self, endpoint: &str) {
        if let Err(err) = self.store.remove_cached(endpoint).await {
            warn!("failed to drop cache entry {endpoint}: {err}");
        }

        let Some((parent, id)) = split_resource(endpoint) else {
            return;
        };
        let id = Value::String(id.to_string());
        match self.store.get_cached(parent).await {
            Ok(Some(mut entry)) => {
                if let Some(items) = entry.data.as_array_mut() {
                    items.retain(|item| item.get("id") != Some(&id));
                }
                if let Err(err) = self.store.put_cached(parent, &entry).await {
                    warn!("failed to update cached collection {parent}: {err}");
                }
            }
            Ok(None) => {}
            Err(err) => warn!("cache lookup for {parent} failed: {err}"),
        }
    }

    async fn rewrite_collection(&self, endpoint: &str, mut rewrite: impl FnMut(&mut Value)) {
        match self.store.get_cached(endpoint).await {
            Ok(Some(mut entry)) => {
                if let Some(items) = entry.data.as_array_mut() {
                    items.iter_mut().for_each(&mut rewrite);
                }
                if let Err(err) = self.store.put_cached(endpoint, &entry).await {
                    warn!("failed to update cached collection {endpoint}: {err}");
                }
            }
            Ok(None) => {}
            Err(err) => warn!("cache lookup for {endpoint} failed: {err}"),
        }
    }
}

/// Split `/receipts/42` into `("/receipts", "42")`. Returns `None` for
/// collection endpoints with no trailing resource id.
fn split_resource(endpoint: &str) -> Option<(&str, &str)> {
    let (parent, id) = endpoint.rsplit_once('/')?;
    if parent.is_empty() || id.is_empty() {
        return None;
    }
    Some((parent, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CACHE_FRESHNESS_HOURS;
    use crate::sync::testing::{MemoryStore, RecordingTransport};
    use crate::sync::{StatusPublisher, SyncStatus};
    use chrono::{Duration, Utc};
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        transport: Arc<RecordingTransport>,
        queue: Arc<PendingActionQueue>,
        router: OfflineRouter,
    }

    async fn fixture(online: bool) -> Fixture {
        let status = Arc::new(StatusPublisher::new(SyncStatus::initial(online)));
        let store = Arc::new(MemoryStore::default());
        let transport = Arc::new(RecordingTransport::default());
        let queue = Arc::new(PendingActionQueue::load(store.clone(), status.clone()).await);
        let monitor = Arc::new(NetworkMonitor::new(online, status));
        let router = OfflineRouter::new(transport.clone(), store.clone(), queue.clone(), monitor);
        Fixture {
            store,
            transport,
            queue,
            router,
        }
    }

    #[tokio::test]
    async fn online_get_writes_through_to_cache() {
        let f = fixture(true).await;

        let outcome = f.router.get("/receipts?limit=10", None).await.expect("get");
        assert!(matches!(outcome, GetOutcome::Network(_)));

        let cached = f
            .store
            .get_cached("/receipts?limit=10")
            .await
            .expect("store")
            .expect("entry");
        assert_eq!(cached.data, json!({"success": true}));
    }

    #[tokio::test]
    async fn offline_get_serves_fresh_cache() {
        let f = fixture(false).await;
        let entry = CachedResponse {
            data: json!([{"id": "1"}]),
            cached_at: Utc::now() - Duration::hours(CACHE_FRESHNESS_HOURS) + Duration::minutes(1),
        };
        f.store.put_cached("/receipts", &entry).await.expect("seed");

        let outcome = f.router.get("/receipts", None).await.expect("get");
        assert_eq!(outcome, GetOutcome::Cached(json!([{"id": "1"}])));
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn offline_get_ignores_stale_cache() {
        let f = fixture(false).await;
        let entry = CachedResponse {
            data: json!([{"id": "1"}]),
            cached_at: Utc::now() - Duration::hours(CACHE_FRESHNESS_HOURS) - Duration::minutes(1),
        };
        f.store.put_cached("/receipts", &entry).await.expect("seed");

        let with_fallback = f
            .router
            .get("/receipts", Some(json!([])))
            .await
            .expect("get");
        assert_eq!(with_fallback, GetOutcome::Fallback(json!([])));

        let without = f.router.get("/receipts", None).await.expect("get");
        assert_eq!(without, GetOutcome::Unavailable);
    }

    #[tokio::test]
    async fn offline_post_enqueues_and_stubs() {
        let f = fixture(false).await;

        let response = f
            .router
            .post("/receipts", json!({"storeName": "A"}))
            .await
            .expect("post");

        assert_eq!(
            response,
            MutationResponse {
                success: true,
                offline: true,
                data: Some(json!({"storeName": "A"})),
            }
        );
        assert!(f.transport.calls().is_empty());

        let queued = f.queue.snapshot();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, ActionKind::Upload);
        assert_eq!(queued[0].payload, Some(json!({"storeName": "A"})));
        assert_eq!(queued[0].retry_count, 0);
    }

    #[tokio::test]
    async fn online_post_appends_to_cached_collection() {
        let f = fixture(true).await;
        let entry = CachedResponse::new(json!([{"id": "1"}]));
        f.store.put_cached("/receipts", &entry).await.expect("seed");

        let response = f
            .router
            .post("/receipts", json!({"id": "2"}))
            .await
            .expect("post");
        assert!(!response.offline);

        let cached = f
            .store
            .get_cached("/receipts")
            .await
            .expect("store")
            .expect("entry");
        assert_eq!(cached.data, json!([{"id": "1"}, {"id": "2"}]));
        assert!(f.queue.is_empty());
    }

    #[tokio::test]
    async fn online_transport_failure_is_not_queued() {
        let f = fixture(true).await;
        f.transport.fail_all(true);

        let result = f.router.post("/receipts", json!({"a": 1})).await;
        assert!(result.is_err());
        assert!(f.queue.is_empty(), "transient online failure must surface, not queue");
    }

    #[tokio::test]
    async fn online_put_rewrites_cached_parent_collection() {
        let f = fixture(true).await;
        let entry = CachedResponse::new(json!([{"id": "1", "total": 5}, {"id": "2"}]));
        f.store.put_cached("/receipts", &entry).await.expect("seed");

        f.router
            .put("/receipts/1", json!({"id": "1", "total": 9}))
            .await
            .expect("put");

        let collection = f
            .store
            .get_cached("/receipts")
            .await
            .expect("store")
            .expect("entry");
        assert_eq!(collection.data, json!([{"id": "1", "total": 9}, {"id": "2"}]));

        let exact = f
            .store
            .get_cached("/receipts/1")
            .await
            .expect("store")
            .expect("entry");
        assert_eq!(exact.data, json!({"id": "1", "total": 9}));
    }

    #[tokio::test]
    async fn online_delete_prunes_cache() {
        let f = fixture(true).await;
        f.store
            .put_cached("/receipts", &CachedResponse::new(json!([{"id": "1"}, {"id": "2"}])))
            .await
            .expect("seed");
        f.store
            .put_cached("/receipts/1", &CachedResponse::new(json!({"id": "1"})))
            .await
            .expect("seed");

        f.router.delete("/receipts/1").await.expect("delete");

        assert!(f
            .store
            .get_cached("/receipts/1")
            .await
            .expect("store")
            .is_none());
        let collection = f
            .store
            .get_cached("/receipts")
            .await
            .expect("store")
            .expect("entry");
        assert_eq!(collection.data, json!([{"id": "2"}]));
    }

    #[tokio::test]
    async fn offline_delete_enqueues_without_payload() {
        let f = fixture(false).await;

        let response = f.router.delete("/receipts/1").await.expect("delete");
        assert_eq!(response, MutationResponse::offline_stub(None));

        let queued = f.queue.snapshot();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, ActionKind::Delete);
        assert_eq!(queued[0].payload, None);
    }

    #[test]
    fn split_resource_handles_collection_paths() {
        assert_eq!(split_resource("/receipts/42"), Some(("/receipts", "42")));
        assert_eq!(split_resource("/receipts/"), None);
        assert_eq!(split_resource("receipts"), None);
    }
}
