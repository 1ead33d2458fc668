//! Durable FIFO queue of mutations deferred while offline.

use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;
use serde_json::Value;

use crate::store::SyncStore;
use crate::sync::{ActionKind, PendingAction, StatusPublisher};

/// Ordered, durable list of pending mutations.
///
/// The queue keeps an in-memory mirror of the persisted list so enqueue never
/// fails: when a durable write is rejected the action still lives in memory
/// and the failure is logged, not raised. Removal happens exactly once per
/// action, after a confirmed replay or at the retry ceiling.
pub struct PendingActionQueue {
    actions: Mutex<Vec<PendingAction>>,
    store: Arc<dyn SyncStore>,
    status: Arc<StatusPublisher>,
}

impl PendingActionQueue {
    /// Restore the queue from the durable store and publish the initial
    /// pending count. A store read failure starts an empty queue rather than
    /// failing construction.
    pub async fn load(store: Arc<dyn SyncStore>, status: Arc<StatusPublisher>) -> Self {
        let actions = match store.load_actions().await {
            Ok(actions) => actions,
            Err(err) => {
                warn!("failed to load pending actions, starting empty: {err}");
                Vec::new()
            }
        };

        status.update(|s| s.pending_actions = actions.len());
        Self {
            actions: Mutex::new(actions),
            store,
            status,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingAction>> {
        // A poisoned lock only means a panicked writer; the list itself is
        // still coherent because no mutation holds the guard across an await.
        self.actions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_count(&self) {
        let count = self.lock().len();
        self.status.update(|s| s.pending_actions = count);
    }

    /// Append a new action and persist it best-effort.
    pub async fn enqueue(
        &self,
        kind: ActionKind,
        endpoint: impl Into<String>,
        payload: Option<Value>,
    ) -> PendingAction {
        let action = PendingAction::new(kind, endpoint, payload);
        self.lock().push(action.clone());
        self.publish_count();

        if let Err(err) = self.store.append_action(&action).await {
            warn!(
                "pending action {} for {} kept in memory only: {err}",
                action.id, action.endpoint
            );
        }
        action
    }

    /// Snapshot of the current queue contents in FIFO order, without removal.
    pub fn snapshot(&self) -> Vec<PendingAction> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Delete one action by id. Removing a missing id is a no-op.
    pub async fn remove(&self, id: &str) {
        self.lock().retain(|action| action.id != id);
        self.publish_count();

        if let Err(err) = self.store.remove_action(id).await {
            warn!("failed to remove pending action {id} from store: {err}");
        }
    }

    /// Record one failed replay attempt and return the new retry count.
    ///
    /// Returns 0 when the action no longer exists (already removed by a
    /// racing drain's success path).
    pub async fn record_failure(&self, id: &str) -> u32 {
        let retry_count = {
            let mut actions = self.lock();
            match actions.iter_mut().find(|action| action.id == id) {
                Some(action) => {
                    action.retry_count += 1;
                    action.retry_count
                }
                None => return 0,
            }
        };

        if let Err(err) = self.store.set_retry_count(id, retry_count).await {
            warn!("failed to persist retry count for action {id}: {err}");
        }
        retry_count
    }

    /// Destructive reset of the whole queue.
    pub async fn clear(&self) {
        self.lock().clear();
        self.publish_count();

        if let Err(err) = self.store.clear_actions().await {
            warn!("failed to clear pending actions in store: {err}");
        }
    }
}
