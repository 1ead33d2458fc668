//! Durable `SyncStore` implementation over rusqlite.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use receiptwise_core::store::{CachedResponse, StoreError, SyncStore};
use receiptwise_core::sync::{ActionKind, PendingAction};

/// Table namespaces. `pending_actions` keeps FIFO order through `rowid`;
/// every mutation below is a single SQL statement, so a crash mid-drain
/// never leaves a partial write behind.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pending_actions (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    payload TEXT,
    enqueued_at TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS cached_responses (
    endpoint TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    cached_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS entity_snapshots (
    name TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

fn sql_err(err: rusqlite::Error) -> StoreError {
    StoreError::io(err.to_string())
}

fn json_err(err: serde_json::Error) -> StoreError {
    StoreError::serde(err.to_string())
}

fn kind_to_db(kind: &ActionKind) -> Result<String, StoreError> {
    Ok(serde_json::to_string(kind)
        .map_err(json_err)?
        .trim_matches('"')
        .to_string())
}

fn kind_from_db(value: &str) -> Result<ActionKind, StoreError> {
    serde_json::from_str(&format!("\"{value}\"")).map_err(json_err)
}

fn timestamp_from_db(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::serde(format!("bad timestamp '{value}': {e}")))
}

/// SQLite-backed durable store.
///
/// The connection is shared behind a mutex and every call runs on the
/// blocking pool, so store operations suspend cooperatively without stalling
/// the caller's runtime.
#[derive(Clone)]
pub struct SqliteSyncStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSyncStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(sql_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(sql_err)?;
        conn.pragma_update(None, "busy_timeout", 5_000)
            .map_err(sql_err)?;
        conn.execute_batch(SCHEMA).map_err(sql_err)?;
        debug!("opened sync store at {}", path.as_ref().display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, job: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            job(&guard)
        })
        .await
        .map_err(|e| StoreError::io(format!("store worker failed: {e}")))?
    }
}

#[async_trait]
impl SyncStore for SqliteSyncStore {
    async fn load_actions(&self) -> Result<Vec<PendingAction>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, kind, endpoint, payload, enqueued_at, retry_count \
                     FROM pending_actions ORDER BY rowid ASC",
                )
                .map_err(sql_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                })
                .map_err(sql_err)?;

            let mut actions = Vec::new();
            for row in rows {
                let (id, kind, endpoint, payload, enqueued_at, retry_count) =
                    row.map_err(sql_err)?;
                let payload = payload
                    .map(|raw| serde_json::from_str::<Value>(&raw).map_err(json_err))
                    .transpose()?;
                actions.push(PendingAction {
                    id,
                    kind: kind_from_db(&kind)?,
                    endpoint,
                    payload,
                    enqueued_at: timestamp_from_db(&enqueued_at)?,
                    retry_count: retry_count.max(0) as u32,
                });
            }
            Ok(actions)
        })
        .await
    }

    async fn append_action(&self, action: &PendingAction) -> Result<(), StoreError> {
        let action = action.clone();
        self.with_conn(move |conn| {
            let payload = action
                .payload
                .as_ref()
                .map(|value| serde_json::to_string(value).map_err(json_err))
                .transpose()?;
            conn.execute(
                "INSERT OR REPLACE INTO pending_actions \
                 (id, kind, endpoint, payload, enqueued_at, retry_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    action.id,
                    kind_to_db(&action.kind)?,
                    action.endpoint,
                    payload,
                    action.enqueued_at.to_rfc3339(),
                    action.retry_count,
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn remove_action(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM pending_actions WHERE id = ?1", params![id])
                .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn set_retry_count(&self, id: &str, retry_count: u32) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE pending_actions SET retry_count = ?2 WHERE id = ?1",
                params![id, retry_count],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn clear_actions(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM pending_actions", [])
                .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn get_cached(&self, endpoint: &str) -> Result<Option<CachedResponse>, StoreError> {
        let endpoint = endpoint.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT data, cached_at FROM cached_responses WHERE endpoint = ?1",
                    params![endpoint],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
                .map_err(sql_err)?;

            row.map(|(data, cached_at)| {
                Ok(CachedResponse {
                    data: serde_json::from_str(&data).map_err(json_err)?,
                    cached_at: timestamp_from_db(&cached_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn put_cached(&self, endpoint: &str, entry: &CachedResponse) -> Result<(), StoreError> {
        let endpoint = endpoint.to_string();
        let entry = entry.clone();
        self.with_conn(move |conn| {
            let data = serde_json::to_string(&entry.data).map_err(json_err)?;
            conn.execute(
                "INSERT INTO cached_responses (endpoint, data, cached_at) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(endpoint) DO UPDATE SET \
                 data = excluded.data, cached_at = excluded.cached_at",
                params![endpoint, data, entry.cached_at.to_rfc3339()],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn remove_cached(&self, endpoint: &str) -> Result<(), StoreError> {
        let endpoint = endpoint.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM cached_responses WHERE endpoint = ?1",
                params![endpoint],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn clear_cached(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM cached_responses", [])
                .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn get_snapshot(&self, name: &str) -> Result<Option<Value>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT data FROM entity_snapshots WHERE name = ?1",
                    params![name],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(sql_err)?;
            raw.map(|data| serde_json::from_str(&data).map_err(json_err))
                .transpose()
        })
        .await
    }

    async fn put_snapshot(&self, name: &str, data: &Value) -> Result<(), StoreError> {
        let name = name.to_string();
        let data = data.clone();
        self.with_conn(move |conn| {
            let raw = serde_json::to_string(&data).map_err(json_err)?;
            conn.execute(
                "INSERT INTO entity_snapshots (name, data, updated_at) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(name) DO UPDATE SET \
                 data = excluded.data, updated_at = excluded.updated_at",
                params![name, raw, Utc::now().to_rfc3339()],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn clear_snapshots(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM entity_snapshots", [])
                .map_err(sql_err)?;
            Ok(())
        })
        .await
    }
}
