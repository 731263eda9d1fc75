//! Offline content cache
//!
//! Stores each document's serialized editor content in a single SQLite
//! table keyed by document id, so it survives restarts and is available
//! before any remote sync completes.
//!
//! ## Container lifecycle
//!
//! Each database file is opened at most once per process. [`ContentStore::open`]
//! consults a process-wide registry keyed by the database path: if a live
//! container exists, the new handle shares it; otherwise the file is opened,
//! upgraded to [`SCHEMA_VERSION`] and registered. The container closes when
//! its last handle drops, and the next `open` starts the cycle again.
//!
//! ## Usage
//!
//! ```ignore
//! let store = ContentStore::open(&config).await?;
//! store.put("note-1", json!({"type": "doc"})).await?;
//! if let Some(record) = store.get("note-1").await? {
//!     render(record.content);
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{Operation, StoreError, StoreResult};
use super::schema::{get_schema_version, upgrade, SCHEMA_VERSION};
use crate::config::Config;
use crate::models::ContentRecord;

/// Open containers, keyed by canonical database path
static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Weak<Container>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<PathBuf, Weak<Container>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// One open database file shared by every handle in the process
struct Container {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl Container {
    /// Return the live container for `path`, opening it if needed
    ///
    /// The registry lock is held across the open so concurrent callers
    /// never race to create two connections for the same file.
    fn acquire(path: PathBuf) -> StoreResult<Arc<Self>> {
        let key = registry_key(&path)?;
        let mut open = registry().lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = open.get(&key).and_then(Weak::upgrade) {
            debug!(path = %key.display(), "Reusing open content container");
            return Ok(existing);
        }

        let container = Arc::new(Self::open(key.clone())?);
        open.retain(|_, handle| handle.strong_count() > 0);
        open.insert(key, Arc::downgrade(&container));
        Ok(container)
    }

    fn open(path: PathBuf) -> StoreResult<Self> {
        let unavailable = |source| StoreError::Unavailable {
            path: path.clone(),
            source,
        };

        let mut conn = Connection::open(&path).map_err(unavailable)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(unavailable)?;

        let version = get_schema_version(&conn).map_err(unavailable)?;
        if version > SCHEMA_VERSION {
            warn!(found = version, supported = SCHEMA_VERSION, "Content database is newer than this build");
            return Err(StoreError::VersionTooNew {
                path,
                found: version,
                supported: SCHEMA_VERSION,
            });
        }
        if version < SCHEMA_VERSION {
            upgrade(&mut conn, version, SCHEMA_VERSION)?;
        }

        info!(path = %path.display(), version = SCHEMA_VERSION, "Opened content store");

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }
}

/// Create the parent directory and build a stable key for the registry
fn registry_key(path: &Path) -> StoreResult<PathBuf> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(path.to_path_buf());
    };

    std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
        path: parent.to_path_buf(),
        source,
    })?;

    let parent = parent
        .canonicalize()
        .map_err(|source| StoreError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;

    Ok(match path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

/// Handle to the process-wide content cache
///
/// Handles are cheap to clone; clones and separate `open` calls for the
/// same path all observe the same data.
#[derive(Clone)]
pub struct ContentStore {
    container: Arc<Container>,
    timeout: Option<Duration>,
}

impl ContentStore {
    /// Open (creating if absent) the content database described by `config`
    ///
    /// Fails with an error of kind `StorageUnavailable` if the directory or
    /// database cannot be opened, or if the on-disk schema is newer than
    /// this build understands. Upgrade failures also abort the open.
    pub async fn open(config: &Config) -> StoreResult<Self> {
        let path = config.database_path();
        let container = tokio::task::spawn_blocking(move || Container::acquire(path))
            .await
            .map_err(|source| StoreError::Task {
                operation: Operation::Open,
                source,
            })??;

        Ok(Self {
            container,
            timeout: config.operation_timeout(),
        })
    }

    /// Override the per-operation deadline for this handle
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.container.path
    }

    /// Whether two handles share the same underlying container
    pub fn same_container(&self, other: &ContentStore) -> bool {
        Arc::ptr_eq(&self.container, &other.container)
    }

    /// Release this handle
    ///
    /// The database closes once every handle for it has been dropped.
    pub fn close(self) {
        debug!(path = %self.container.path.display(), "Closing content store handle");
    }

    /// Insert or fully replace the content for `id`
    pub async fn put(&self, id: &str, content: Value) -> StoreResult<()> {
        let encoded = serde_json::to_string(&content).map_err(|source| StoreError::Serialization {
            id: id.to_string(),
            source,
        })?;
        let updated_at = Utc::now().timestamp_millis();

        let key = id.to_string();
        self.run(Operation::Put, id, move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO content_store (id, content, updated_at) VALUES (?1, ?2, ?3)",
                params![key, encoded, updated_at],
            )
            .map_err(|source| StoreError::Operation {
                operation: Operation::Put,
                id: key.clone(),
                source,
            })?;
            debug!(id = %key, "Stored content");
            Ok(())
        })
        .await
    }

    /// Get the content for `id`
    ///
    /// Returns `None` if nothing has been cached for that id yet.
    pub async fn get(&self, id: &str) -> StoreResult<Option<ContentRecord>> {
        let key = id.to_string();
        self.run(Operation::Get, id, move |conn| {
            let row: Option<(String, i64)> = conn
                .query_row(
                    "SELECT content, updated_at FROM content_store WHERE id = ?",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|source| StoreError::Operation {
                    operation: Operation::Get,
                    id: key.clone(),
                    source,
                })?;

            let Some((raw, updated_at)) = row else {
                return Ok(None);
            };

            let content = serde_json::from_str(&raw).map_err(|source| {
                StoreError::Serialization {
                    id: key.clone(),
                    source,
                }
            })?;

            Ok(Some(ContentRecord {
                id: key,
                content,
                updated_at: DateTime::from_timestamp_millis(updated_at).unwrap_or_default(),
            }))
        })
        .await
    }

    /// Remove the content for `id`
    ///
    /// Returns whether a record existed. Deleting a missing id is not an error.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let key = id.to_string();
        self.run(Operation::Delete, id, move |conn| {
            let removed = conn
                .execute("DELETE FROM content_store WHERE id = ?", params![key])
                .map_err(|source| StoreError::Operation {
                    operation: Operation::Delete,
                    id: key.clone(),
                    source,
                })?;
            debug!(id = %key, removed, "Deleted content");
            Ok(removed > 0)
        })
        .await
    }

    /// Ids of every cached document, most recently written first
    pub async fn list_ids(&self) -> StoreResult<Vec<String>> {
        self.run(Operation::List, "*", |conn| {
            let list_err = |source| StoreError::Operation {
                operation: Operation::List,
                id: "*".to_string(),
                source,
            };

            let mut stmt = conn
                .prepare("SELECT id FROM content_store ORDER BY updated_at DESC, id")
                .map_err(list_err)?;
            let ids = stmt
                .query_map([], |row| row.get(0))
                .map_err(list_err)?
                .collect::<Result<Vec<String>, _>>()
                .map_err(list_err)?;
            Ok(ids)
        })
        .await
    }

    /// Number of cached documents
    pub async fn count(&self) -> StoreResult<i64> {
        self.run(Operation::Count, "*", |conn| {
            conn.query_row("SELECT COUNT(*) FROM content_store", [], |row| row.get(0))
                .map_err(|source| StoreError::Operation {
                    operation: Operation::Count,
                    id: "*".to_string(),
                    source,
                })
        })
        .await
    }

    /// Schema version recorded in the database
    pub async fn schema_version(&self) -> StoreResult<i32> {
        let db = self.path().display().to_string();
        let id = db.clone();
        self.run(Operation::Version, &db, move |conn| {
            get_schema_version(conn).map_err(|source| StoreError::Operation {
                operation: Operation::Version,
                id,
                source,
            })
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool
    ///
    /// Honors the handle's deadline. An elapsed deadline reports `TimedOut`;
    /// the statement may still complete in the background.
    async fn run<T, F>(&self, operation: Operation, id: &str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let container = Arc::clone(&self.container);
        let task = tokio::task::spawn_blocking(move || {
            let mut conn = container.conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut conn)
        });

        let joined = match self.timeout {
            Some(after) => match tokio::time::timeout(after, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(%operation, id, ?after, "Content store operation timed out");
                    return Err(StoreError::TimedOut {
                        operation,
                        id: id.to_string(),
                        after,
                    });
                }
            },
            None => task.await,
        };

        joined.map_err(|source| StoreError::Task { operation, source })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::ErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config::with_data_dir(temp_dir.path())
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::open(&test_config(&temp_dir)).await.unwrap();

        let doc = json!({"type": "doc", "content": [{"type": "paragraph"}]});
        store.put("note-1", doc.clone()).await.unwrap();

        let record = store.get("note-1").await.unwrap().unwrap();
        assert_eq!(record.id, "note-1");
        assert_eq!(record.content, doc);
        assert!(record.updated_at.timestamp() > 0);
    }

    #[tokio::test]
    async fn test_html_content_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::open(&test_config(&temp_dir)).await.unwrap();

        store
            .put("note-html", Value::String("<h1>Title</h1><p>body</p>".into()))
            .await
            .unwrap();

        let record = store.get("note-html").await.unwrap().unwrap();
        assert_eq!(record.as_html(), Some("<h1>Title</h1><p>body</p>"));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::open(&test_config(&temp_dir)).await.unwrap();

        assert!(store.get("never-written").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replacement_semantics() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::open(&test_config(&temp_dir)).await.unwrap();

        store
            .put("note-1", json!({"title": "A", "tags": ["x"]}))
            .await
            .unwrap();
        store.put("note-1", json!({"body": "B"})).await.unwrap();

        let record = store.get("note-1").await.unwrap().unwrap();
        assert_eq!(record.content, json!({"body": "B"}));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::open(&test_config(&temp_dir)).await.unwrap();

        store.put("note-1", json!("<p>x</p>")).await.unwrap();
        assert!(store.delete("note-1").await.unwrap());
        assert!(store.get("note-1").await.unwrap().is_none());

        // Deleting something that never existed is a no-op
        assert!(!store.delete("ghost").await.unwrap());
        assert!(store.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repeated_open_shares_container() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let a = ContentStore::open(&config).await.unwrap();
        let b = ContentStore::open(&config).await.unwrap();
        assert!(a.same_container(&b));

        a.put("shared", json!({"v": 1})).await.unwrap();
        let record = b.get("shared").await.unwrap().unwrap();
        assert_eq!(record.content, json!({"v": 1}));
    }

    #[tokio::test]
    async fn test_concurrent_open_shares_container() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let (a, b) = tokio::join!(ContentStore::open(&config), ContentStore::open(&config));
        assert!(a.unwrap().same_container(&b.unwrap()));
    }

    #[tokio::test]
    async fn test_reopen_after_close_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let store = ContentStore::open(&config).await.unwrap();
        store.put("note-1", json!({"kept": true})).await.unwrap();
        store.close();

        let reopened = ContentStore::open(&config).await.unwrap();
        let record = reopened.get("note-1").await.unwrap().unwrap();
        assert_eq!(record.content, json!({"kept": true}));
        assert_eq!(reopened.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_separate_dirs_are_isolated() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let a = ContentStore::open(&test_config(&dir_a)).await.unwrap();
        let b = ContentStore::open(&test_config(&dir_b)).await.unwrap();
        assert!(!a.same_container(&b));

        a.put("note-1", json!(1)).await.unwrap();
        assert!(b.get("note-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ids_and_count() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::open(&test_config(&temp_dir)).await.unwrap();

        for i in 0..3 {
            store.put(&format!("note-{}", i), json!(i)).await.unwrap();
        }

        let mut ids = store.list_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["note-0", "note-1", "note-2"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unopenable_directory_is_storage_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let config = Config::with_data_dir(&blocker);
        let err = ContentStore::open(&config).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert!(matches!(err, StoreError::CreateDirectory { .. }));
    }

    #[tokio::test]
    async fn test_newer_schema_is_storage_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        {
            let conn = Connection::open(config.database_path()).unwrap();
            conn.execute_batch(
                "CREATE TABLE schema_info (key TEXT PRIMARY KEY, value TEXT NOT NULL);
                 INSERT INTO schema_info (key, value) VALUES ('version', '99');",
            )
            .unwrap();
        }

        let err = ContentStore::open(&config).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert!(matches!(
            err,
            StoreError::VersionTooNew {
                found: 99,
                supported: SCHEMA_VERSION,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_opens_version_one_database() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        {
            let mut conn = Connection::open(config.database_path()).unwrap();
            upgrade(&mut conn, 0, 1).unwrap();
            conn.execute(
                "INSERT INTO content_store (id, content) VALUES ('old', '{\"legacy\":true}')",
                [],
            )
            .unwrap();
        }

        let store = ContentStore::open(&config).await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), SCHEMA_VERSION);

        let record = store.get("old").await.unwrap().unwrap();
        assert_eq!(record.content, json!({"legacy": true}));
    }

    #[tokio::test]
    async fn test_failed_operation_keeps_store_usable() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let store = ContentStore::open(&config).await.unwrap();

        {
            let conn = Connection::open(config.database_path()).unwrap();
            conn.execute(
                "INSERT INTO content_store (id, content, updated_at) VALUES ('broken', 'not json', 0)",
                [],
            )
            .unwrap();
        }

        let err = store.get("broken").await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(matches!(err, StoreError::Serialization { .. }));

        store.put("fine", json!({"ok": true})).await.unwrap();
        assert!(store.get("fine").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sequenced_writes_last_wins() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::open(&test_config(&temp_dir)).await.unwrap();

        for i in 0..20 {
            store.put("note-1", json!({"rev": i})).await.unwrap();
        }

        let record = store.get("note-1").await.unwrap().unwrap();
        assert_eq!(record.content, json!({"rev": 19}));
    }

    #[tokio::test]
    async fn test_operation_timeout_keeps_store_usable() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.operation_timeout_ms = Some(50);
        let store = ContentStore::open(&config).await.unwrap();
        store.put("x", json!({"ok": true})).await.unwrap();

        // Keep the connection busy past the deadline
        let busy = store.container.conn.lock().unwrap();
        let err = store.get("x").await.err().unwrap();
        drop(busy);

        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(err.is_recoverable());
        match &err {
            StoreError::TimedOut {
                operation,
                id,
                after,
            } => {
                assert_eq!(*operation, Operation::Get);
                assert_eq!(id, "x");
                assert_eq!(*after, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let record = store.get("x").await.unwrap().unwrap();
        assert_eq!(record.content, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_with_timeout_overrides_config() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::open(&test_config(&temp_dir))
            .await
            .unwrap()
            .with_timeout(Some(Duration::from_millis(20)));

        let busy = store.container.conn.lock().unwrap();
        let err = store.count().await.err().unwrap();
        drop(busy);
        assert!(matches!(
            err,
            StoreError::TimedOut {
                operation: Operation::Count,
                ..
            }
        ));

        let unbounded = store.clone().with_timeout(None);
        assert_eq!(unbounded.count().await.unwrap(), 0);
    }
}
