//! Local change tracking
//!
//! Every local edit bumps a version counter persisted in `metadata.json`
//! and queues a [`Change`] for the sync layer. Subscribers are told the new
//! local version whenever a sync should be scheduled; notifications are
//! suppressed while a sync is already running.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::models::Change;
use crate::storage::json_store::atomic_write;

/// Persisted local version information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Monotonic local version, bumped on every tracked change
    pub version: u64,
    /// Milliseconds since the Unix epoch of the last tracked change
    pub last_modified: i64,
}

/// Tracks local changes awaiting sync
pub struct ChangeTracker {
    path: PathBuf,
    metadata: Metadata,
    pending: HashMap<String, Change>,
    sync_in_progress: bool,
    sync_tx: watch::Sender<u64>,
}

impl ChangeTracker {
    /// Create a tracker using the metadata file from `config`
    pub fn new(config: &Config) -> Self {
        Self::with_path(config.metadata_path())
    }

    /// Create a tracker backed by a specific metadata file
    pub fn with_path(path: PathBuf) -> Self {
        let metadata = read_metadata(&path);
        let (sync_tx, _) = watch::channel(metadata.version);
        Self {
            path,
            metadata,
            pending: HashMap::new(),
            sync_in_progress: false,
            sync_tx,
        }
    }

    /// Record a change to `key`, returning its change id
    pub fn track(&mut self, key: &str, data: Value) -> Result<String> {
        // Another process may have advanced the version since we last looked
        let mut metadata = read_metadata(&self.path);
        metadata.version = metadata.version.max(self.metadata.version) + 1;
        metadata.last_modified = Utc::now().timestamp_millis();

        write_metadata(&self.path, &metadata)?;
        self.metadata = metadata;

        let change_id = Uuid::new_v4().simple().to_string();
        self.pending.insert(
            change_id.clone(),
            Change {
                key: key.to_string(),
                data,
                version: metadata.version,
                timestamp: Utc::now(),
            },
        );
        debug!(key, version = metadata.version, "Tracked local change");

        if !self.sync_in_progress {
            self.sync_tx.send_replace(metadata.version);
        }

        Ok(change_id)
    }

    /// Subscribe to "sync requested" notifications carrying the local version
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sync_tx.subscribe()
    }

    /// Current local version
    pub fn local_version(&self) -> u64 {
        self.metadata.version
    }

    /// Current persisted metadata
    pub fn metadata(&self) -> Metadata {
        self.metadata
    }

    /// Mark whether a sync is running; while set, no notifications are sent
    pub fn set_sync_in_progress(&mut self, in_progress: bool) {
        self.sync_in_progress = in_progress;
    }

    /// Get a pending change by id
    pub fn get(&self, change_id: &str) -> Option<&Change> {
        self.pending.get(change_id)
    }

    /// Pending changes in version order
    pub fn pending(&self) -> Vec<&Change> {
        let mut changes: Vec<_> = self.pending.values().collect();
        changes.sort_by_key(|c| c.version);
        changes
    }

    /// Remove and return every pending change in version order
    pub fn take_pending(&mut self) -> Vec<Change> {
        let mut changes: Vec<_> = self.pending.drain().map(|(_, c)| c).collect();
        changes.sort_by_key(|c| c.version);
        changes
    }
}

/// Missing or unreadable metadata counts as version 0
fn read_metadata(path: &Path) -> Metadata {
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

fn write_metadata(path: &Path, metadata: &Metadata) -> Result<()> {
    let bytes = serde_json::to_vec(metadata).context("Failed to serialize metadata")?;
    atomic_write(path, &bytes).with_context(|| format!("Failed to save metadata to {:?}", path))
}
