//! Storage error handling
//!
//! Every failure of the content store falls into one of two kinds:
//!
//! - [`ErrorKind::StorageUnavailable`]: the container cannot be opened at all.
//!   Fatal for that `open` call; no handle is produced.
//! - [`ErrorKind::OperationFailed`]: a single call failed. The handle that
//!   issued it stays usable.
//!
//! A missing record is not an error: `get` returns `Ok(None)`.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Coarse classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The storage container could not be opened
    StorageUnavailable,
    /// A single operation failed; the store remains usable
    OperationFailed,
}

/// The store operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Put,
    Get,
    Delete,
    List,
    Count,
    Version,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Open => "open content store",
            Operation::Put => "write content",
            Operation::Get => "read content",
            Operation::Delete => "delete content",
            Operation::List => "list content",
            Operation::Count => "count content",
            Operation::Version => "read schema version of",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during content store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The database file could not be opened or configured
    #[error("Content database at '{path}' is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The on-disk schema was written by a newer version of the application
    #[error(
        "Content database at '{path}' has schema version {found}, newer than supported version {supported}"
    )]
    VersionTooNew {
        path: PathBuf,
        found: i32,
        supported: i32,
    },

    /// A schema migration step failed
    #[error("Schema upgrade from version {from} to {to} failed: {source}")]
    Upgrade {
        from: i32,
        to: i32,
        #[source]
        source: rusqlite::Error,
    },

    /// A put/get/delete/list call was rejected by the database
    #[error("Failed to {operation} '{id}': {source}")]
    Operation {
        operation: Operation,
        id: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Content could not be encoded or a stored payload could not be decoded
    #[error("Content '{id}' could not be (de)serialized: {source}")]
    Serialization {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The caller-imposed deadline elapsed before the operation completed
    #[error("Timed out after {after:?} trying to {operation} '{id}'")]
    TimedOut {
        operation: Operation,
        id: String,
        after: Duration,
    },

    /// The blocking storage task panicked or was cancelled
    #[error("Storage task to {operation} did not complete: {source}")]
    Task {
        operation: Operation,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl StoreError {
    /// Classify this error into the store's error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::CreateDirectory { .. }
            | StoreError::Unavailable { .. }
            | StoreError::VersionTooNew { .. }
            | StoreError::Task {
                operation: Operation::Open,
                ..
            } => ErrorKind::StorageUnavailable,
            StoreError::Upgrade { .. }
            | StoreError::Operation { .. }
            | StoreError::Serialization { .. }
            | StoreError::TimedOut { .. }
            | StoreError::Task { .. } => ErrorKind::OperationFailed,
        }
    }

    /// Whether retrying later (after the user frees space, etc.) may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            StoreError::TimedOut { .. } => true,
            StoreError::Operation { source, .. } | StoreError::Upgrade { source, .. } => {
                matches!(
                    sqlite_code(source),
                    Some(ErrorCode::DiskFull | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
                )
            }
            StoreError::CreateDirectory { source, .. } => {
                source.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }

    /// Whether the underlying failure was a full disk or exhausted quota
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            StoreError::Operation { source, .. }
            | StoreError::Upgrade { source, .. }
            | StoreError::Unavailable { source, .. } => {
                sqlite_code(source) == Some(ErrorCode::DiskFull)
            }
            StoreError::CreateDirectory { source, .. } => is_disk_full_error(source),
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        if self.is_quota_exceeded() {
            return Some("Free up disk space and try again.");
        }

        match self {
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::VersionTooNew { .. } => {
                Some("This data was written by a newer version of Beaver Pocket. Upgrade the application to open it.")
            }
            StoreError::Unavailable { .. } => {
                Some("Check file permissions on the data directory, or point POCKET_DATA_DIR elsewhere.")
            }
            StoreError::TimedOut { .. } => Some("The database may be busy. Try again."),
            _ => None,
        }
    }
}

/// Extract the primary SQLite result code from a rusqlite error
fn sqlite_code(error: &rusqlite::Error) -> Option<ErrorCode> {
    match error {
        rusqlite::Error::SqliteFailure(inner, _) => Some(inner.code),
        _ => None,
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for content store operations
pub type StoreResult<T> = Result<T, StoreError>;
