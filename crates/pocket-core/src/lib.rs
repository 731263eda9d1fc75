//! Beaver Pocket Core Library
//!
//! Local-first building blocks for the Beaver Pocket note-taking app.
//!
//! # Architecture
//!
//! - **Content store**: offline cache of each document's serialized editor
//!   content, in a versioned SQLite database
//! - **Dialog broker**: process-wide channel through which any component can
//!   request a modal interaction from the single presentation layer
//!
//! # Quick Start
//!
//! ```text
//! let store = ContentStore::open(&Config::load()?).await?;
//!
//! store.put("note-1", json!({"type": "doc", "content": []})).await?;
//! let cached = store.get("note-1").await?;
//! ```
//!
//! # Modules
//!
//! - `storage`: content store, schema versioning, JSON preference stores
//! - `dialog`: dialog request broker
//! - `changes`: local change tracking for sync
//! - `models`: data structures for cached content and changes
//! - `config`: application configuration

pub mod changes;
pub mod config;
pub mod dialog;
pub mod models;
pub mod storage;

pub use changes::{ChangeTracker, Metadata};
pub use config::Config;
pub use dialog::{DialogBroker, DialogKind, DialogOptions, DialogRequest, DialogResponse};
pub use models::{Change, ContentRecord};
pub use storage::{ContentStore, ErrorKind, JsonStore, StoreError, StoreResult};
