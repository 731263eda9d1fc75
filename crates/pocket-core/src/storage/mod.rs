//! Storage layer
//!
//! Local persistence that works without network access.
//!
//! ## Architecture
//!
//! - **Content store**: versioned SQLite database caching each document's
//!   serialized editor content, keyed by document id
//! - **JSON stores**: small named preference files, rewritten atomically
//!
//! Only [`ContentStore`] opens the content database; everything else goes
//! through its operations.

pub mod content;
pub mod error;
pub mod json_store;
pub mod schema;

pub use content::ContentStore;
pub use error::{ErrorKind, Operation, StoreError, StoreResult};
pub use json_store::JsonStore;
pub use schema::{get_schema_version, needs_upgrade, upgrade, SCHEMA_VERSION};
