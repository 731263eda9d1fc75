//! SQLite schema for the content cache
//!
//! The schema version lives in `schema_info`. Opening a database runs every
//! migration step between the on-disk version and [`SCHEMA_VERSION`]. Each
//! step is idempotent so a crash mid-upgrade, or an upgrade repeated by a
//! second process, leaves the database consistent.
//!
//! ## Versions
//!
//! 1. `content_store(id, content)`: one record per document
//! 2. `updated_at` column plus an index for recency listing

use rusqlite::{Connection, OptionalExtension, Result, Transaction};
use tracing::{debug, info};

use super::error::{StoreError, StoreResult};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

/// Name of the single content table
pub const CONTENT_TABLE: &str = "content_store";

type Migration = fn(&Transaction<'_>) -> Result<()>;

/// Migration steps; entry `n` upgrades version `n` to `n + 1`
const MIGRATIONS: [Migration; SCHEMA_VERSION as usize] = [create_content_table, add_updated_at];

fn create_content_table(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS content_store (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL
        );
        "#,
    )
}

fn add_updated_at(tx: &Transaction<'_>) -> Result<()> {
    if !column_exists(tx, CONTENT_TABLE, "updated_at")? {
        tx.execute_batch(
            "ALTER TABLE content_store ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0;",
        )?;
    }

    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_content_store_updated_at ON content_store(updated_at);",
    )
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Get the current schema version from the database
///
/// A database without `schema_info` (freshly created) reports version 0.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")?
        .exists([])?;

    if !table_exists {
        return Ok(0);
    }

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

/// Check if schema needs initialization or migration
pub fn needs_upgrade(conn: &Connection) -> bool {
    match get_schema_version(conn) {
        Ok(v) => v < SCHEMA_VERSION,
        Err(_) => true,
    }
}

/// Bring the schema from `old_version` up to `new_version`
///
/// All steps run in one transaction and the new version is recorded last,
/// so a failed upgrade leaves the previous version in place.
pub fn upgrade(conn: &mut Connection, old_version: i32, new_version: i32) -> StoreResult<()> {
    let upgrade_err = |source: rusqlite::Error| StoreError::Upgrade {
        from: old_version,
        to: new_version,
        source,
    };

    let start = old_version.max(0);
    let end = new_version.min(SCHEMA_VERSION);
    if start >= end {
        debug!(old_version, new_version, "Schema already current");
        return Ok(());
    }

    info!(old_version, new_version, "Upgrading content schema");

    let tx = conn.transaction().map_err(upgrade_err)?;
    for step in start..end {
        debug!(from = step, to = step + 1, "Applying migration");
        MIGRATIONS[step as usize](&tx).map_err(upgrade_err)?;
    }
    tx.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [end.to_string()],
    )
    .map_err(upgrade_err)?;
    tx.commit().map_err(upgrade_err)?;

    Ok(())
}
