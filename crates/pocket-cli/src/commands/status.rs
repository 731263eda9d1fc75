//! Status command handler

use anyhow::Result;

use pocket_core::storage::SCHEMA_VERSION;
use pocket_core::{ChangeTracker, Config, ContentStore};

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show(
    store: &ContentStore,
    tracker: &ChangeTracker,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let schema_version = store.schema_version().await?;
    let documents = store.count().await?;
    let metadata = tracker.metadata();
    let last_modified = chrono::DateTime::from_timestamp_millis(metadata.last_modified)
        .filter(|_| metadata.last_modified > 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string());

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "database": store.path(),
                    "schema_version": schema_version,
                    "supported_schema_version": SCHEMA_VERSION,
                    "documents": documents,
                    "local_version": metadata.version,
                    "last_modified": metadata.last_modified
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", documents);
        }
        OutputFormat::Human => {
            println!("Beaver Pocket Status");
            println!("====================");
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!("  Database: {}", store.path().display());
            println!("  Schema:   v{} (supported v{})", schema_version, SCHEMA_VERSION);
            println!();
            println!("Contents:");
            println!("  Documents: {}", documents);
            println!();
            println!("Changes:");
            println!("  Local version: {}", metadata.version);
            println!(
                "  Last change:   {}",
                last_modified.as_deref().unwrap_or("never")
            );
        }
    }

    Ok(())
}
