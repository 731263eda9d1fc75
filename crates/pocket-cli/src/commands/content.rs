//! Content command handlers
//!
//! Read and write the offline content cache directly.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use pocket_core::{
    ChangeTracker, ContentStore, DialogBroker, DialogKind, DialogOptions, DialogResponse,
};

use crate::output::Output;

/// Where new content comes from
pub enum ContentSource {
    /// A JSON document tree given inline
    Doc(String),
    /// An HTML string given inline
    Html(String),
    /// A file: `.json` files are parsed, anything else is stored as text
    File(PathBuf),
    /// Ask for it through a prompt dialog
    Prompt,
}

/// Store content for a document
pub async fn put(
    store: &ContentStore,
    tracker: &mut ChangeTracker,
    id: String,
    source: ContentSource,
    output: &Output,
) -> Result<()> {
    let content = resolve_content(&id, source).await?;

    store
        .put(&id, content.clone())
        .await
        .with_context(|| format!("Failed to cache content for '{}'", id))?;

    let change_id = tracker
        .track(&id, content)
        .context("Failed to record change for sync")?;

    output.success(&format!(
        "Cached {} (change {}, local version {})",
        id,
        &change_id[..8],
        tracker.local_version()
    ));

    Ok(())
}

/// Show cached content for a document
pub async fn get(store: &ContentStore, id: String, output: &Output) -> Result<()> {
    let record = store
        .get(&id)
        .await
        .with_context(|| format!("Failed to read cached content for '{}'", id))?;

    match record {
        Some(record) => output.print_record(&record),
        None => bail!("No cached content for '{}'", id),
    }

    Ok(())
}

/// Remove cached content for a document
pub async fn delete(store: &ContentStore, id: String, yes: bool, output: &Output) -> Result<()> {
    if !yes && output.should_prompt() {
        let answer = DialogBroker::global()
            .ask(
                DialogKind::Confirm,
                DialogOptions::new("Are you sure?")
                    .with_title(format!("Delete cached content: {}", id)),
            )
            .await;

        if !answer.is_accepted() {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = store
        .delete(&id)
        .await
        .with_context(|| format!("Failed to delete cached content for '{}'", id))?;

    if removed {
        output.success(&format!("Deleted cached content: {}", id));
    } else {
        output.message(&format!("Nothing cached for '{}'", id));
    }

    Ok(())
}

/// List every cached document id
pub async fn list(store: &ContentStore, output: &Output) -> Result<()> {
    let ids = store
        .list_ids()
        .await
        .context("Failed to list cached content")?;
    output.print_ids(&ids);
    Ok(())
}

async fn resolve_content(id: &str, source: ContentSource) -> Result<Value> {
    match source {
        ContentSource::Doc(raw) => {
            serde_json::from_str(&raw).context("Content passed with --doc is not valid JSON")
        }
        ContentSource::Html(html) => Ok(Value::String(html)),
        ContentSource::File(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            if path.extension().is_some_and(|ext| ext == "json") {
                serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {:?}", path))
            } else {
                Ok(Value::String(raw))
            }
        }
        ContentSource::Prompt => {
            let answer = DialogBroker::global()
                .ask(
                    DialogKind::Prompt,
                    DialogOptions::new(format!("Content for {}", id)),
                )
                .await;
            match answer {
                DialogResponse::Text { value } => Ok(Value::String(value)),
                _ => bail!("No content given. Use --doc, --html or --file."),
            }
        }
    }
}
