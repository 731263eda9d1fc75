//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use pocket_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "database_name": config.database_name,
                    "database_path": config.database_path(),
                    "operation_timeout_ms": config.operation_timeout_ms
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!("  database_name:        {}", config.database_name);
            println!(
                "  operation_timeout_ms: {}",
                config
                    .operation_timeout_ms
                    .map(|ms| ms.to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match key.as_str() {
        "data_dir" => {
            config.data_dir = value.clone().into();
        }
        "database_name" => {
            if value.is_empty() {
                bail!("database_name cannot be empty");
            }
            config.database_name = value.clone();
        }
        "operation_timeout_ms" => {
            config.operation_timeout_ms = if value.is_empty() || value == "none" {
                None
            } else {
                Some(
                    value
                        .parse()
                        .context("Invalid value for operation_timeout_ms. Use milliseconds or 'none'.")?,
                )
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, database_name, operation_timeout_ms",
                key
            );
        }
    }

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
