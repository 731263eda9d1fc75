//! Beaver Pocket CLI
//!
//! Command-line access to the offline content cache and preference stores.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pocket_core::storage::json_store::DEFAULT_STORE;
use pocket_core::{ChangeTracker, Config, ContentStore, DialogBroker, JsonStore};

mod commands;
mod output;
mod prompt;

use commands::content::ContentSource;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "pocket")]
#[command(about = "Beaver Pocket - offline note content cache")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug information to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage cached document content
    Content {
        #[command(subcommand)]
        command: ContentCommands,
    },
    /// Manage preference stores
    Prefs {
        /// Store name
        #[arg(short, long, default_value = DEFAULT_STORE)]
        store: String,
        #[command(subcommand)]
        command: PrefsCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show storage status
    Status,
}

#[derive(Subcommand)]
enum ContentCommands {
    /// Cache content for a document
    #[command(alias = "set")]
    Put {
        /// Document ID
        id: String,
        /// Editor document as JSON
        #[arg(long, conflicts_with_all = ["html", "file"])]
        doc: Option<String>,
        /// Editor document as HTML
        #[arg(long, conflicts_with = "file")]
        html: Option<String>,
        /// Read content from a file (.json files are parsed)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show cached content for a document
    Get {
        /// Document ID
        id: String,
    },
    /// Remove cached content for a document
    #[command(alias = "rm")]
    Delete {
        /// Document ID
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// List cached documents
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Show a preference
    Get { key: String },
    /// Set a preference (JSON values are parsed)
    Set { key: String, value: String },
    /// Remove a preference
    #[command(alias = "rm")]
    Delete { key: String },
    /// Show every preference
    #[command(alias = "ls")]
    List,
    /// Remove every preference
    Clear,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, database_name, operation_timeout_ms)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands must work even when the data dir is broken
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    debug!("Using data directory {:?}", config.data_dir);

    if let Commands::Prefs { store, command } = cli.command {
        let store = JsonStore::new(&config.data_dir, &store);
        return handle_prefs_command(command, &store, &output);
    }

    let _presenter = prompt::spawn_presenter(DialogBroker::global());

    let store = match ContentStore::open(&config).await {
        Ok(store) => store,
        Err(e) => {
            if let Some(hint) = e.recovery_suggestion() {
                eprintln!("{}", hint);
            }
            return Err(e).context("Failed to open content store");
        }
    };
    let mut tracker = ChangeTracker::new(&config);

    match cli.command {
        Commands::Content { command } => {
            handle_content_command(command, &store, &mut tracker, &output).await
        }
        Commands::Status => commands::status::show(&store, &tracker, &config, &output).await,
        Commands::Prefs { .. } | Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_content_command(
    command: ContentCommands,
    store: &ContentStore,
    tracker: &mut ChangeTracker,
    output: &Output,
) -> Result<()> {
    match command {
        ContentCommands::Put {
            id,
            doc,
            html,
            file,
        } => {
            let source = match (doc, html, file) {
                (Some(doc), _, _) => ContentSource::Doc(doc),
                (_, Some(html), _) => ContentSource::Html(html),
                (_, _, Some(path)) => ContentSource::File(path),
                _ => ContentSource::Prompt,
            };
            commands::content::put(store, tracker, id, source, output).await
        }
        ContentCommands::Get { id } => commands::content::get(store, id, output).await,
        ContentCommands::Delete { id, yes } => {
            commands::content::delete(store, id, yes, output).await
        }
        ContentCommands::List => commands::content::list(store, output).await,
    }
}

fn handle_prefs_command(command: PrefsCommands, store: &JsonStore, output: &Output) -> Result<()> {
    match command {
        PrefsCommands::Get { key } => commands::prefs::get(store, key, output),
        PrefsCommands::Set { key, value } => commands::prefs::set(store, key, value, output),
        PrefsCommands::Delete { key } => commands::prefs::delete(store, key, output),
        PrefsCommands::List => commands::prefs::list(store, output),
        PrefsCommands::Clear => commands::prefs::clear(store, output),
    }
}

/// Initialize stderr logging
///
/// `RUST_LOG` wins when set; otherwise warnings only, or debug with --verbose.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pocket_core={},pocket_cli={}", level, level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_content_put() {
        let cli = Cli::try_parse_from(["pocket", "content", "put", "note-1", "--html", "<p>x</p>"])
            .unwrap();
        match cli.command {
            Commands::Content {
                command: ContentCommands::Put { id, html, doc, file },
            } => {
                assert_eq!(id, "note-1");
                assert_eq!(html.as_deref(), Some("<p>x</p>"));
                assert!(doc.is_none() && file.is_none());
            }
            _ => panic!("expected content put"),
        }
    }

    #[test]
    fn test_put_sources_conflict() {
        assert!(Cli::try_parse_from([
            "pocket", "content", "put", "n", "--doc", "{}", "--html", "<p/>"
        ])
        .is_err());
    }

    #[test]
    fn test_prefs_default_store() {
        let cli = Cli::try_parse_from(["pocket", "prefs", "list"]).unwrap();
        match cli.command {
            Commands::Prefs { store, .. } => assert_eq!(store, DEFAULT_STORE),
            _ => panic!("expected prefs"),
        }
    }
}
