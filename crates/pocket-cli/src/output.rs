//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use pocket_core::ContentRecord;
use serde_json::{Map, Value};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single cached record
    pub fn print_record(&self, record: &ContentRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", record.id);
                println!(
                    "Updated: {}",
                    record.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
                println!();
                match record.as_html() {
                    Some(html) => println!("{}", html),
                    None => println!("{}", pretty(&record.content)),
                }
            }
            OutputFormat::Json => {
                println!("{}", pretty(&serde_json::to_value(record).unwrap_or(Value::Null)));
            }
            OutputFormat::Quiet => match record.as_html() {
                Some(html) => println!("{}", html),
                None => println!("{}", record.content),
            },
        }
    }

    /// Print a list of document ids
    pub fn print_ids(&self, ids: &[String]) {
        match self.format {
            OutputFormat::Human => {
                if ids.is_empty() {
                    println!("No cached content.");
                    return;
                }
                for id in ids {
                    println!("{}", id);
                }
                println!("\n{} document(s)", ids.len());
            }
            OutputFormat::Json => {
                println!("{}", pretty(&Value::from(ids.to_vec())));
            }
            OutputFormat::Quiet => {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
    }

    /// Print a single preference value
    pub fn print_value(&self, key: &str, value: Option<&Value>) {
        match self.format {
            OutputFormat::Human => match value {
                Some(v) => println!("{} = {}", key, v),
                None => println!("{} is not set", key),
            },
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "key": key, "value": value }));
            }
            OutputFormat::Quiet => {
                if let Some(v) = value {
                    println!("{}", v);
                }
            }
        }
    }

    /// Print every pair in a preference store
    pub fn print_map(&self, data: &Map<String, Value>) {
        match self.format {
            OutputFormat::Human => {
                if data.is_empty() {
                    println!("No preferences set.");
                    return;
                }
                for (key, value) in data {
                    println!("{} = {}", key, truncate(&value.to_string(), 60));
                }
            }
            OutputFormat::Json => {
                println!("{}", pretty(&Value::Object(data.clone())));
            }
            OutputFormat::Quiet => {
                for key in data.keys() {
                    println!("{}", key);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
