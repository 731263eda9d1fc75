//! Preference store command handlers

use anyhow::Result;
use serde_json::Value;

use pocket_core::JsonStore;

use crate::output::Output;

/// Show one preference
pub fn get(store: &JsonStore, key: String, output: &Output) -> Result<()> {
    output.print_value(&key, store.get(&key).as_ref());
    Ok(())
}

/// Set a preference; values that parse as JSON are stored as JSON
pub fn set(store: &JsonStore, key: String, value: String, output: &Output) -> Result<()> {
    let parsed = parse_value(&value);
    store.set(&key, parsed.clone())?;
    output.success(&format!("Set {} = {}", key, parsed));
    Ok(())
}

/// Remove a preference
pub fn delete(store: &JsonStore, key: String, output: &Output) -> Result<()> {
    if store.delete(&key)? {
        output.success(&format!("Removed {}", key));
    } else {
        output.message(&format!("{} is not set", key));
    }
    Ok(())
}

/// Show every preference in the store
pub fn list(store: &JsonStore, output: &Output) -> Result<()> {
    output.print_map(&store.all());
    Ok(())
}

/// Remove every preference in the store
pub fn clear(store: &JsonStore, output: &Output) -> Result<()> {
    store.clear()?;
    output.success(&format!("Cleared {}", store.path().display()));
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("16"), json!(16));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_value("dark"), json!("dark"));
        assert_eq!(parse_value(r#""quoted""#), json!("quoted"));
    }
}
