//! Data models for Beaver Pocket
//!
//! Defines the cached content record and the change entries queued for sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialized editor content for a single document
///
/// `content` is opaque to the store: a JSON document tree, or an HTML string
/// held as `Value::String`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRecord {
    /// Document identifier (primary key)
    pub id: String,
    /// The editor's serialized document
    pub content: Value,
    /// When this record was last written
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Create a record stamped with the current time
    pub fn new(id: impl Into<String>, content: Value) -> Self {
        Self {
            id: id.into(),
            content,
            updated_at: Utc::now(),
        }
    }

    /// The content as an HTML string, if that is how it was stored
    pub fn as_html(&self) -> Option<&str> {
        self.content.as_str()
    }
}

/// A local change waiting to be pushed by the sync layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Change {
    /// Storage key the change applies to
    pub key: String,
    /// New value for the key
    pub data: Value,
    /// Local version number assigned to this change
    pub version: u64,
    /// When the change was recorded
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_new() {
        let record = ContentRecord::new("note-1", json!({"type": "doc", "content": []}));
        assert_eq!(record.id, "note-1");
        assert!(record.as_html().is_none());
        assert!(record.updated_at <= Utc::now());
    }

    #[test]
    fn test_html_record() {
        let record = ContentRecord::new("note-2", Value::String("<p>Hello</p>".into()));
        assert_eq!(record.as_html(), Some("<p>Hello</p>"));
    }

    #[test]
    fn test_record_serialization() {
        let record = ContentRecord::new("note-3", json!({"type": "doc"}));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"id\":\"note-3\""));
        assert!(json.contains("updated_at"));

        let parsed: ContentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
