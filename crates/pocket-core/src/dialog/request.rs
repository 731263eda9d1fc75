//! Dialog request and response types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The kind of modal interaction being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
    /// Yes/no confirmation
    Confirm,
    /// Single line of text input
    Prompt,
    /// Credential entry
    Auth,
}

impl DialogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogKind::Confirm => "confirm",
            DialogKind::Prompt => "prompt",
            DialogKind::Auth => "auth",
        }
    }
}

impl fmt::Display for DialogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a requested interaction
///
/// The broker forwards options untouched; interpreting them is up to the
/// presenter. Fields the typed struct does not know about travel in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Pre-filled text for `prompt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_text: Option<String>,
    /// Pre-filled user name for `auth`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Service or account the credentials are for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DialogOptions {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A single published request for user interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogRequest {
    /// Correlation id used to answer via `DialogBroker::respond`
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: DialogKind,
    pub options: DialogOptions,
}

impl DialogRequest {
    pub fn new(kind: DialogKind, options: DialogOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            options,
        }
    }
}

/// The user's answer to a dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DialogResponse {
    /// Answer to `confirm`
    Confirmed { accepted: bool },
    /// Answer to `prompt`
    Text { value: String },
    /// Answer to `auth`
    Credentials { username: String, password: String },
    /// Closed without answering, or nobody was there to ask
    Dismissed,
}

impl DialogResponse {
    /// Whether the user accepted a confirmation
    pub fn is_accepted(&self) -> bool {
        matches!(self, DialogResponse::Confirmed { accepted: true })
    }

    /// Text entered in a prompt, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            DialogResponse::Text { value } => Some(value),
            _ => None,
        }
    }
}
