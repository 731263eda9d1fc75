pub mod config;
pub mod content;
pub mod prefs;
pub mod status;
