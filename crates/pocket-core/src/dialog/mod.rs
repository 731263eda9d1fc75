//! Dialog broker
//!
//! Lets any part of the application request a modal interaction (confirm,
//! prompt, auth) without knowing who renders it. Exactly one presenter is
//! expected to be subscribed at a time.
//!
//! ## Usage
//!
//! ```ignore
//! // Presenter side
//! let (_subscription, mut requests) = DialogBroker::global().subscribe_channel();
//!
//! // Caller side, fire-and-forget
//! DialogBroker::global().request_confirm(DialogOptions::new("Discard changes?"));
//!
//! // Caller side, waiting for the answer
//! let answer = DialogBroker::global()
//!     .ask(DialogKind::Prompt, DialogOptions::new("Name?"))
//!     .await;
//! ```

mod broker;
mod request;

pub use broker::{DialogBroker, DialogHandler, Subscription};
pub use request::{DialogKind, DialogOptions, DialogRequest, DialogResponse};
