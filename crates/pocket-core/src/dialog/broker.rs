//! Dialog broker implementation
//!
//! A mediator between code that needs a modal interaction and the one
//! presenter that renders modals. The broker holds a single handler slot:
//! subscribing replaces whatever was there. Publishing with an empty slot
//! drops the request; nothing is queued for a later subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use uuid::Uuid;

use super::request::{DialogKind, DialogOptions, DialogRequest, DialogResponse};

/// Renders dialog requests
///
/// Called synchronously on the publishing thread; implementations should
/// hand the request off rather than block.
pub trait DialogHandler: Send + Sync {
    fn show(&self, request: &DialogRequest);
}

impl<F> DialogHandler for F
where
    F: Fn(&DialogRequest) + Send + Sync,
{
    fn show(&self, request: &DialogRequest) {
        self(request)
    }
}

struct Slot {
    token: u64,
    handler: Arc<dyn DialogHandler>,
}

struct Inner {
    slot: RwLock<Option<Slot>>,
    next_token: AtomicU64,
    /// Response senders for outstanding `ask` calls, by request id
    pending: Mutex<HashMap<Uuid, oneshot::Sender<DialogResponse>>>,
}

impl Inner {
    fn dismiss_pending(&self) {
        let dropped = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Dismissing unanswered dialogs");
        }
    }

    /// Drop the waiter for `id`, which resolves its `ask` as dismissed
    fn forget(&self, id: &Uuid) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }
}

/// Removes an `ask` waiter once the call finishes or is cancelled
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.inner.forget(&self.id) {
            trace!(id = %self.id, "Abandoned dialog request");
        }
    }
}

/// Process-wide dialog request channel
///
/// Clones share the same handler slot.
#[derive(Clone)]
pub struct DialogBroker {
    inner: Arc<Inner>,
}

/// Registration of the active dialog handler
///
/// Dropping it clears the slot, unless another handler has replaced it
/// since. Outstanding `ask` calls then resolve to `Dismissed`.
#[must_use = "dropping a Subscription unregisters the handler"]
pub struct Subscription {
    broker: Weak<Inner>,
    token: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.broker.upgrade() else {
            return;
        };

        let removed = {
            let mut slot = inner.slot.write().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|s| s.token == self.token) {
                *slot = None;
                true
            } else {
                false
            }
        };

        if removed {
            debug!("Dialog handler unregistered");
            inner.dismiss_pending();
        }
    }
}

impl Default for DialogBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogBroker {
    /// Create an independent broker with an empty slot
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: RwLock::new(None),
                next_token: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The application-wide broker, created on first use
    pub fn global() -> &'static DialogBroker {
        static GLOBAL: OnceLock<DialogBroker> = OnceLock::new();
        GLOBAL.get_or_init(DialogBroker::new)
    }

    /// Whether two brokers share the same slot
    pub fn same_broker(&self, other: &DialogBroker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Install `handler` as the presenter, replacing any previous one
    pub fn subscribe<H>(&self, handler: H) -> Subscription
    where
        H: DialogHandler + 'static,
    {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let replaced = {
            let mut slot = self.inner.slot.write().unwrap_or_else(PoisonError::into_inner);
            slot.replace(Slot {
                token,
                handler: Arc::new(handler),
            })
            .is_some()
        };

        if replaced {
            debug!("Dialog handler replaced");
            self.inner.dismiss_pending();
        } else {
            debug!("Dialog handler registered");
        }

        Subscription {
            broker: Arc::downgrade(&self.inner),
            token,
        }
    }

    /// Install a handler that forwards requests into a channel
    ///
    /// Suits presenters that run as their own async task.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<DialogRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let broker = Arc::downgrade(&self.inner);
        let subscription = self.subscribe(move |request: &DialogRequest| {
            if tx.send(request.clone()).is_err() {
                debug!(id = %request.id, "Dialog presenter is gone, dismissing");
                if let Some(inner) = broker.upgrade() {
                    inner.forget(&request.id);
                }
            }
        });
        (subscription, rx)
    }

    /// Whether a presenter is currently registered
    pub fn has_subscriber(&self) -> bool {
        self.inner
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Ask for a yes/no confirmation; fire-and-forget
    pub fn request_confirm(&self, options: DialogOptions) -> Uuid {
        self.publish(DialogRequest::new(DialogKind::Confirm, options))
    }

    /// Ask for a line of text; fire-and-forget
    pub fn request_prompt(&self, options: DialogOptions) -> Uuid {
        self.publish(DialogRequest::new(DialogKind::Prompt, options))
    }

    /// Ask for credentials; fire-and-forget
    pub fn request_auth(&self, options: DialogOptions) -> Uuid {
        self.publish(DialogRequest::new(DialogKind::Auth, options))
    }

    /// Publish a request and wait for the presenter's answer
    ///
    /// Resolves to `Dismissed` if no presenter is registered, or if the
    /// presenter goes away before answering.
    pub async fn ask(&self, kind: DialogKind, options: DialogOptions) -> DialogResponse {
        let request = DialogRequest::new(kind, options);
        let (tx, rx) = oneshot::channel();

        // Register before looking up the handler so an unsubscribe in
        // between still dismisses this request
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request.id, tx);
        let _guard = PendingGuard {
            inner: &self.inner,
            id: request.id,
        };

        let Some(handler) = self.current_handler() else {
            debug!(%kind, "No dialog handler registered, dismissing");
            return DialogResponse::Dismissed;
        };

        trace!(id = %request.id, %kind, "Awaiting dialog response");
        handler.show(&request);

        rx.await.unwrap_or(DialogResponse::Dismissed)
    }

    /// Deliver the user's answer for request `id`
    ///
    /// Returns false if nobody is waiting for that id.
    pub fn respond(&self, id: Uuid, response: DialogResponse) -> bool {
        let sender = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                debug!(%id, "Response for unknown dialog request");
                false
            }
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn current_handler(&self) -> Option<Arc<dyn DialogHandler>> {
        self.inner
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|slot| Arc::clone(&slot.handler))
    }

    fn publish(&self, request: DialogRequest) -> Uuid {
        let id = request.id;
        // Call outside the lock so the handler may use the broker itself
        match self.current_handler() {
            Some(handler) => {
                trace!(%id, kind = %request.kind, "Publishing dialog request");
                handler.show(&request);
            }
            None => {
                debug!(%id, kind = %request.kind, "No dialog handler registered, dropping request");
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recording(broker: &DialogBroker) -> (Subscription, Arc<StdMutex<Vec<DialogRequest>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = broker.subscribe(move |request: &DialogRequest| {
            sink.lock().unwrap().push(request.clone());
        });
        (subscription, seen)
    }

    #[test]
    fn test_publish_without_subscriber_is_dropped() {
        let broker = DialogBroker::new();
        assert!(!broker.has_subscriber());

        broker.request_confirm(DialogOptions::new("Delete?"));

        // A subscriber that arrives later sees nothing
        let (_sub, seen) = recording(&broker);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_prompt_delivered_once() {
        let broker = DialogBroker::new();
        let (_sub, seen) = recording(&broker);

        let id = broker.request_prompt(DialogOptions::new("Name?"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, id);
        assert_eq!(seen[0].kind, DialogKind::Prompt);
        assert_eq!(seen[0].options.message.as_deref(), Some("Name?"));
    }

    #[test]
    fn test_each_kind() {
        let broker = DialogBroker::new();
        let (_sub, seen) = recording(&broker);

        broker.request_confirm(DialogOptions::default());
        broker.request_prompt(DialogOptions::default());
        broker.request_auth(DialogOptions::default().with_realm("webdav"));

        let kinds: Vec<_> = seen.lock().unwrap().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![DialogKind::Confirm, DialogKind::Prompt, DialogKind::Auth]
        );
    }

    #[test]
    fn test_subscribe_replaces_previous_handler() {
        let broker = DialogBroker::new();
        let (first, first_seen) = recording(&broker);
        let (_second, second_seen) = recording(&broker);

        broker.request_confirm(DialogOptions::new("?"));
        assert!(first_seen.lock().unwrap().is_empty());
        assert_eq!(second_seen.lock().unwrap().len(), 1);

        // Dropping the stale subscription must not unregister the new one
        drop(first);
        assert!(broker.has_subscriber());
        broker.request_confirm(DialogOptions::new("?"));
        assert_eq!(second_seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_drop_subscription_unregisters() {
        let broker = DialogBroker::new();
        let (sub, seen) = recording(&broker);
        drop(sub);

        assert!(!broker.has_subscriber());
        broker.request_prompt(DialogOptions::new("Name?"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_global_is_shared() {
        assert!(DialogBroker::global().same_broker(DialogBroker::global()));
        assert!(!DialogBroker::new().same_broker(DialogBroker::global()));
    }

    #[test]
    fn test_respond_unknown_id() {
        let broker = DialogBroker::new();
        assert!(!broker.respond(Uuid::new_v4(), DialogResponse::Dismissed));
    }

    #[tokio::test]
    async fn test_ask_without_subscriber_dismissed() {
        let broker = DialogBroker::new();
        let response = broker
            .ask(DialogKind::Confirm, DialogOptions::new("Sure?"))
            .await;
        assert_eq!(response, DialogResponse::Dismissed);
    }

    #[tokio::test]
    async fn test_ask_answered_from_handler() {
        let broker = DialogBroker::new();
        let responder = broker.clone();
        let _sub = broker.subscribe(move |request: &DialogRequest| {
            let answer = DialogResponse::Text {
                value: format!("re: {}", request.options.message.clone().unwrap_or_default()),
            };
            assert!(responder.respond(request.id, answer));
        });

        let response = broker
            .ask(DialogKind::Prompt, DialogOptions::new("Name?"))
            .await;
        assert_eq!(response.text(), Some("re: Name?"));
    }

    #[tokio::test]
    async fn test_ask_answered_by_channel_presenter() {
        let broker = DialogBroker::new();
        let (_sub, mut rx) = broker.subscribe_channel();

        let presenter = broker.clone();
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                presenter.respond(
                    request.id,
                    DialogResponse::Credentials {
                        username: request.options.username.unwrap_or_default(),
                        password: "hunter2".into(),
                    },
                );
            }
        });

        let response = broker
            .ask(DialogKind::Auth, DialogOptions::default().with_username("ada"))
            .await;
        assert_eq!(
            response,
            DialogResponse::Credentials {
                username: "ada".into(),
                password: "hunter2".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_dismisses_outstanding_ask() {
        let broker = DialogBroker::new();
        let (sub, mut rx) = broker.subscribe_channel();

        let asker = broker.clone();
        let pending =
            tokio::spawn(async move { asker.ask(DialogKind::Confirm, DialogOptions::new("?")).await });

        let request = rx.recv().await.unwrap();
        assert_eq!(request.kind, DialogKind::Confirm);
        drop(sub);

        assert_eq!(pending.await.unwrap(), DialogResponse::Dismissed);
        assert!(!broker.respond(request.id, DialogResponse::Dismissed));
    }

    #[tokio::test]
    async fn test_ask_dismissed_when_channel_receiver_dropped() {
        let broker = DialogBroker::new();
        let (_sub, rx) = broker.subscribe_channel();
        drop(rx);

        let response = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            broker.ask(DialogKind::Confirm, DialogOptions::new("Sure?")),
        )
        .await
        .expect("ask should resolve once the presenter is gone");

        assert_eq!(response, DialogResponse::Dismissed);
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_ask_releases_pending_entry() {
        let broker = DialogBroker::new();
        let (_sub, mut rx) = broker.subscribe_channel();

        for _ in 0..20 {
            let result = tokio::time::timeout(
                std::time::Duration::from_millis(1),
                broker.ask(DialogKind::Prompt, DialogOptions::new("Name?")),
            )
            .await;
            assert!(result.is_err());
        }
        assert_eq!(broker.pending_count(), 0);

        // Late answers for cancelled requests are ignored
        let request = rx.recv().await.unwrap();
        assert!(!broker.respond(request.id, DialogResponse::Dismissed));
    }

    #[tokio::test]
    async fn test_answered_ask_leaves_nothing_pending() {
        let broker = DialogBroker::new();
        let responder = broker.clone();
        let _sub = broker.subscribe(move |request: &DialogRequest| {
            responder.respond(request.id, DialogResponse::Confirmed { accepted: true });
        });

        let response = broker
            .ask(DialogKind::Confirm, DialogOptions::new("Sure?"))
            .await;
        assert!(response.is_accepted());
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_ask_without_subscriber_leaves_nothing_pending() {
        let broker = DialogBroker::new();
        let response = broker.ask(DialogKind::Auth, DialogOptions::default()).await;
        assert_eq!(response, DialogResponse::Dismissed);
        assert_eq!(broker.pending_count(), 0);
    }
}
