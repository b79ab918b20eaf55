use crate::traits::NotificationMessage;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::error;

/// A notification consumer
///
/// Identity is the `Arc` pointer: registering the same `Arc` twice keeps a
/// single entry.
pub type Subscriber = Arc<dyn Fn(&NotificationMessage) + Send + Sync>;

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Set of subscribers with panic-isolated fan-out
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Subscriber>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if this exact handler was already registered
    pub fn add(&self, handler: Subscriber) -> bool {
        let mut handlers = self.handlers.write();
        if handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Returns false if the handler was not registered
    pub fn remove(&self, handler: &Subscriber) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        handlers.len() != before
    }

    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Invoke every handler registered at the start of the call
    ///
    /// Handlers run synchronously in registration order, outside the lock, so
    /// they may subscribe or unsubscribe. A panicking handler is logged and
    /// counted; the rest still run.
    pub fn dispatch(&self, message: &NotificationMessage) -> DispatchReport {
        let snapshot: Vec<Subscriber> = self.handlers.read().clone();
        let mut report = DispatchReport::default();

        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(()) => report.delivered += 1,
                Err(panic) => {
                    report.failed += 1;
                    error!("Notification subscriber panicked: {}", panic_message(&*panic));
                }
            }
        }

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Removes one subscriber when `unsubscribe()` is called
///
/// Dropping the handle does NOT unsubscribe. Calling `unsubscribe()` more
/// than once, or after the orchestrator is gone, is harmless.
pub struct Unsubscribe {
    registry: Weak<HandlerRegistry>,
    handler: Subscriber,
}

impl Unsubscribe {
    pub(crate) fn new(registry: &Arc<HandlerRegistry>, handler: Subscriber) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            handler,
        }
    }

    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.handler);
        }
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Subscriber) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handler: Subscriber = Arc::new(move |_: &NotificationMessage| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    fn message() -> NotificationMessage {
        NotificationMessage::new(json!({"id": "n-1"}))
    }

    #[test]
    fn test_set_semantics() {
        let registry = HandlerRegistry::new();
        let (count, handler) = counter();

        assert!(registry.add(handler.clone()));
        assert!(!registry.add(handler.clone()));
        assert_eq!(registry.len(), 1);

        registry.dispatch(&message());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let registry = HandlerRegistry::new();
        let (before, first) = counter();
        let (after, last) = counter();

        registry.add(first);
        registry.add(Arc::new(|_: &NotificationMessage| panic!("subscriber bug")));
        registry.add(last);

        let report = registry.dispatch(&message());
        assert_eq!(report, DispatchReport { delivered: 2, failed: 1 });
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_handler() {
        let registry = Arc::new(HandlerRegistry::new());
        let (kept, keep) = counter();
        let (dropped, drop_me) = counter();

        registry.add(keep);
        registry.add(drop_me.clone());
        let handle = Unsubscribe::new(&registry, drop_me);

        handle.unsubscribe();
        handle.unsubscribe();
        registry.dispatch(&message());

        assert_eq!(kept.load(Ordering::SeqCst), 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself_during_dispatch() {
        let registry = Arc::new(HandlerRegistry::new());
        let slot: Arc<parking_lot::Mutex<Option<Unsubscribe>>> = Arc::new(parking_lot::Mutex::new(None));
        let count = Arc::new(AtomicUsize::new(0));

        let (s, c) = (slot.clone(), count.clone());
        let handler: Subscriber = Arc::new(move |_: &NotificationMessage| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = s.lock().as_ref() {
                handle.unsubscribe();
            }
        });
        registry.add(handler.clone());
        *slot.lock() = Some(Unsubscribe::new(&registry, handler));

        registry.dispatch(&message());
        registry.dispatch(&message());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}
