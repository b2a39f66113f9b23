//! In-process publish/subscribe for system events.
//!
//! Handlers run synchronously on the publishing thread, in registration
//! order. A handler that returns an error or panics is isolated: the failure
//! is logged and counted, and delivery continues with the next handler.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::system_events::SystemEvent;

/// A subscriber callback.
pub type EventHandler = Arc<dyn Fn(&SystemEvent) -> anyhow::Result<()> + Send + Sync>;

/// Identifier returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HandlerId {
    /// Human-readable name.
    pub name: String,
    id: u64,
}

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerId({}:{})", self.id, self.name)
    }
}

#[derive(Clone)]
struct HandlerEntry {
    id: HandlerId,
    handler: EventHandler,
}

/// Outcome of one [`EventBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Synchronous fan-out of [`SystemEvent`]s to registered handlers.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<HandlerEntry>>,
    next_id: AtomicU64,
    failures: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .field("failures", &self.failure_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it receives every event published afterwards.
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&SystemEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId {
            name: name.into(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        self.handlers.write().push(HandlerEntry {
            id: id.clone(),
            handler: Arc::new(handler),
        });
        log::debug!("Subscribed {:?}", id);
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: &HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|e| e.id != *id);
        handlers.len() != before
    }

    /// Deliver `event` to every handler in registration order.
    pub fn publish(&self, event: &SystemEvent) -> PublishReport {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let entries: Vec<HandlerEntry> = self.handlers.read().clone();
        let mut report = PublishReport::default();

        for entry in &entries {
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.handler)(event)));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(panic) => Some(panic_message(panic.as_ref())),
            };
            match failure {
                None => report.delivered += 1,
                Some(reason) => {
                    report.failed += 1;
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "[EventBus] Handler {} failed on {}: {}",
                        entry.id.name,
                        event.kind,
                        reason
                    );
                }
            }
        }
        report
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Total handler failures since the bus was created.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> EventHandler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let make = move |tag: &str| -> EventHandler {
            let log = Arc::clone(&log2);
            let tag = tag.to_string();
            Arc::new(move |event: &SystemEvent| {
                log.lock().push(format!("{}:{}", tag, event.kind));
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        bus.subscribe("broken", |_| anyhow::bail!("speaker offline"));
        let second = make("second");
        bus.subscribe("second", move |e| second(e));

        let report = bus.publish(&SystemEvent::device_connected("usb-1", "Mouse"));
        assert_eq!(report, PublishReport { delivered: 1, failed: 1 });
        assert_eq!(*log.lock(), vec!["second:device_connected".to_string()]);
        assert_eq!(bus.failure_count(), 1);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        bus.subscribe("panics", |_| panic!("boom"));
        let after = make("after");
        bus.subscribe("after", move |e| after(e));

        let report = bus.publish(&SystemEvent::device_removed("usb-1", "Mouse"));
        assert_eq!(report.failed, 1);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        for tag in ["a", "b", "c"] {
            let h = make(tag);
            bus.subscribe(tag, move |e| h(e));
        }

        bus.publish(&SystemEvent::driver_changed("Net", "OK", "Degraded"));
        assert_eq!(
            *log.lock(),
            vec!["a:driver_changed", "b:driver_changed", "c:driver_changed"]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let h = make("gone");
        let id = bus.subscribe("gone", move |e| h(e));

        assert!(bus.unsubscribe(&id));
        assert!(!bus.unsubscribe(&id));
        assert_eq!(bus.handler_count(), 0);

        let report = bus.publish(&SystemEvent::device_connected("usb-9", "Disk"));
        assert_eq!(report, PublishReport::default());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe("spawner", move |_| {
            inner.subscribe("late", |_| Ok(()));
            Ok(())
        });

        bus.publish(&SystemEvent::device_connected("usb-1", "Cam"));
        assert_eq!(bus.handler_count(), 2);
    }
}
