//! Synchronous publish/subscribe hub.
//!
//! [`EventBus`] is a cheap, clonable handle; every clone talks to the same
//! registry. Delivery rules:
//!
//! - Handlers for one [`EventKind`] run synchronously, in registration order,
//!   over a snapshot of the handler list taken when `publish` starts.
//! - "Once" handlers are removed from the registry before any handler of that
//!   publish runs, so re-subscribing from inside the handler does not re-fire.
//! - Every invocation is isolated. A handler returning `Err` or panicking is
//!   logged and skipped; the remaining handlers still run and the publisher
//!   never sees the failure.
//! - A handler that is already running (its own kind published re-entrantly
//!   from inside it) is skipped with a warning rather than aliased.
//!
//! No ordering is promised across different kinds.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::event::{Event, EventKind};

/// Callback type stored by the bus.
type Handler = Rc<RefCell<dyn FnMut(&Event) -> anyhow::Result<()>>>;

/// Opaque identity of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Slot {
    id: SubscriptionId,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    handlers: RefCell<BTreeMap<EventKind, Vec<Slot>>>,
    next_id: Cell<u64>,
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by [`EventBus::subscribe`]. Dropping it does **not**
/// unsubscribe; call [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    kind: EventKind,
    id: SubscriptionId,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the handler. Returns `false` if it was already gone (or the
    /// bus no longer exists).
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => remove_slot(&inner, self.kind, self.id),
            None => false,
        }
    }
}

fn remove_slot(inner: &BusInner, kind: EventKind, id: SubscriptionId) -> bool {
    let mut handlers = inner.handlers.borrow_mut();
    let Some(slots) = handlers.get_mut(&kind) else {
        return false;
    };
    let before = slots.len();
    slots.retain(|s| s.id != id);
    before != slots.len()
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Shared handle to the event registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.inner.handlers.borrow();
        let total: usize = handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus").field("subscribers", &total).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every future event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
    {
        self.add(kind, false, Rc::new(RefCell::new(handler)))
    }

    /// Register `handler` for the next event of `kind` only.
    pub fn subscribe_once<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
    {
        self.add(kind, true, Rc::new(RefCell::new(handler)))
    }

    fn add(&self, kind: EventKind, once: bool, handler: Handler) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner
            .handlers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Slot { id, once, handler });
        Subscription {
            bus: Rc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Remove one subscription by id.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        remove_slot(&self.inner, kind, id)
    }

    /// Deliver `event` to every handler of its kind. Returns the number of
    /// handlers that completed without error.
    pub fn publish(&self, event: Event) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionId, Handler)> = {
            let mut handlers = self.inner.handlers.borrow_mut();
            let Some(slots) = handlers.get_mut(&kind) else {
                return 0;
            };
            let snapshot = slots.iter().map(|s| (s.id, Rc::clone(&s.handler))).collect();
            slots.retain(|s| !s.once);
            snapshot
        };

        let mut delivered = 0;
        for (id, handler) in snapshot {
            let Ok(mut callback) = handler.try_borrow_mut() else {
                tracing::warn!(event = %kind, subscription = id.0, "handler is already running; skipped re-entrant delivery");
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| (*callback)(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::error!(event = %kind, subscription = id.0, error = %e, "event handler failed");
                }
                Err(payload) => {
                    tracing::error!(
                        event = %kind,
                        subscription = id.0,
                        panic = panic_message(&*payload),
                        "event handler panicked"
                    );
                }
            }
        }
        tracing::trace!(event = %kind, delivered, "published");
        delivered
    }

    /// Drop every handler of `kind`, or every handler when `kind` is `None`.
    pub fn clear(&self, kind: Option<EventKind>) {
        let mut handlers = self.inner.handlers.borrow_mut();
        match kind {
            Some(kind) => {
                handlers.remove(&kind);
            }
            None => handlers.clear(),
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .borrow()
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
