//! Process-wide event bus.
//!
//! Named events with multiple subscribers and no direct references between
//! emitter and listener. Component `$emit` rebroadcasts here so unrelated
//! code can observe component events. Callback errors are isolated per
//! listener: a panicking subscriber is the caller's bug, but a removed or
//! stale subscription is simply skipped.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Bus callback, invoked with the emitted arguments.
pub type BusCallback = Rc<dyn Fn(&[Value])>;

/// Identifies one subscription for targeted removal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SubscriptionId(u64);

struct BusInner {
    listeners: RefCell<HashMap<String, Vec<(SubscriptionId, BusCallback)>>>,
    next_id: Cell<u64>,
}

/// Cheap-to-clone handle on an event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus {
            inner: Rc::new(BusInner {
                listeners: RefCell::new(HashMap::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    /// Subscribe to a named event.
    pub fn on(&self, event: &str, callback: impl Fn(&[Value]) + 'static) -> SubscriptionId {
        self.on_rc(event, Rc::new(callback))
    }

    fn on_rc(&self, event: &str, callback: BusCallback) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .entry(event.to_owned())
            .or_default()
            .push((id, callback));
        id
    }

    /// Subscribe for a single delivery; the subscription removes itself
    /// after the first matching emit.
    pub fn once(&self, event: &str, callback: impl Fn(&[Value]) + 'static) -> SubscriptionId {
        let bus = self.clone();
        let event_name = event.to_owned();
        let slot: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));
        let slot_clone = slot.clone();
        let id = self.on(event, move |args| {
            callback(args);
            if let Some(id) = slot_clone.get() {
                bus.off_id(&event_name, id);
            }
        });
        slot.set(Some(id));
        id
    }

    /// Remove one subscription by id.
    pub fn off_id(&self, event: &str, id: SubscriptionId) {
        let mut listeners = self.inner.listeners.borrow_mut();
        if let Some(entries) = listeners.get_mut(event) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                listeners.remove(event);
            }
        }
    }

    /// Remove every subscription for an event.
    pub fn off(&self, event: &str) {
        self.inner.listeners.borrow_mut().remove(event);
    }

    /// Invoke all subscribers for `event`, in subscription order. Listener
    /// lists are snapshotted first, so a callback may subscribe/unsubscribe
    /// without poisoning the iteration.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let callbacks: Vec<BusCallback> = {
            let listeners = self.inner.listeners.borrow();
            match listeners.get(event) {
                Some(entries) => entries.iter().map(|(_, cb)| cb.clone()).collect(),
                None => return,
            }
        };
        for cb in callbacks {
            cb(args);
        }
    }

    /// Number of live subscriptions for an event. Test hook.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .get(event)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}
