//! Computed values - lazy, memoized derivations.
//!
//! A computed evaluates its getter on first read, caches the result, and
//! re-evaluates only after a dependency write invalidated it. Invalidation is
//! itself a scheduled job: a write queues the computed's invalidator, which
//! marks the cache dirty and queues every computation that previously read
//! this computed, letting chains of deriveds settle across flushes.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::reactive::computation::Computation;
use crate::runtime::Runtime;

struct ComputedInner<T> {
    runtime: Runtime,
    getter: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    /// Tracked while the getter runs; queued by dependency writes.
    invalidator: RefCell<Option<Rc<Computation>>>,
    /// Computations that read this computed and must re-run on change.
    dependents: RefCell<Vec<(u64, Weak<Computation>)>>,
}

/// A lazy memoized derived value.
pub struct Computed<T: Clone + 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed {
            inner: self.inner.clone(),
        }
    }
}

impl Runtime {
    /// Create a computed from a zero-arg getter. Pure getters only: reads
    /// are tracked, side effects belong in effects and watchers.
    pub fn computed<T: Clone + 'static>(&self, getter: impl Fn() -> T + 'static) -> Computed<T> {
        let inner = Rc::new(ComputedInner {
            runtime: self.clone(),
            getter: Box::new(getter),
            value: RefCell::new(None),
            dirty: Cell::new(true),
            invalidator: RefCell::new(None),
            dependents: RefCell::new(Vec::new()),
        });

        let invalidator = Computation::new(self.next_id(), "computed", 0);
        let weak = Rc::downgrade(&inner);
        invalidator.set_runner(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate();
            }
            Ok(())
        }));
        *inner.invalidator.borrow_mut() = Some(invalidator);

        Computed { inner }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Current value. Evaluates the getter at most once per invalidation;
    /// reading from inside another computation records that computation as a
    /// dependent of this computed.
    pub fn get(&self) -> T {
        if self.inner.dirty.get() {
            let invalidator = self
                .inner
                .invalidator
                .borrow()
                .clone()
                .expect("invalidator installed at construction");
            let value = self
                .inner
                .runtime
                .with_active(&invalidator, || (self.inner.getter)());
            *self.inner.value.borrow_mut() = Some(value);
            self.inner.dirty.set(false);
        }

        if let Some(active) = self.inner.runtime.active_computation() {
            let mut dependents = self.inner.dependents.borrow_mut();
            if !dependents.iter().any(|(id, _)| *id == active.id()) {
                dependents.push((active.id(), Rc::downgrade(&active)));
            }
        }

        self.inner
            .value
            .borrow()
            .clone()
            .expect("computed value cached above")
    }

    /// True when the cache is stale. Test hook.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Stop reacting to dependency writes. Used when the owning component
    /// unmounts; a dead computed still serves its cached value.
    pub(crate) fn kill(&self) {
        if let Some(invalidator) = self.inner.invalidator.borrow().as_ref() {
            invalidator.kill();
        }
    }
}

impl<T> ComputedInner<T> {
    /// Mark dirty and queue dependents. Runs as a flush job.
    fn invalidate(&self) {
        if self.dirty.replace(true) {
            return;
        }
        let to_run: Vec<Rc<Computation>> = {
            let mut dependents = self.dependents.borrow_mut();
            dependents.retain(|(_, weak)| weak.upgrade().is_some_and(|c| c.is_alive()));
            dependents
                .iter()
                .filter_map(|(_, weak)| weak.upgrade())
                .collect()
        };
        for comp in to_run {
            self.runtime.queue(&comp);
        }
    }
}
