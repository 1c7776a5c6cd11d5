//! Computation - the re-runnable unit behind effects, watchers, computed
//! invalidation, and component renders.
//!
//! A computation is created once per registration, scheduled many times, and
//! killed when its owner goes away. The scheduler and the dependency maps
//! hold computations weakly; a killed computation is pruned on the next
//! notification and never runs again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::Error;

/// Runner installed into a computation. Manages its own tracking scope:
/// runners that need dependency tracking activate themselves via
/// [`crate::runtime::Runtime::with_active`].
pub(crate) type Runner = Box<dyn FnMut() -> Result<(), Error>>;

/// A re-runnable unit of work registered with the reactive graph.
pub struct Computation {
    id: u64,
    priority: i32,
    label: String,
    alive: Cell<bool>,
    runner: RefCell<Option<Runner>>,
}

impl Computation {
    /// Create a computation. The runner is installed separately because most
    /// runners need a `Weak` back-reference to the computation itself.
    pub(crate) fn new(id: u64, label: impl Into<String>, priority: i32) -> Rc<Computation> {
        Rc::new(Computation {
            id,
            priority,
            label: label.into(),
            alive: Cell::new(true),
            runner: RefCell::new(None),
        })
    }

    pub(crate) fn set_runner(&self, runner: Runner) {
        *self.runner.borrow_mut() = Some(runner);
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// Permanently stop this computation. It is pruned from dependency maps
    /// on the next notification and skipped if already queued.
    pub fn kill(&self) {
        self.alive.set(false);
        // Drop the runner so captured state (components, closures) releases.
        *self.runner.borrow_mut() = None;
    }

    /// Run the installed runner once. A computation that re-enters itself
    /// synchronously is skipped rather than deadlocked on the borrow.
    pub(crate) fn run(&self) -> Result<(), Error> {
        if !self.alive.get() {
            return Ok(());
        }
        let Ok(mut slot) = self.runner.try_borrow_mut() else {
            tracing::warn!(job = %self.label, "computation re-entered itself; skipping");
            return Ok(());
        };
        match slot.as_mut() {
            Some(runner) => runner(),
            None => Ok(()),
        }
    }
}
