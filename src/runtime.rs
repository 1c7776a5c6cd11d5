//! Runtime context - the shared state every reactive primitive hangs off.
//!
//! Holds the active-computation stack, the scheduler, the event bus, the
//! observable wrap registry, and a default document. There is one default
//! runtime per thread for ergonomic parity with a global runtime, but
//! everything is injectable: tests build an isolated `Runtime::new()` instead
//! of resetting shared state.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::bus::EventBus;
use crate::reactive::computation::Computation;
use crate::reactive::observable::ObservableState;
use crate::scheduler::{Scheduler, Task};
use crate::tree::document::Document;

/// Upper bound on microtasks drained by one `settle` call. A chain this long
/// means some job reschedules itself unconditionally.
const SETTLE_TASK_LIMIT: u32 = 100_000;

pub(crate) struct RuntimeInner {
    pub(crate) scheduler: Scheduler,
    bus: EventBus,
    document: Rc<RefCell<Document>>,
    effect_stack: RefCell<Vec<Rc<Computation>>>,
    /// Wrap registry: allocation pointer of the wrapped map/list to its
    /// observable state. Holds the state strongly and the target weakly, so
    /// wrapping never extends the wrapped data's lifetime.
    pub(crate) observables: RefCell<HashMap<usize, Rc<ObservableState>>>,
    wrap_count: Cell<u32>,
    next_id: Cell<u64>,
}

/// Cheap-to-clone handle on a runtime context.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

thread_local! {
    static GLOBAL: Runtime = Runtime::new();
}

/// The thread's default runtime.
pub fn global() -> Runtime {
    GLOBAL.with(|rt| rt.clone())
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

impl Runtime {
    /// Create an isolated runtime with its own scheduler, bus, registry, and
    /// document.
    pub fn new() -> Runtime {
        Runtime {
            inner: Rc::new(RuntimeInner {
                scheduler: Scheduler::new(),
                bus: EventBus::new(),
                document: Rc::new(RefCell::new(Document::new())),
                effect_stack: RefCell::new(Vec::new()),
                observables: RefCell::new(HashMap::new()),
                wrap_count: Cell::new(0),
                next_id: Cell::new(1),
            }),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    /// The runtime's event bus.
    pub fn bus(&self) -> EventBus {
        self.inner.bus.clone()
    }

    /// The runtime's default document.
    pub fn document(&self) -> Rc<RefCell<Document>> {
        self.inner.document.clone()
    }

    // =========================================================================
    // Active-computation stack
    // =========================================================================

    /// The computation currently recording dependencies, if any.
    pub(crate) fn active_computation(&self) -> Option<Rc<Computation>> {
        self.inner.effect_stack.borrow().last().cloned()
    }

    /// Run `f` with `comp` as the active computation: every observable read
    /// inside records a dependency edge against it.
    pub(crate) fn with_active<R>(&self, comp: &Rc<Computation>, f: impl FnOnce() -> R) -> R {
        self.inner.effect_stack.borrow_mut().push(comp.clone());
        let result = f();
        self.inner.effect_stack.borrow_mut().pop();
        result
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Enqueue a computation for the next flush.
    pub(crate) fn queue(&self, comp: &Rc<Computation>) {
        self.inner.scheduler.queue_job(comp);
    }

    /// Schedule a callback strictly after the currently scheduled flush and
    /// all previously queued callbacks.
    pub fn next_tick(&self, cb: impl FnOnce() + 'static) {
        self.inner.scheduler.next_tick(cb);
    }

    /// Drain a single microtask. Returns false when the queue is idle.
    /// The manual analogue of one host microtask checkpoint.
    pub fn tick(&self) -> bool {
        match self.inner.scheduler.take_task() {
            Some(Task::Flush) => self.flush_jobs(),
            Some(Task::Callback(cb)) => cb(),
            None => return false,
        }
        true
    }

    /// Drain the microtask queue to idle: flushes, the callbacks they
    /// scheduled, the follow-up flushes those caused, and so on. This is how
    /// callers observe "settled" state; it bounds runaway self-scheduling
    /// rather than starving the thread.
    pub fn settle(&self) {
        let mut drained = 0u32;
        while self.tick() {
            drained += 1;
            if drained >= SETTLE_TASK_LIMIT {
                tracing::error!(
                    limit = SETTLE_TASK_LIMIT,
                    "settle exceeded task limit; a job is rescheduling itself unconditionally"
                );
                return;
            }
        }
    }

    /// True while jobs or callbacks are outstanding.
    pub fn has_work(&self) -> bool {
        self.inner.scheduler.has_work()
    }

    /// Run one flush batch. Each job is a failure-isolation unit: an error
    /// is logged with the job's label and the rest of the batch still runs.
    fn flush_jobs(&self) {
        for job in self.inner.scheduler.take_flush_batch() {
            if !job.comp.is_alive() {
                continue;
            }
            if let Err(err) = job.comp.run() {
                tracing::error!(job = %job.comp.label(), %err, "job failed; continuing flush");
            }
        }
    }

    // =========================================================================
    // Effects
    // =========================================================================

    /// Register a side-effect that re-runs whenever a dependency it read
    /// changes. Runs once immediately to record its dependencies.
    pub fn effect(&self, f: impl FnMut() + 'static) -> EffectHandle {
        self.effect_with_priority(f, 0)
    }

    /// Like [`Runtime::effect`] with an explicit flush priority (lower runs
    /// first within a flush).
    pub fn effect_with_priority(&self, mut f: impl FnMut() + 'static, priority: i32) -> EffectHandle {
        let comp = Computation::new(self.next_id(), "effect", priority);
        let rt = self.clone();
        let weak = Rc::downgrade(&comp);
        comp.set_runner(Box::new(move || {
            if let Some(comp) = weak.upgrade() {
                rt.with_active(&comp, &mut f);
            }
            Ok(())
        }));
        // Initial tracked run.
        let _ = comp.run();
        EffectHandle { comp }
    }

    /// Periodic sweep of wrap-registry entries whose targets were collected.
    pub(crate) fn note_wrap(&self) {
        let n = self.inner.wrap_count.get().wrapping_add(1);
        self.inner.wrap_count.set(n);
        if n % 256 == 0 {
            self.inner
                .observables
                .borrow_mut()
                .retain(|_, state| state.target_alive());
        }
    }
}

/// Handle on a registered effect; stopping it kills the computation.
pub struct EffectHandle {
    comp: Rc<Computation>,
}

impl EffectHandle {
    pub fn stop(&self) {
        self.comp.kill();
    }

    pub fn is_alive(&self) -> bool {
        self.comp.is_alive()
    }
}
