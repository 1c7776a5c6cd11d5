//! Scheduler - deduplicating job queue plus a "next tick" primitive.
//!
//! Batches notifications from the observable store into at most one flush per
//! tick: writing a hundred properties in one synchronous turn re-runs each
//! affected computation once, not a hundred times.
//!
//! # Flush discipline
//!
//! 1. `queue_job` adds to the pending set (dedup by computation id); the
//!    first job of a burst appends a single flush task to the microtask queue.
//! 2. A flush snapshots the pending set sorted by (priority, insertion seq),
//!    then clears the set and the flush flag *before* running anything, so
//!    jobs enqueued mid-flush start a fresh flush instead of extending the
//!    running one. A job that enqueues itself forever cannot starve a flush.
//! 3. `next_tick` callbacks queued before a flush started run strictly after
//!    that flush's jobs and before any flush scheduled during it.
//!
//! There is no host microtask loop, so draining is explicit: the runtime's
//! `settle`/`tick` pump the queue, the way the mount loop ticks in a terminal
//! frontend.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use crate::reactive::computation::Computation;

/// One entry of the microtask queue.
pub(crate) enum Task {
    /// Drain the pending job set once.
    Flush,
    /// A `next_tick` continuation.
    Callback(Box<dyn FnOnce()>),
}

/// A pending pointer to a computation, idempotent within a tick.
pub(crate) struct Job {
    pub(crate) comp: Rc<Computation>,
    pub(crate) seq: u64,
}

/// Deduplicating job queue plus FIFO microtask queue.
#[derive(Default)]
pub struct Scheduler {
    pending: RefCell<Vec<Job>>,
    pending_ids: RefCell<HashSet<u64>>,
    flush_scheduled: Cell<bool>,
    tasks: RefCell<VecDeque<Task>>,
    seq: Cell<u64>,
}

impl Scheduler {
    pub(crate) fn new() -> Scheduler {
        Scheduler::default()
    }

    /// Add a computation to the pending set. Enqueuing the same computation
    /// twice before the flush collapses to one run. Schedules exactly one
    /// flush task per burst.
    pub(crate) fn queue_job(&self, comp: &Rc<Computation>) {
        if !comp.is_alive() {
            return;
        }
        if self.pending_ids.borrow_mut().insert(comp.id()) {
            let seq = self.seq.get();
            self.seq.set(seq + 1);
            self.pending.borrow_mut().push(Job {
                comp: comp.clone(),
                seq,
            });
        }
        if !self.flush_scheduled.replace(true) {
            self.tasks.borrow_mut().push_back(Task::Flush);
        }
    }

    /// Schedule a callback to run after the currently scheduled flush (and
    /// after all previously queued callbacks).
    pub(crate) fn next_tick(&self, cb: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Task::Callback(Box::new(cb)));
    }

    /// Pop the next microtask, if any.
    pub(crate) fn take_task(&self) -> Option<Task> {
        self.tasks.borrow_mut().pop_front()
    }

    /// Snapshot the pending set as an ordered batch and clear it. Jobs are
    /// ordered by priority (lower runs first), ties by insertion order.
    pub(crate) fn take_flush_batch(&self) -> Vec<Job> {
        self.flush_scheduled.set(false);
        self.pending_ids.borrow_mut().clear();
        let mut jobs = std::mem::take(&mut *self.pending.borrow_mut());
        jobs.sort_by_key(|job| (job.comp.priority(), job.seq));
        jobs
    }

    /// True while any job or callback is outstanding.
    pub fn has_work(&self) -> bool {
        !self.tasks.borrow().is_empty() || !self.pending.borrow().is_empty()
    }

    /// Number of pending (not yet flushed) jobs. Test hook.
    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::computation::Computation;
    use std::cell::RefCell;

    fn run_batch(sched: &Scheduler) -> usize {
        let mut ran = 0;
        for job in sched.take_flush_batch() {
            if job.comp.is_alive() {
                let _ = job.comp.run();
            }
            ran += 1;
        }
        ran
    }

    #[test]
    fn test_dedup_within_tick() {
        let sched = Scheduler::new();
        let comp = Computation::new(1, "a", 0);
        comp.set_runner(Box::new(|| Ok(())));

        sched.queue_job(&comp);
        sched.queue_job(&comp);
        sched.queue_job(&comp);
        assert_eq!(sched.pending_len(), 1);
    }

    #[test]
    fn test_single_flush_task_per_burst() {
        let sched = Scheduler::new();
        let a = Computation::new(1, "a", 0);
        let b = Computation::new(2, "b", 0);
        a.set_runner(Box::new(|| Ok(())));
        b.set_runner(Box::new(|| Ok(())));

        sched.queue_job(&a);
        sched.queue_job(&b);

        assert!(matches!(sched.take_task(), Some(Task::Flush)));
        assert!(sched.take_task().is_none());
    }

    #[test]
    fn test_priority_order_then_insertion() {
        let sched = Scheduler::new();
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let make = |id, label: &'static str, priority| {
            let comp = Computation::new(id, label, priority);
            let order = order.clone();
            comp.set_runner(Box::new(move || {
                order.borrow_mut().push(label);
                Ok(())
            }));
            comp
        };

        let low = make(1, "low", 1);
        let high = make(2, "high", -1);
        let mid_a = make(3, "mid_a", 0);
        let mid_b = make(4, "mid_b", 0);

        sched.queue_job(&low);
        sched.queue_job(&mid_a);
        sched.queue_job(&high);
        sched.queue_job(&mid_b);

        run_batch(&sched);
        assert_eq!(*order.borrow(), vec!["high", "mid_a", "mid_b", "low"]);
    }

    #[test]
    fn test_requeue_during_flush_starts_fresh_batch() {
        let sched = Scheduler::new();
        let comp = Computation::new(1, "a", 0);
        comp.set_runner(Box::new(|| Ok(())));

        sched.queue_job(&comp);
        let batch = sched.take_flush_batch();
        assert_eq!(batch.len(), 1);

        // Mid-flush requeue lands in a new batch with a new flush task.
        sched.queue_job(&comp);
        assert!(matches!(sched.take_task(), Some(Task::Flush)));
        assert!(matches!(sched.take_task(), Some(Task::Flush)));
        assert_eq!(sched.take_flush_batch().len(), 1);
    }

    #[test]
    fn test_dead_jobs_are_not_queued() {
        let sched = Scheduler::new();
        let comp = Computation::new(1, "a", 0);
        comp.set_runner(Box::new(|| Ok(())));
        comp.kill();

        sched.queue_job(&comp);
        assert_eq!(sched.pending_len(), 0);
    }
}
