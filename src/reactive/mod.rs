//! Fine-grained reactivity: observables, computations, computeds, watchers.
//!
//! Reads made inside a running computation record dependency edges; writes
//! hand the recorded computations to the scheduler, which batches them into
//! one flush per tick.

pub mod computation;
pub mod computed;
pub mod observable;
pub mod watch;

pub use computation::Computation;
pub use computed::Computed;
pub use observable::{Observable, OnChange};
pub use watch::WatchHandle;
