//! Watchers - externally observed value changes.
//!
//! A watcher runs a getter once at registration to capture a baseline
//! (tracked, outside any notify path), then re-runs it whenever a dependency
//! changes and invokes its callback only when the value actually differs
//! under identity comparison.

use std::cell::RefCell;
use std::rc::Rc;

use crate::reactive::computation::Computation;
use crate::reactive::observable::Observable;
use crate::runtime::Runtime;
use crate::value::Value;

/// Handle on a registered watcher; stopping it kills the computation.
pub struct WatchHandle {
    comp: Rc<Computation>,
}

impl WatchHandle {
    pub fn stop(&self) {
        self.comp.kill();
    }

    pub fn is_alive(&self) -> bool {
        self.comp.is_alive()
    }
}

impl Runtime {
    /// Watch a getter. `callback(old, new)` fires only when the result
    /// changes under `Value::same`.
    pub fn watch(
        &self,
        getter: impl Fn() -> Value + 'static,
        mut callback: impl FnMut(&Value, &Value) + 'static,
    ) -> WatchHandle {
        let comp = Computation::new(self.next_id(), "watch", 0);

        // Baseline capture, tracked so the watcher has dependency edges
        // before any write happens.
        let baseline = self.with_active(&comp, &getter);
        let old = Rc::new(RefCell::new(baseline));

        let rt = self.clone();
        let weak = Rc::downgrade(&comp);
        let old_slot = old.clone();
        comp.set_runner(Box::new(move || {
            let Some(comp) = weak.upgrade() else {
                return Ok(());
            };
            // Re-track: each run records the getter's current read set.
            let new = rt.with_active(&comp, &getter);
            let changed = !Value::same(&old_slot.borrow(), &new);
            if changed {
                let previous = old_slot.replace(new.clone());
                callback(&previous, &new);
            }
            Ok(())
        }));

        WatchHandle { comp }
    }

    /// Watch a dotted path through an observable map, e.g. `"user.name"`.
    /// A missing segment yields `Null` rather than an error, so a watcher
    /// can be registered before the data it observes exists.
    pub fn watch_path(
        &self,
        root: Value,
        path: &str,
        callback: impl FnMut(&Value, &Value) + 'static,
    ) -> WatchHandle {
        let rt = self.clone();
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        self.watch(move || resolve_path(&rt, &root, &segments), callback)
    }
}

/// Walk a dotted path, tracking each read. Missing or non-map segments
/// resolve to `Null` (the expression-error policy: yield empty, not abort).
pub(crate) fn resolve_path(runtime: &Runtime, root: &Value, segments: &[String]) -> Value {
    let mut current = root.clone();
    for segment in segments {
        let Some(obs) = Observable::wrap(runtime, &current) else {
            return Value::Null;
        };
        current = obs.get(segment);
    }
    current
}
