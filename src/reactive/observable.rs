//! Observable store - track on read, notify on write.
//!
//! Wraps `Value::Map`/`Value::List` data so that reads made while a
//! computation is active record a dependency edge, and writes enqueue every
//! recorded computation with the scheduler. The wrapper is explicit: callers
//! go through `get`/`set`/`delete` accessors instead of native property
//! syntax.
//!
//! Wrapping is identity-preserving: the runtime keeps a registry keyed by the
//! wrapped allocation, so wrapping the same map twice yields the same state
//! and a cyclic data graph simply revisits the same handle. The registry
//! holds the wrapped data weakly - an observable never keeps its own target
//! alive, and edges die with the target.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::reactive::computation::Computation;
use crate::runtime::Runtime;
use crate::value::Value;

/// Change callback: `(key, old, new)`. Delivered on the next tick, never
/// inside the write, so observers cannot re-enter the write path.
pub type OnChange = Rc<dyn Fn(&str, &Value, &Value)>;

/// Which read a dependency edge was recorded against.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum DepKey {
    /// A map property.
    Key(String),
    /// A list slot.
    Index(usize),
    /// Key/length enumeration; notified on structural change only.
    Iteration,
}

/// Weak reference to the wrapped allocation.
pub(crate) enum TargetRef {
    Map(Weak<RefCell<BTreeMap<String, Value>>>),
    List(Weak<RefCell<Vec<Value>>>),
}

/// Per-target observation state, owned by the runtime's wrap registry.
pub struct ObservableState {
    target: TargetRef,
    deps: RefCell<HashMap<DepKey, Vec<(u64, Weak<Computation>)>>>,
    on_change: RefCell<Option<OnChange>>,
}

impl ObservableState {
    pub(crate) fn target_alive(&self) -> bool {
        match &self.target {
            TargetRef::Map(w) => w.strong_count() > 0,
            TargetRef::List(w) => w.strong_count() > 0,
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match (&self.target, value) {
            (TargetRef::Map(w), Value::Map(rc)) => std::ptr::eq(w.as_ptr(), Rc::as_ptr(rc)),
            (TargetRef::List(w), Value::List(rc)) => std::ptr::eq(w.as_ptr(), Rc::as_ptr(rc)),
            _ => false,
        }
    }
}

/// Handle over a wrapped map or list.
#[derive(Clone)]
pub struct Observable {
    runtime: Runtime,
    state: Rc<ObservableState>,
}

impl Runtime {
    /// Wrap a value for observation. Maps and lists are registered (idempotent
    /// per allocation) and returned unchanged; scalars and `Null` have no
    /// per-property observation model and pass through as an identity no-op.
    pub fn reactive(&self, value: Value) -> Value {
        let _ = Observable::wrap(self, &value);
        value
    }

    /// Wrap with a change callback. The callback is installed only on first
    /// wrap of the allocation; re-wrapping returns the existing state.
    pub fn reactive_with(&self, value: Value, on_change: OnChange) -> Value {
        if let Some(obs) = Observable::wrap(self, &value) {
            let mut slot = obs.state.on_change.borrow_mut();
            if slot.is_none() {
                *slot = Some(on_change);
            }
        }
        value
    }
}

impl Observable {
    /// Obtain the observable handle for a map or list value. Returns `None`
    /// for shapes with no observation model.
    pub fn wrap(runtime: &Runtime, value: &Value) -> Option<Observable> {
        let ptr = match value {
            Value::Map(rc) => Rc::as_ptr(rc) as usize,
            Value::List(rc) => Rc::as_ptr(rc) as *const () as usize,
            _ => return None,
        };

        runtime.note_wrap();
        let mut registry = runtime.inner.observables.borrow_mut();
        // A recycled allocation can collide with a stale entry; replace it.
        if let Some(state) = registry.get(&ptr) {
            if state.matches(value) {
                return Some(Observable {
                    runtime: runtime.clone(),
                    state: state.clone(),
                });
            }
        }

        let target = match value {
            Value::Map(rc) => TargetRef::Map(Rc::downgrade(rc)),
            Value::List(rc) => TargetRef::List(Rc::downgrade(rc)),
            _ => unreachable!(),
        };
        let state = Rc::new(ObservableState {
            target,
            deps: RefCell::new(HashMap::new()),
            on_change: RefCell::new(None),
        });
        registry.insert(ptr, state.clone());
        Some(Observable {
            runtime: runtime.clone(),
            state,
        })
    }

    /// The wrapped value, or `Null` if the target was collected.
    pub fn value(&self) -> Value {
        match &self.state.target {
            TargetRef::Map(w) => w.upgrade().map(Value::Map).unwrap_or(Value::Null),
            TargetRef::List(w) => w.upgrade().map(Value::List).unwrap_or(Value::Null),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    // =========================================================================
    // Map accessors
    // =========================================================================

    /// Read a property. Records a dependency edge while a computation is
    /// active; map/list results are registered lazily so nested reads track
    /// against the nested allocation.
    pub fn get(&self, key: &str) -> Value {
        self.track(|| DepKey::Key(key.to_owned()));
        let value = match &self.state.target {
            TargetRef::Map(w) => w
                .upgrade()
                .and_then(|m| m.borrow().get(key).cloned())
                .unwrap_or(Value::Null),
            TargetRef::List(_) => Value::Null,
        };
        if value.is_wrappable() {
            let _ = Observable::wrap(&self.runtime, &value);
        }
        value
    }

    /// Write a property. No-ops when the new value is identical to the old
    /// (`Value::same`); otherwise stores, enqueues recorded computations, and
    /// delivers the change callback asynchronously. Adding a new key also
    /// notifies enumerators.
    pub fn set(&self, key: &str, value: Value) {
        let TargetRef::Map(w) = &self.state.target else {
            tracing::warn!(key, "set() on a non-map observable; ignored");
            return;
        };
        let Some(map) = w.upgrade() else { return };

        let (old, added) = {
            let mut map = map.borrow_mut();
            let old = map.get(key).cloned();
            if let Some(old) = &old {
                if Value::same(old, &value) {
                    return;
                }
            }
            let added = old.is_none();
            map.insert(key.to_owned(), value.clone());
            (old.unwrap_or(Value::Null), added)
        };

        self.notify(&DepKey::Key(key.to_owned()));
        if added {
            self.notify(&DepKey::Iteration);
        }
        self.deliver_change(key.to_owned(), old, value);
    }

    /// Delete a property; follows the write contract and notifies
    /// enumerators on removal.
    pub fn delete(&self, key: &str) {
        let TargetRef::Map(w) = &self.state.target else {
            return;
        };
        let Some(map) = w.upgrade() else { return };

        let old = map.borrow_mut().remove(key);
        let Some(old) = old else { return };

        self.notify(&DepKey::Key(key.to_owned()));
        self.notify(&DepKey::Iteration);
        self.deliver_change(key.to_owned(), old, Value::Null);
    }

    /// True when the key exists. Tracks like a read of the key.
    pub fn has(&self, key: &str) -> bool {
        self.track(|| DepKey::Key(key.to_owned()));
        match &self.state.target {
            TargetRef::Map(w) => w
                .upgrade()
                .map(|m| m.borrow().contains_key(key))
                .unwrap_or(false),
            TargetRef::List(_) => false,
        }
    }

    /// Enumerate keys. An active computation re-runs on any key addition or
    /// removal even if it never reads the key's value.
    pub fn keys(&self) -> Vec<String> {
        self.track(|| DepKey::Iteration);
        match &self.state.target {
            TargetRef::Map(w) => w
                .upgrade()
                .map(|m| m.borrow().keys().cloned().collect())
                .unwrap_or_default(),
            TargetRef::List(_) => Vec::new(),
        }
    }

    /// Entry count; tracks like enumeration.
    pub fn len(&self) -> usize {
        self.track(|| DepKey::Iteration);
        match &self.state.target {
            TargetRef::Map(w) => w.upgrade().map(|m| m.borrow().len()).unwrap_or(0),
            TargetRef::List(w) => w.upgrade().map(|l| l.borrow().len()).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // List accessors
    // =========================================================================

    /// Read a list slot; `Null` out of bounds.
    pub fn index(&self, i: usize) -> Value {
        self.track(|| DepKey::Index(i));
        let value = match &self.state.target {
            TargetRef::List(w) => w
                .upgrade()
                .and_then(|l| l.borrow().get(i).cloned())
                .unwrap_or(Value::Null),
            TargetRef::Map(_) => Value::Null,
        };
        if value.is_wrappable() {
            let _ = Observable::wrap(&self.runtime, &value);
        }
        value
    }

    /// Write a list slot; writing past the end extends the list with `Null`
    /// and counts as a structural change.
    pub fn set_index(&self, i: usize, value: Value) {
        let TargetRef::List(w) = &self.state.target else {
            tracing::warn!(index = i, "set_index() on a non-list observable; ignored");
            return;
        };
        let Some(list) = w.upgrade() else { return };

        let (old, grew) = {
            let mut list = list.borrow_mut();
            if i < list.len() {
                let old = list[i].clone();
                if Value::same(&old, &value) {
                    return;
                }
                list[i] = value.clone();
                (old, false)
            } else {
                list.resize(i + 1, Value::Null);
                list[i] = value.clone();
                (Value::Null, true)
            }
        };

        self.notify(&DepKey::Index(i));
        if grew {
            self.notify(&DepKey::Iteration);
        }
        self.deliver_change(i.to_string(), old, value);
    }

    /// Append to a list; a structural change.
    pub fn push(&self, value: Value) {
        let TargetRef::List(w) = &self.state.target else {
            tracing::warn!("push() on a non-list observable; ignored");
            return;
        };
        let Some(list) = w.upgrade() else { return };

        let i = {
            let mut list = list.borrow_mut();
            list.push(value.clone());
            list.len() - 1
        };

        self.notify(&DepKey::Index(i));
        self.notify(&DepKey::Iteration);
        self.deliver_change(i.to_string(), Value::Null, value);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Record a dependency edge against the active computation, if any. The
    /// key is only materialized when there is one.
    fn track(&self, key: impl FnOnce() -> DepKey) {
        let Some(active) = self.runtime.active_computation() else {
            return;
        };
        if !active.is_alive() {
            return;
        }
        let mut deps = self.state.deps.borrow_mut();
        let entry = deps.entry(key()).or_default();
        if !entry.iter().any(|(id, _)| *id == active.id()) {
            entry.push((active.id(), Rc::downgrade(&active)));
        }
    }

    /// Enqueue every live computation recorded against `key`, pruning dead
    /// entries in passing.
    fn notify(&self, key: &DepKey) {
        let to_run: Vec<Rc<Computation>> = {
            let mut deps = self.state.deps.borrow_mut();
            let Some(entry) = deps.get_mut(key) else {
                return;
            };
            entry.retain(|(_, weak)| weak.upgrade().is_some_and(|c| c.is_alive()));
            entry
                .iter()
                .filter_map(|(_, weak)| weak.upgrade())
                .collect()
        };
        for comp in to_run {
            self.runtime.queue(&comp);
        }
    }

    /// Deliver the change callback on the next tick.
    fn deliver_change(&self, key: String, old: Value, new: Value) {
        let Some(cb) = self.state.on_change.borrow().clone() else {
            return;
        };
        self.runtime
            .next_tick(move || cb(&key, &old, &new));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn wrapped_map(rt: &Runtime) -> (Value, Observable) {
        let data = rt.reactive(Value::map([("a", Value::Int(1)), ("b", Value::Int(2))]));
        let obs = Observable::wrap(rt, &data).unwrap();
        (data, obs)
    }

    #[test]
    fn test_wrap_is_identity_preserving() {
        let rt = Runtime::new();
        let (data, obs1) = wrapped_map(&rt);
        let obs2 = Observable::wrap(&rt, &data).unwrap();
        assert!(Rc::ptr_eq(&obs1.state, &obs2.state));
    }

    #[test]
    fn test_wrap_scalar_is_identity_noop() {
        let rt = Runtime::new();
        let v = rt.reactive(Value::Int(3));
        assert!(Value::same(&v, &Value::Int(3)));
        assert!(Observable::wrap(&rt, &v).is_none());
    }

    #[test]
    fn test_noop_write_schedules_nothing() {
        let rt = Runtime::new();
        let (_data, obs) = wrapped_map(&rt);

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let obs2 = obs.clone();
        let _handle = rt.effect(move || {
            let _ = obs2.get("a");
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        obs.set("a", Value::Int(1)); // identical value
        rt.settle();
        assert_eq!(runs.get(), 1);
        assert!(!rt.has_work());
    }

    #[test]
    fn test_dependency_precision() {
        let rt = Runtime::new();
        let (_data, obs) = wrapped_map(&rt);

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let obs2 = obs.clone();
        let _handle = rt.effect(move || {
            let _ = obs2.get("a");
            runs_clone.set(runs_clone.get() + 1);
        });

        obs.set("b", Value::Int(99));
        rt.settle();
        assert_eq!(runs.get(), 1, "write to `b` must not re-run a reader of `a`");

        obs.set("a", Value::Int(7));
        rt.settle();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_batching_one_rerun_per_burst() {
        let rt = Runtime::new();
        let (_data, obs) = wrapped_map(&rt);

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let obs2 = obs.clone();
        let _handle = rt.effect(move || {
            let _ = obs2.get("a");
            let _ = obs2.get("b");
            runs_clone.set(runs_clone.get() + 1);
        });

        obs.set("a", Value::Int(10));
        obs.set("b", Value::Int(20));
        obs.set("a", Value::Int(11));
        rt.settle();
        assert_eq!(runs.get(), 2, "one initial run plus exactly one batched re-run");
    }

    #[test]
    fn test_key_enumeration_tracks_structure() {
        let rt = Runtime::new();
        let (_data, obs) = wrapped_map(&rt);

        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        let obs2 = obs.clone();
        let _handle = rt.effect(move || {
            seen_clone.set(obs2.keys().len());
        });
        assert_eq!(seen.get(), 2);

        // Overwriting an existing key is not structural.
        obs.set("a", Value::Int(5));
        rt.settle();
        assert_eq!(seen.get(), 2);

        obs.set("c", Value::Int(3));
        rt.settle();
        assert_eq!(seen.get(), 3);

        obs.delete("b");
        rt.settle();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_on_change_delivered_async() {
        let rt = Runtime::new();
        let log: Rc<RefCell<Vec<(String, Value, Value)>>> = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let data = rt.reactive_with(
            Value::map([("x", Value::Int(0))]),
            Rc::new(move |key, old, new| {
                log_clone
                    .borrow_mut()
                    .push((key.to_owned(), old.clone(), new.clone()));
            }),
        );
        let obs = Observable::wrap(&rt, &data).unwrap();

        obs.set("x", Value::Int(1));
        assert!(log.borrow().is_empty(), "never synchronous inside the write");
        rt.settle();
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "x");
        assert!(Value::same(&log[0].1, &Value::Int(0)));
        assert!(Value::same(&log[0].2, &Value::Int(1)));
    }

    #[test]
    fn test_nested_values_wrap_lazily_and_cycles_are_safe() {
        let rt = Runtime::new();
        let inner = Value::map([("deep", Value::Int(1))]);
        let outer = rt.reactive(Value::map([("inner", inner.clone())]));
        let outer_obs = Observable::wrap(&rt, &outer).unwrap();

        // Build a cycle: inner.back -> outer.
        let inner_obs = Observable::wrap(&rt, &outer_obs.get("inner")).unwrap();
        inner_obs.set("back", outer.clone());
        rt.settle();

        // Revisiting through the cycle lands on the same state.
        let again = Observable::wrap(&rt, &inner_obs.get("back")).unwrap();
        assert!(Rc::ptr_eq(&again.state, &outer_obs.state));
    }

    #[test]
    fn test_list_index_and_structure() {
        let rt = Runtime::new();
        let data = rt.reactive(Value::list([Value::Int(1), Value::Int(2)]));
        let obs = Observable::wrap(&rt, &data).unwrap();

        let len_seen = Rc::new(Cell::new(0));
        let len_clone = len_seen.clone();
        let obs2 = obs.clone();
        let _len_effect = rt.effect(move || len_clone.set(obs2.len()));

        let first = Rc::new(Cell::new(0i64));
        let first_clone = first.clone();
        let obs3 = obs.clone();
        let _first_effect = rt.effect(move || {
            first_clone.set(obs3.index(0).as_int().unwrap_or(-1));
        });

        obs.push(Value::Int(3));
        rt.settle();
        assert_eq!(len_seen.get(), 3);
        assert_eq!(first.get(), 1, "push must not re-run an index-0 reader");

        obs.set_index(0, Value::Int(9));
        rt.settle();
        assert_eq!(first.get(), 9);
        assert_eq!(len_seen.get(), 3);
    }

    #[test]
    fn test_killed_computation_stops_receiving() {
        let rt = Runtime::new();
        let (_data, obs) = wrapped_map(&rt);

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let obs2 = obs.clone();
        let handle = rt.effect(move || {
            let _ = obs2.get("a");
            runs_clone.set(runs_clone.get() + 1);
        });
        handle.stop();

        obs.set("a", Value::Int(42));
        rt.settle();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_dead_target_reads_null() {
        let rt = Runtime::new();
        let obs = {
            let data = rt.reactive(Value::map([("a", Value::Int(1))]));
            Observable::wrap(&rt, &data).unwrap()
            // data dropped here; the registry holds only a weak target
        };
        assert!(obs.value().is_null());
        assert!(obs.get("a").is_null());
    }
}
