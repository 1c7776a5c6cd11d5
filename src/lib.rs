//! # sprig-ui
//!
//! Fine-grained reactive UI runtime.
//!
//! A data layer of observable maps and lists, a batching scheduler, and a
//! virtual-node tree with a diffing reconciler, tied together by components
//! with a full lifecycle. Writes are cheap: every mutation funnels through
//! explicit accessors, dependents are tracked per key, and a burst of
//! writes collapses into one flush on the next tick.
//!
//! ## Architecture
//!
//! ```text
//! Observable writes → Scheduler (dedupe, priority) → render jobs
//!                                                       ↓
//!            Backend mutations ← Reconciler ← fresh VNode trees
//! ```
//!
//! Everything hangs off a [`Runtime`]: the active-computation stack, the
//! scheduler, the event bus, and a default document. Tests build isolated
//! runtimes; application code can use the thread's default via the
//! free functions below.
//!
//! ## Modules
//!
//! - [`value`] - The dynamic value model (maps, lists, scalars)
//! - [`reactive`] - Observables, computed values, watchers
//! - [`scheduler`] - Job queue and tick callbacks
//! - [`vdom`] - Virtual nodes, markup parsing, the reconciler
//! - [`tree`] - Backend abstraction and the in-memory document
//! - [`component`] - Component configs, instances, lifecycle
//! - [`app`] - Application bootstrap
//!
//! ## Example
//!
//! ```ignore
//! use sprig_ui::{create_app, Config, Props, Value, h};
//! use std::rc::Rc;
//!
//! let counter = Rc::new(
//!     Config::new("counter")
//!         .data(Value::map([("count", Value::Int(0))]))
//!         .render(|c| {
//!             let count = c.get("count");
//!             h("div", Props::new().class("counter"), vec![count.to_string().into()])
//!         }),
//! );
//! let app = create_app(counter);
//! app.mount("#app")?;
//! # Ok::<(), sprig_ui::Error>(())
//! ```

pub mod app;
pub mod bus;
pub mod component;
pub mod error;
pub mod reactive;
pub mod runtime;
pub mod scheduler;
pub mod tree;
pub mod value;
pub mod vdom;

pub use app::{create_app, App};
pub use bus::{EventBus, SubscriptionId};
pub use component::{
    loader::{LoadState, Loader},
    transition::{transition, TransitionSpec},
    Component, Config, Lifecycle, Slots,
};
pub use error::Error;
pub use reactive::{Computed, Observable, WatchHandle};
pub use runtime::{global, EffectHandle, Runtime};
pub use tree::{Backend, BackendHandle, Document, Event, Listener, ListenerId, NodeId};
pub use value::Value;
pub use vdom::{
    component, create_vnode, fragment, h, text_node, AttrValue, ClassSpec, Props, VNode,
};

use std::rc::Rc;

// =============================================================================
// Thread-default runtime conveniences
// =============================================================================

/// Wrap a value for reactive access on the thread's default runtime.
/// Identity-preserving: the same map or list is returned.
pub fn reactive(value: Value) -> Value {
    global().reactive(value)
}

/// Observable accessors over a wrapped map or list, on the default runtime.
pub fn observe(value: &Value) -> Option<Observable> {
    Observable::wrap(&global(), value)
}

/// A lazily cached derived value on the default runtime.
pub fn computed<T: Clone + 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    global().computed(getter)
}

/// Watch a getter on the default runtime; the callback receives
/// `(old, new)` when the result changes.
pub fn watch(
    getter: impl Fn() -> Value + 'static,
    callback: impl FnMut(&Value, &Value) + 'static,
) -> WatchHandle {
    global().watch(getter, callback)
}

/// A side effect on the default runtime; re-runs when its dependencies
/// change.
pub fn effect(f: impl FnMut() + 'static) -> EffectHandle {
    global().effect(f)
}

/// Defer a callback past the currently scheduled flush on the default
/// runtime.
pub fn next_tick(cb: impl FnOnce() + 'static) {
    global().next_tick(cb)
}

/// Drain the default runtime's microtask queue to idle.
pub fn settle() {
    global().settle()
}

/// The default runtime's event bus.
pub fn bus() -> EventBus {
    global().bus()
}

/// Construct a component on the default runtime and its document.
pub fn create_component(config: Rc<Config>) -> Result<Rc<Component>, Error> {
    Component::new(config)
}
