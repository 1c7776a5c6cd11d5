//! Components - reactive render functions with a lifecycle.
//!
//! A [`Config`] declares what a component is: its data bag, computed
//! values, watchers, render function, lifecycle hooks, event listeners,
//! and slots. A [`Component`] is one running occurrence of a config:
//! it owns the reactive state, the render computation, and the mounted
//! subtree.
//!
//! # Lifecycle
//!
//! ```text
//! Constructing -> Mounted <-> Updating
//!                    |
//!                    v
//!                Unmounted (terminal)
//! ```
//!
//! Construction fires `before_create` -> `created` and defers `after_init`
//! to the next tick. Mounting fires `before_mount` -> `mounted` with
//! `after_mount` deferred. Every flushed update fires `before_update` ->
//! `updated` with `after_update` deferred. Unmounting is idempotent and
//! fires `before_unmount` -> `unmounted` with `after_unmount` deferred.
//!
//! # Example
//!
//! ```ignore
//! use sprig_ui::component::{Component, Config};
//! use sprig_ui::vdom::{h, Props};
//! use sprig_ui::value::Value;
//! use std::rc::Rc;
//!
//! let config = Rc::new(
//!     Config::new("counter")
//!         .data(Value::map([("count", Value::Int(0))]))
//!         .render(|c| {
//!             h("div", Props::new(), vec![c.get("count").to_string().into()])
//!         }),
//! );
//! ```

pub mod loader;
pub mod transition;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::error::Error;
use crate::reactive::computation::Computation;
use crate::reactive::computed::Computed;
use crate::reactive::observable::Observable;
use crate::reactive::watch::WatchHandle;
use crate::runtime::Runtime;
use crate::tree::{BackendHandle, NodeId};
use crate::value::Value;
use crate::vdom::patch::{self, Mounted, PatchCx};
use crate::vdom::vnode::VNode;

// =============================================================================
// Config
// =============================================================================

/// Hook callbacks receive the running instance.
pub type Hook = Rc<dyn Fn(&Component)>;

/// Local event handler registered through [`Config::on`].
pub type EventHandler = Rc<dyn Fn(&Component, &[Value])>;

type RenderFn = Rc<dyn Fn(&Component) -> Result<VNode, Error>>;
type DataProducer = Rc<dyn Fn(&Component) -> Value>;
type ComputedGetter = Rc<dyn Fn(&Component) -> Value>;
type WatchCallback = Rc<dyn Fn(&Component, &Value, &Value)>;

/// Named slot content.
pub type Slots = BTreeMap<String, Vec<VNode>>;

enum DataInit {
    None,
    Value(Value),
    Producer(DataProducer),
}

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) before_create: Option<Hook>,
    pub(crate) created: Option<Hook>,
    pub(crate) after_init: Option<Hook>,
    pub(crate) before_mount: Option<Hook>,
    pub(crate) mounted: Option<Hook>,
    pub(crate) after_mount: Option<Hook>,
    pub(crate) before_update: Option<Hook>,
    pub(crate) updated: Option<Hook>,
    pub(crate) after_update: Option<Hook>,
    pub(crate) before_unmount: Option<Hook>,
    pub(crate) unmounted: Option<Hook>,
    pub(crate) after_unmount: Option<Hook>,
}

/// Component declaration. Shared between occurrences via `Rc`.
pub struct Config {
    pub name: String,
    data: DataInit,
    computed: Vec<(String, ComputedGetter)>,
    watch: Vec<(String, WatchCallback)>,
    render: Option<RenderFn>,
    hooks: Hooks,
    on: BTreeMap<String, Vec<EventHandler>>,
    slots: Slots,
    priority: i32,
}

macro_rules! hook_setter {
    ($($name:ident),+ $(,)?) => {
        $(
            pub fn $name(mut self, hook: impl Fn(&Component) + 'static) -> Self {
                self.hooks.$name = Some(Rc::new(hook));
                self
            }
        )+
    };
}

impl Config {
    pub fn new(name: &str) -> Config {
        Config {
            name: name.to_owned(),
            data: DataInit::None,
            computed: Vec::new(),
            watch: Vec::new(),
            render: None,
            hooks: Hooks::default(),
            on: BTreeMap::new(),
            slots: Slots::new(),
            priority: 0,
        }
    }

    /// Initial data bag. Non-map values are replaced with an empty map.
    pub fn data(mut self, value: Value) -> Self {
        self.data = DataInit::Value(value);
        self
    }

    /// Produce the data bag at construction time, with access to the
    /// half-built instance. Invoked exactly once.
    pub fn data_with(mut self, producer: impl Fn(&Component) -> Value + 'static) -> Self {
        self.data = DataInit::Producer(Rc::new(producer));
        self
    }

    /// Register a derived value, readable through [`Component::get`] under
    /// `name`. The name must not collide with a data key.
    pub fn computed(mut self, name: &str, getter: impl Fn(&Component) -> Value + 'static) -> Self {
        self.computed.push((name.to_owned(), Rc::new(getter)));
        self
    }

    /// Watch a dotted path through the data bag; the callback receives
    /// `(instance, old, new)` on change.
    pub fn watch(
        mut self,
        path: &str,
        callback: impl Fn(&Component, &Value, &Value) + 'static,
    ) -> Self {
        self.watch.push((path.to_owned(), Rc::new(callback)));
        self
    }

    /// The render function. Required.
    pub fn render(mut self, render: impl Fn(&Component) -> VNode + 'static) -> Self {
        self.render = Some(Rc::new(move |c| Ok(render(c))));
        self
    }

    /// Fallible render. An error during an update is logged and the
    /// previous tree is kept; an error during the initial mount fails the
    /// mount.
    pub fn try_render(
        mut self,
        render: impl Fn(&Component) -> Result<VNode, Error> + 'static,
    ) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    /// Local listener for [`Component::emit`]. Multiple handlers per event
    /// run in registration order.
    pub fn on(mut self, event: &str, handler: impl Fn(&Component, &[Value]) + 'static) -> Self {
        self.on
            .entry(event.to_owned())
            .or_default()
            .push(Rc::new(handler));
        self
    }

    /// Declare slot content directly on the config.
    pub fn slot(mut self, name: &str, content: Vec<VNode>) -> Self {
        self.slots.entry(name.to_owned()).or_default().extend(content);
        self
    }

    /// Flush priority of this component's render job. Lower runs first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    hook_setter!(
        before_create,
        created,
        after_init,
        before_mount,
        mounted,
        after_mount,
        before_update,
        updated,
        after_update,
        before_unmount,
        unmounted,
        after_unmount,
    );
}

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Lifecycle {
    Constructing,
    Mounted,
    /// Transient while a flushed update is being applied.
    Updating,
    /// Terminal.
    Unmounted,
}

// =============================================================================
// Component
// =============================================================================

/// One running occurrence of a [`Config`].
pub struct Component {
    runtime: Runtime,
    backend: BackendHandle,
    name: String,
    state: Cell<Lifecycle>,
    config: RefCell<Option<Rc<Config>>>,
    /// Cloned from the config so teardown hooks still fire after the
    /// config slot is cleared.
    hooks: RefCell<Hooks>,
    data_value: RefCell<Value>,
    data_obs: RefCell<Observable>,
    slots: RefCell<Slots>,
    computeds: RefCell<BTreeMap<String, Computed<Value>>>,
    watchers: RefCell<Vec<WatchHandle>>,
    render_comp: RefCell<Option<Rc<Computation>>>,
    root: RefCell<Option<Mounted>>,
    container: Cell<Option<NodeId>>,
    /// Non-owning link to the instantiating component, for `dispatch`.
    parent: RefCell<Weak<Component>>,
}

impl Component {
    /// Construct an instance against the thread's default runtime and its
    /// document.
    pub fn new(config: Rc<Config>) -> Result<Rc<Component>, Error> {
        let runtime = crate::runtime::global();
        let backend: BackendHandle = runtime.document();
        Component::instantiate(runtime, backend, config, Vec::new(), None)
    }

    /// Construct an instance with explicit runtime and backend.
    pub fn with_runtime(
        config: Rc<Config>,
        runtime: Runtime,
        backend: BackendHandle,
    ) -> Result<Rc<Component>, Error> {
        Component::instantiate(runtime, backend, config, Vec::new(), None)
    }

    /// Full construction path: `children` is slot content routed by each
    /// child's `slot` attribute (default slot otherwise), `parent` the
    /// instantiating component.
    pub(crate) fn instantiate(
        runtime: Runtime,
        backend: BackendHandle,
        config: Rc<Config>,
        children: Vec<VNode>,
        parent: Option<Weak<Component>>,
    ) -> Result<Rc<Component>, Error> {
        if config.render.is_none() {
            return Err(Error::config(format!(
                "component '{}' has no render function",
                config.name
            )));
        }
        for (path, _) in &config.watch {
            if path.trim().is_empty() {
                return Err(Error::config(format!(
                    "component '{}' declares a watch with an empty path",
                    config.name
                )));
            }
        }

        let placeholder = runtime.reactive(Value::empty_map());
        let placeholder_obs = match Observable::wrap(&runtime, &placeholder) {
            Some(obs) => obs,
            None => return Err(Error::config("runtime failed to wrap an empty map")),
        };
        let instance = Rc::new(Component {
            runtime: runtime.clone(),
            backend,
            name: config.name.clone(),
            state: Cell::new(Lifecycle::Constructing),
            config: RefCell::new(Some(config.clone())),
            hooks: RefCell::new(config.hooks.clone()),
            data_value: RefCell::new(placeholder.clone()),
            data_obs: RefCell::new(placeholder_obs),
            slots: RefCell::new(Slots::new()),
            computeds: RefCell::new(BTreeMap::new()),
            watchers: RefCell::new(Vec::new()),
            render_comp: RefCell::new(None),
            root: RefCell::new(None),
            container: Cell::new(None),
            parent: RefCell::new(parent.unwrap_or_default()),
        });

        instance.call_hook(|h| h.before_create.clone());

        // Data bag.
        let raw = match &config.data {
            DataInit::None => Value::empty_map(),
            DataInit::Value(v) => v.clone(),
            DataInit::Producer(f) => f(&instance),
        };
        let raw = if raw.as_map().is_some() {
            raw
        } else {
            tracing::warn!(
                component = config.name.as_str(),
                "data is not a map; using an empty map"
            );
            Value::empty_map()
        };
        let data = runtime.reactive(raw);
        let data_obs = match Observable::wrap(&runtime, &data) {
            Some(obs) => obs,
            None => return Err(Error::config("runtime failed to wrap the data bag")),
        };
        *instance.data_value.borrow_mut() = data.clone();
        *instance.data_obs.borrow_mut() = data_obs.clone();

        // Slots: config-declared content first, then routed children.
        let mut slots = config.slots.clone();
        for child in patch::normalize_children(&children) {
            let slot = child.slot_name().unwrap_or_else(|| "default".to_owned());
            slots.entry(slot).or_default().push(child);
        }
        *instance.slots.borrow_mut() = slots;

        // Computed registry. Names must not shadow data keys.
        for (name, getter) in &config.computed {
            if data_obs.has(name) {
                return Err(Error::config(format!(
                    "computed '{}' collides with a data key in component '{}'",
                    name, config.name
                )));
            }
            let weak = Rc::downgrade(&instance);
            let getter = getter.clone();
            let computed = runtime.computed(move || match weak.upgrade() {
                Some(instance) => getter(&instance),
                None => Value::Null,
            });
            instance
                .computeds
                .borrow_mut()
                .insert(name.clone(), computed);
        }

        // Watchers, baseline captured now.
        for (path, callback) in &config.watch {
            let weak = Rc::downgrade(&instance);
            let callback = callback.clone();
            let handle = runtime.watch_path(data.clone(), path, move |old, new| {
                if let Some(instance) = weak.upgrade() {
                    callback(&instance, old, new);
                }
            });
            instance.watchers.borrow_mut().push(handle);
        }

        instance.call_hook(|h| h.created.clone());
        instance.defer_hook(|h| h.after_init.clone());
        Ok(instance)
    }

    // =========================================================================
    // State access
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.get()
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.state.get(), Lifecycle::Mounted | Lifecycle::Updating)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The reactive data bag.
    pub fn data(&self) -> Observable {
        self.data_obs.borrow().clone()
    }

    /// Read a data key or computed value. Tracked when read inside a
    /// computation.
    pub fn get(&self, key: &str) -> Value {
        let computed = self.computeds.borrow().get(key).cloned();
        match computed {
            Some(computed) => computed.get(),
            None => self.data().get(key),
        }
    }

    /// Write a data key. Computed names are read-only.
    pub fn set(&self, key: &str, value: Value) {
        if self.computeds.borrow().contains_key(key) {
            tracing::warn!(
                component = self.name.as_str(),
                key,
                "write to a computed value ignored"
            );
            return;
        }
        self.data().set(key, value);
    }

    /// Content of a named slot.
    pub fn slot(&self, name: &str) -> Vec<VNode> {
        self.slots.borrow().get(name).cloned().unwrap_or_default()
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }

    /// Backend nodes of the mounted root.
    pub(crate) fn node_count(&self) -> usize {
        self.root.borrow().as_ref().map_or(0, Mounted::node_count)
    }

    pub(crate) fn collect_nodes(&self, out: &mut Vec<NodeId>) {
        if let Some(root) = self.root.borrow().as_ref() {
            root.collect_nodes(out);
        }
    }

    /// The first backend node of the mounted root, when one exists.
    pub fn root_node(&self) -> Option<NodeId> {
        self.root.borrow().as_ref().and_then(Mounted::first_node)
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    fn call_hook(&self, select: impl Fn(&Hooks) -> Option<Hook>) {
        let hook = select(&self.hooks.borrow());
        if let Some(hook) = hook {
            hook(self);
        }
    }

    /// Run a hook on the next tick, after the current flush and everything
    /// queued before it.
    fn defer_hook(self: &Rc<Self>, select: impl Fn(&Hooks) -> Option<Hook> + 'static) {
        let weak = Rc::downgrade(self);
        self.runtime.next_tick(move || {
            if let Some(instance) = weak.upgrade() {
                instance.call_hook(&select);
            }
        });
    }

    // =========================================================================
    // Mounting
    // =========================================================================

    /// Render once and patch the result into `parent` at `index` (append
    /// when `None`). The render runs tracked: the dependencies it reads
    /// schedule this component's update job when written.
    pub fn mount_at(self: &Rc<Self>, parent: NodeId, index: Option<usize>) -> Result<(), Error> {
        match self.state.get() {
            Lifecycle::Constructing => {}
            Lifecycle::Unmounted => {
                return Err(Error::config(format!(
                    "component '{}' is unmounted and cannot be remounted",
                    self.name
                )));
            }
            _ => {
                return Err(Error::config(format!(
                    "component '{}' is already mounted",
                    self.name
                )));
            }
        }
        self.container.set(Some(parent));
        self.call_hook(|h| h.before_mount.clone());

        let priority = self
            .config
            .borrow()
            .as_ref()
            .map(|c| c.priority)
            .unwrap_or(0);
        let comp = Computation::new(
            self.runtime.next_id(),
            format!("render:{}", self.name),
            priority,
        );
        let weak = Rc::downgrade(self);
        comp.set_runner(Box::new(move || {
            if let Some(instance) = weak.upgrade() {
                instance.run_update();
            }
            Ok(())
        }));
        *self.render_comp.borrow_mut() = Some(comp.clone());

        let vnode = self.tracked_render(&comp)?;
        let cx = PatchCx {
            runtime: &self.runtime,
            backend: &self.backend,
            owner: Some(self),
        };
        let mounted = patch::patch_indexed(&cx, parent, index, None, &vnode);
        *self.root.borrow_mut() = mounted;

        self.state.set(Lifecycle::Mounted);
        self.call_hook(|h| h.mounted.clone());
        self.defer_hook(|h| h.after_mount.clone());
        Ok(())
    }

    /// Mount as the only child of `parent`.
    pub fn mount(self: &Rc<Self>, parent: NodeId) -> Result<(), Error> {
        self.mount_at(parent, None)
    }

    fn tracked_render(self: &Rc<Self>, comp: &Rc<Computation>) -> Result<VNode, Error> {
        let render = self
            .config
            .borrow()
            .as_ref()
            .and_then(|c| c.render.clone());
        let Some(render) = render else {
            return Err(Error::Render {
                component: self.name.clone(),
                reason: "render function missing".to_owned(),
            });
        };
        self.runtime
            .with_active(comp, || render(self))
            .map_err(|err| Error::Render {
                component: self.name.clone(),
                reason: err.to_string(),
            })
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// The body of this component's scheduled job: one flushed update.
    /// Dependency writes between flushes collapse into a single run via the
    /// scheduler's dedupe.
    fn run_update(self: &Rc<Self>) {
        // An unmount racing a queued update must not resurrect the tree.
        if !self.is_mounted() {
            return;
        }
        let Some(container) = self.container.get() else {
            return;
        };
        self.state.set(Lifecycle::Updating);
        self.call_hook(|h| h.before_update.clone());

        let comp = self.render_comp.borrow().clone();
        let Some(comp) = comp else {
            self.state.set(Lifecycle::Mounted);
            return;
        };
        match self.tracked_render(&comp) {
            // Render failure during an update keeps the previous tree.
            Err(err) => {
                tracing::error!(
                    component = self.name.as_str(),
                    %err,
                    "render failed; keeping previous tree"
                );
                self.state.set(Lifecycle::Mounted);
            }
            Ok(vnode) => {
                let old = self.root.borrow_mut().take();
                let cx = PatchCx {
                    runtime: &self.runtime,
                    backend: &self.backend,
                    owner: Some(self),
                };
                let mounted = patch::patch(&cx, container, old, &vnode);
                *self.root.borrow_mut() = mounted;
                self.state.set(Lifecycle::Mounted);
                self.call_hook(|h| h.updated.clone());
                self.defer_hook(|h| h.after_update.clone());
            }
        }
    }

    // =========================================================================
    // Unmounting
    // =========================================================================

    /// Tear the instance down. Idempotent; the state machine never leaves
    /// `Unmounted`.
    pub fn unmount(self: &Rc<Self>) {
        if self.state.get() == Lifecycle::Unmounted {
            return;
        }
        self.call_hook(|h| h.before_unmount.clone());

        if let Some(root) = self.root.borrow_mut().take() {
            let cx = PatchCx {
                runtime: &self.runtime,
                backend: &self.backend,
                owner: None,
            };
            patch::detach(&cx, root);
        }
        if let Some(comp) = self.render_comp.borrow_mut().take() {
            comp.kill();
        }
        for watcher in self.watchers.borrow_mut().drain(..) {
            watcher.stop();
        }
        for (_, computed) in std::mem::take(&mut *self.computeds.borrow_mut()) {
            computed.kill();
        }
        *self.data_value.borrow_mut() = Value::Null;
        *self.config.borrow_mut() = None;
        self.container.set(None);
        self.state.set(Lifecycle::Unmounted);

        // Hooks were cloned at construction, so they outlive the config.
        self.call_hook(|h| h.unmounted.clone());
        let hook = self.hooks.borrow().after_unmount.clone();
        if let Some(hook) = hook {
            // Strong capture keeps the detached shell alive until the hook
            // has run.
            let instance = self.clone();
            self.runtime.next_tick(move || hook(&instance));
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Run the config's local `on` handlers for `event` in order, then
    /// rebroadcast on the runtime bus.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let handlers = self
            .config
            .borrow()
            .as_ref()
            .and_then(|c| c.on.get(event).cloned())
            .unwrap_or_default();
        for handler in handlers {
            handler(self, args);
        }
        self.runtime.bus().emit(event, args);
    }

    /// Walk the parent chain and deliver `event` to the first ancestor
    /// whose config listens for it. Silently a no-op when none does.
    pub fn dispatch(&self, event: &str, args: &[Value]) {
        let mut current = self.parent.borrow().upgrade();
        while let Some(ancestor) = current {
            let handlers = ancestor
                .config
                .borrow()
                .as_ref()
                .and_then(|c| c.on.get(event).cloned());
            if let Some(handlers) = handlers {
                for handler in handlers {
                    handler(&ancestor, args);
                }
                return;
            }
            current = ancestor.parent.borrow().upgrade();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdom::vnode::{component, h, Props};

    fn setup() -> (Runtime, BackendHandle, NodeId) {
        let runtime = Runtime::new();
        let doc = runtime.document();
        let root = doc.borrow().root();
        let backend: BackendHandle = doc;
        (runtime, backend, root)
    }

    fn html(runtime: &Runtime, node: NodeId) -> String {
        runtime.document().borrow().outer_html(node)
    }

    #[test]
    fn test_missing_render_is_config_error() {
        let (rt, backend, _) = setup();
        let config = Rc::new(Config::new("bare"));
        assert!(matches!(
            Component::with_runtime(config, rt, backend),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_watch_path_is_config_error() {
        let (rt, backend, _) = setup();
        let config = Rc::new(
            Config::new("w")
                .render(|_| VNode::Empty)
                .watch("  ", |_, _, _| {}),
        );
        assert!(matches!(
            Component::with_runtime(config, rt, backend),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_computed_collision_is_config_error() {
        let (rt, backend, _) = setup();
        let config = Rc::new(
            Config::new("c")
                .data(Value::map([("x", Value::Int(1))]))
                .computed("x", |_| Value::Int(2))
                .render(|_| VNode::Empty),
        );
        assert!(matches!(
            Component::with_runtime(config, rt, backend),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_lifecycle_hook_order() {
        let (rt, backend, root) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let push = |log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str| {
            let log = log.clone();
            move |_: &Component| log.borrow_mut().push(tag)
        };
        let config = Rc::new(
            Config::new("hooks")
                .render(|_| h("div", Props::new(), vec![]))
                .before_create(push(&log, "before_create"))
                .created(push(&log, "created"))
                .after_init(push(&log, "after_init"))
                .before_mount(push(&log, "before_mount"))
                .mounted(push(&log, "mounted"))
                .after_mount(push(&log, "after_mount")),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["before_create", "created", "before_mount", "mounted"]
        );
        rt.settle();
        assert_eq!(
            *log.borrow(),
            vec![
                "before_create",
                "created",
                "before_mount",
                "mounted",
                "after_init",
                "after_mount"
            ]
        );
    }

    #[test]
    fn test_writes_batch_into_one_update() {
        let (rt, backend, root) = setup();
        let renders = Rc::new(Cell::new(0));
        let renders_probe = renders.clone();
        let config = Rc::new(
            Config::new("counter")
                .data(Value::map([("count", Value::Int(0))]))
                .render(move |c| {
                    renders_probe.set(renders_probe.get() + 1);
                    h(
                        "div",
                        Props::new(),
                        vec![c.get("count").to_string().into()],
                    )
                }),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();
        assert_eq!(renders.get(), 1);

        instance.set("count", Value::Int(1));
        instance.set("count", Value::Int(2));
        instance.set("count", Value::Int(3));
        rt.settle();

        // Three writes, one re-render, final state visible.
        assert_eq!(renders.get(), 2);
        assert_eq!(html(&rt, root), "<body><div>3</div></body>");
    }

    #[test]
    fn test_untracked_key_does_not_rerender() {
        let (rt, backend, root) = setup();
        let renders = Rc::new(Cell::new(0));
        let renders_probe = renders.clone();
        let config = Rc::new(
            Config::new("precise")
                .data(Value::map([
                    ("shown", Value::from("a")),
                    ("ignored", Value::Int(0)),
                ]))
                .render(move |c| {
                    renders_probe.set(renders_probe.get() + 1);
                    h("div", Props::new(), vec![c.get("shown").to_string().into()])
                }),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();

        instance.set("ignored", Value::Int(99));
        rt.settle();
        assert_eq!(renders.get(), 1);

        instance.set("shown", Value::from("b"));
        rt.settle();
        assert_eq!(renders.get(), 2);
    }

    #[test]
    fn test_computed_flows_through_render() {
        let (rt, backend, root) = setup();
        let config = Rc::new(
            Config::new("derived")
                .data(Value::map([("count", Value::Int(2))]))
                .computed("double", |c| {
                    Value::Int(c.get("count").as_int().unwrap_or(0) * 2)
                })
                .render(|c| {
                    h(
                        "div",
                        Props::new(),
                        vec![c.get("double").to_string().into()],
                    )
                }),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();
        assert_eq!(html(&rt, root), "<body><div>4</div></body>");

        instance.set("count", Value::Int(5));
        rt.settle();
        assert_eq!(html(&rt, root), "<body><div>10</div></body>");
    }

    #[test]
    fn test_watch_fires_with_old_and_new() {
        let (rt, backend, root) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_probe = seen.clone();
        let config = Rc::new(
            Config::new("watched")
                .data(Value::map([("name", Value::from("a"))]))
                .watch("name", move |_, old, new| {
                    seen_probe
                        .borrow_mut()
                        .push((old.to_string(), new.to_string()));
                })
                .render(|_| VNode::Empty),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();

        instance.set("name", Value::from("b"));
        rt.settle();
        assert_eq!(*seen.borrow(), vec![("a".to_owned(), "b".to_owned())]);
    }

    #[test]
    fn test_after_update_once_per_flush() {
        let (rt, backend, root) = setup();
        let after_updates = Rc::new(Cell::new(0));
        let probe = after_updates.clone();
        let config = Rc::new(
            Config::new("flushed")
                .data(Value::map([("n", Value::Int(0))]))
                .render(|c| h("div", Props::new(), vec![c.get("n").to_string().into()]))
                .after_update(move |_| probe.set(probe.get() + 1)),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();

        instance.set("n", Value::Int(1));
        instance.set("n", Value::Int(2));
        rt.settle();
        assert_eq!(after_updates.get(), 1);

        instance.set("n", Value::Int(3));
        rt.settle();
        assert_eq!(after_updates.get(), 2);
    }

    #[test]
    fn test_render_error_keeps_previous_tree() {
        let (rt, backend, root) = setup();
        let config = Rc::new(
            Config::new("flaky")
                .data(Value::map([("n", Value::Int(0))]))
                .try_render(|c| {
                    let n = c.get("n").as_int().unwrap_or(0);
                    if n > 0 {
                        Err(Error::config("boom"))
                    } else {
                        Ok(h("div", Props::new(), vec!["ok".into()]))
                    }
                }),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();
        assert_eq!(html(&rt, root), "<body><div>ok</div></body>");

        instance.set("n", Value::Int(1));
        rt.settle();
        // The failing update is contained; the old tree survives.
        assert_eq!(html(&rt, root), "<body><div>ok</div></body>");
        assert!(instance.is_mounted());
    }

    #[test]
    fn test_unmount_is_idempotent_and_fires_hooks() {
        let (rt, backend, root) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let config = {
            let l1 = log.clone();
            let l2 = log.clone();
            let l3 = log.clone();
            Rc::new(
                Config::new("mortal")
                    .render(|_| h("div", Props::new(), vec![]))
                    .before_unmount(move |_| l1.borrow_mut().push("before_unmount"))
                    .unmounted(move |_| l2.borrow_mut().push("unmounted"))
                    .after_unmount(move |_| l3.borrow_mut().push("after_unmount")),
            )
        };
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();
        rt.settle();

        instance.unmount();
        instance.unmount();
        rt.settle();
        assert_eq!(
            *log.borrow(),
            vec!["before_unmount", "unmounted", "after_unmount"]
        );
        assert_eq!(instance.lifecycle(), Lifecycle::Unmounted);
        assert_eq!(html(&rt, root), "<body></body>");
    }

    #[test]
    fn test_unmount_wins_race_with_pending_update() {
        let (rt, backend, root) = setup();
        let config = Rc::new(
            Config::new("racy")
                .data(Value::map([("n", Value::Int(0))]))
                .render(|c| h("div", Props::new(), vec![c.get("n").to_string().into()])),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();

        // Queue an update, then unmount before the flush.
        instance.set("n", Value::Int(1));
        instance.unmount();
        rt.settle();
        assert_eq!(html(&rt, root), "<body></body>");
    }

    #[test]
    fn test_emit_runs_local_handlers_then_bus() {
        let (rt, backend, root) = setup();
        let order = Rc::new(RefCell::new(Vec::new()));
        let config = {
            let o1 = order.clone();
            let o2 = order.clone();
            Rc::new(
                Config::new("emitter")
                    .render(|_| VNode::Empty)
                    .on("saved", move |_, _| o1.borrow_mut().push("first"))
                    .on("saved", move |_, _| o2.borrow_mut().push("second")),
            )
        };
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();

        let o3 = order.clone();
        rt.bus().on("saved", move |_| o3.borrow_mut().push("bus"));
        instance.emit("saved", &[Value::Int(1)]);
        assert_eq!(*order.borrow(), vec!["first", "second", "bus"]);
    }

    #[test]
    fn test_dispatch_reaches_first_listening_ancestor() {
        let (rt, backend, root) = setup();
        let hits = Rc::new(RefCell::new(Vec::new()));

        let child = Rc::new(
            Config::new("child")
                .render(|_| h("span", Props::new(), vec![]))
                .mounted(|c| c.dispatch("ping", &[])),
        );
        let parent = {
            let hits = hits.clone();
            let child = child.clone();
            Rc::new(
                Config::new("parent")
                    .on("ping", move |_, _| hits.borrow_mut().push("parent"))
                    .render(move |_| {
                        h(
                            "div",
                            Props::new(),
                            vec![component(child.clone(), vec![])],
                        )
                    }),
            )
        };
        let instance = Component::with_runtime(parent, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();
        rt.settle();
        assert_eq!(*hits.borrow(), vec!["parent"]);
    }

    #[test]
    fn test_slot_content_routed_to_default_and_named() {
        let (rt, backend, root) = setup();
        let child = Rc::new(Config::new("card").render(|c| {
            let mut children = vec![h("header", Props::new(), c.slot("header"))];
            children.extend(c.slot("default"));
            h("div", Props::new().class("card"), children)
        }));
        let parent = {
            let child = child.clone();
            Rc::new(Config::new("page").render(move |_| {
                component(
                    child.clone(),
                    vec![
                        h("b", Props::new().attr("slot", "header"), vec!["T".into()]),
                        "body text".into(),
                    ],
                )
            }))
        };
        let instance = Component::with_runtime(parent, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();
        assert_eq!(
            html(&rt, root),
            "<body><div class=\"card\"><header><b slot=\"header\">T</b></header>body text</div></body>"
        );
    }

    #[test]
    fn test_data_producer_runs_once_with_instance() {
        let (rt, backend, root) = setup();
        let calls = Rc::new(Cell::new(0));
        let probe = calls.clone();
        let config = Rc::new(
            Config::new("produced")
                .data_with(move |_| {
                    probe.set(probe.get() + 1);
                    Value::map([("n", Value::Int(7))])
                })
                .render(|c| h("div", Props::new(), vec![c.get("n").to_string().into()])),
        );
        let instance = Component::with_runtime(config, rt.clone(), backend).unwrap();
        instance.mount(root).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(html(&rt, root), "<body><div>7</div></body>");
    }
}
