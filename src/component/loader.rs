//! Deferred component loading.
//!
//! A [`Loader`] stands in for a component whose config arrives later. It
//! renders a loading placeholder until [`Loader::resolve`] supplies the
//! real config or [`Loader::fail`] parks it on an error placeholder. The
//! state lives in a reactive map, so resolution re-renders any component
//! tree the loader was spliced into without extra wiring.
//!
//! ```text
//! Loading -> Ready
//!        \-> Failed
//! ```
//!
//! A loader that never resolves simply stays on its placeholder.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Config;
use crate::error::Error;
use crate::reactive::observable::Observable;
use crate::runtime::Runtime;
use crate::value::Value;
use crate::vdom::vnode::{component, h, Props, VNode};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadState {
    Loading,
    Ready,
    Failed,
}

struct LoaderInner {
    runtime: Runtime,
    /// Reactive map holding the current state under `"state"`.
    cell: Value,
    resolved: RefCell<Option<Rc<Config>>>,
    loading_view: RefCell<VNode>,
    error_view: RefCell<VNode>,
}

/// Handle on a pending component slot.
#[derive(Clone)]
pub struct Loader {
    inner: Rc<LoaderInner>,
}

impl Loader {
    pub fn new(runtime: &Runtime) -> Loader {
        let cell = runtime.reactive(Value::map([("state", Value::from("loading"))]));
        Loader {
            inner: Rc::new(LoaderInner {
                runtime: runtime.clone(),
                cell,
                resolved: RefCell::new(None),
                loading_view: RefCell::new(h(
                    "div",
                    Props::new().class("loading"),
                    vec!["Loading...".into()],
                )),
                error_view: RefCell::new(h(
                    "div",
                    Props::new().class("load-error"),
                    vec!["Failed to load component".into()],
                )),
            }),
        }
    }

    /// Replace the loading placeholder.
    pub fn loading_view(self, view: VNode) -> Self {
        *self.inner.loading_view.borrow_mut() = view;
        self
    }

    /// Replace the error placeholder.
    pub fn error_view(self, view: VNode) -> Self {
        *self.inner.error_view.borrow_mut() = view;
        self
    }

    fn cell(&self) -> Option<Observable> {
        Observable::wrap(&self.inner.runtime, &self.inner.cell)
    }

    pub fn state(&self) -> LoadState {
        let state = self.cell().map(|c| c.get("state")).unwrap_or(Value::Null);
        match state.as_str() {
            Some("ready") => LoadState::Ready,
            Some("failed") => LoadState::Failed,
            _ => LoadState::Loading,
        }
    }

    /// Supply the real config. First resolution wins; later calls and
    /// calls after `fail` are ignored with a warning.
    pub fn resolve(&self, config: Rc<Config>) {
        if self.state() != LoadState::Loading {
            tracing::warn!(component = config.name.as_str(), "loader already settled");
            return;
        }
        *self.inner.resolved.borrow_mut() = Some(config);
        if let Some(cell) = self.cell() {
            cell.set("state", Value::from("ready"));
        }
    }

    /// Park the loader on its error placeholder.
    pub fn fail(&self, reason: &str) {
        if self.state() != LoadState::Loading {
            tracing::warn!(reason, "loader already settled");
            return;
        }
        let err = Error::Load(reason.to_owned());
        tracing::error!(%err, "component load failed");
        if let Some(cell) = self.cell() {
            cell.set("state", Value::from("failed"));
        }
    }

    /// The vnode for the loader's current state. Reading it inside a
    /// render tracks the state cell, so settling the loader re-renders
    /// the enclosing component.
    pub fn view(&self) -> VNode {
        match self.state() {
            LoadState::Loading => self.inner.loading_view.borrow().clone(),
            LoadState::Failed => self.inner.error_view.borrow().clone(),
            LoadState::Ready => match self.inner.resolved.borrow().as_ref() {
                Some(config) => component(config.clone(), Vec::new()),
                None => self.inner.error_view.borrow().clone(),
            },
        }
    }

    /// Package the loader as a component config, ready to splice into a
    /// tree like any other component.
    pub fn into_config(self, name: &str) -> Rc<Config> {
        Rc::new(Config::new(name).render(move |_| self.view()))
    }
}
