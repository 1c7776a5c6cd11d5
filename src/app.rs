//! Application bootstrap.
//!
//! [`create_app`] wraps a root component config; [`App::mount`] resolves a
//! container in the runtime's document by `#id` selector and mounts the
//! root into it. Mounting is one-shot per app.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::component::{Component, Config};
use crate::error::Error;
use crate::runtime::Runtime;
use crate::tree::BackendHandle;

pub struct App {
    runtime: Runtime,
    config: Rc<Config>,
    root: RefCell<Option<Rc<Component>>>,
    mounted: Cell<bool>,
}

/// Create an app on the thread's default runtime.
pub fn create_app(config: Rc<Config>) -> App {
    App::with_runtime(config, crate::runtime::global())
}

impl App {
    pub fn with_runtime(config: Rc<Config>, runtime: Runtime) -> App {
        App {
            runtime,
            config,
            root: RefCell::new(None),
            mounted: Cell::new(false),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The running root component, once mounted.
    pub fn root(&self) -> Option<Rc<Component>> {
        self.root.borrow().clone()
    }

    /// Mount the root component into the container named by `selector`
    /// (an `#id`, the leading `#` optional). Drains the microtask queue so
    /// deferred hooks (`after_init`, `after_mount`) have run on return.
    pub fn mount(&self, selector: &str) -> Result<(), Error> {
        if self.mounted.get() {
            return Err(Error::config("app is already mounted"));
        }
        let id = selector.strip_prefix('#').unwrap_or(selector);
        let document = self.runtime.document();
        let container = document
            .borrow()
            .element_by_id(id)
            .ok_or_else(|| Error::config(format!("no element with id '{id}'")))?;

        let backend: BackendHandle = document;
        let root = Component::with_runtime(self.config.clone(), self.runtime.clone(), backend)?;
        root.mount_at(container, None)?;
        *self.root.borrow_mut() = Some(root);
        self.mounted.set(true);
        self.runtime.settle();
        Ok(())
    }

    /// Tear the root down. Idempotent; the app stays spent afterwards.
    pub fn unmount(&self) {
        if let Some(root) = self.root.borrow_mut().take() {
            root.unmount();
        }
        self.runtime.settle();
    }
}
