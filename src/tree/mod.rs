//! Tree backend abstraction.
//!
//! The reconciler does not mandate a specific DOM binding; it drives any
//! backend capable of creating, mutating, and removing tree nodes through
//! the [`Backend`] trait. The crate ships one implementation, the in-memory
//! [`document::Document`], which is also what tests assert against.

pub mod document;

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

pub use document::Document;

/// Index of a live node inside a backend.
pub type NodeId = usize;

/// Identifies one attached listener for targeted teardown.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ListenerId(pub(crate) u64);

/// An event delivered to node listeners.
#[derive(Clone)]
pub struct Event {
    pub name: String,
    /// The node the event was dispatched at (not the listener's node when
    /// bubbling).
    pub target: NodeId,
    pub args: Vec<Value>,
}

/// Node event listener.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Shared backend handle the reconciler and components operate through.
pub type BackendHandle = Rc<RefCell<dyn Backend>>;

/// Minimal mutation surface a tree backend must provide.
pub trait Backend {
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;
    fn set_text(&mut self, node: NodeId, text: &str);

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attr(&mut self, node: NodeId, name: &str);
    fn set_style(&mut self, node: NodeId, prop: &str, value: &str);
    fn remove_style(&mut self, node: NodeId, prop: &str);
    fn set_class_name(&mut self, node: NodeId, classes: &str);
    fn add_class(&mut self, node: NodeId, class: &str);
    fn remove_class(&mut self, node: NodeId, class: &str);
    /// Visibility toggle backing the `show` prop (display in a DOM backend).
    fn set_visible(&mut self, node: NodeId, visible: bool);

    /// Insert `child` under `parent` at `index` (append when `None`). A
    /// child already attached elsewhere is moved.
    fn insert_child(&mut self, parent: NodeId, child: NodeId, index: Option<usize>);
    /// Position of `child` within `parent`, `None` when not a child.
    fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize>;
    /// Detach a node and release its subtree, listeners included.
    fn remove(&mut self, node: NodeId);

    fn add_listener(&mut self, node: NodeId, event: &str, listener: Listener) -> ListenerId;
    fn remove_listener(&mut self, node: NodeId, id: ListenerId);
}
