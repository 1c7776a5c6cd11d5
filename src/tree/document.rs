//! In-memory tree backend.
//!
//! Nodes live in an index arena with a free pool for O(1) reuse, the same
//! allocation scheme as a component registry. The document doubles as the
//! test backend: it can dispatch events into attached listeners (with upward
//! propagation) and serialize a subtree to an HTML-ish string for
//! assertions.

use std::collections::BTreeMap;

use super::{Backend, Event, Listener, ListenerId, NodeId};
use crate::value::Value;

enum NodeKind {
    Element { tag: String },
    Text { text: String },
}

struct Node {
    kind: NodeKind,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    classes: Vec<String>,
    visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<(ListenerId, String, Listener)>,
}

impl Node {
    fn new(kind: NodeKind) -> Node {
        Node {
            kind,
            attrs: BTreeMap::new(),
            styles: BTreeMap::new(),
            classes: Vec::new(),
            visible: true,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

/// In-memory document tree.
pub struct Document {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    root: NodeId,
    next_listener: u64,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// Create a document with a `body` root node.
    pub fn new() -> Document {
        let mut doc = Document {
            nodes: Vec::new(),
            free: Vec::new(),
            root: 0,
            next_listener: 1,
        };
        doc.root = doc.alloc(Node::new(NodeKind::Element {
            tag: "body".to_owned(),
        }));
        doc
    }

    /// The root node every mount ultimately hangs off.
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    /// Create a container element with an `id` attribute under the root.
    /// Convenience for app bootstrapping and tests.
    pub fn create_container(&mut self, id: &str) -> NodeId {
        let node = self.create_element("div");
        self.set_attr(node, "id", id);
        let root = self.root;
        self.insert_child(root, node, None);
        node
    }

    /// Find an element by its `id` attribute.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.nodes.iter().enumerate().find_map(|(node_id, node)| {
            node.as_ref()
                .filter(|n| n.attrs.get("id").map(String::as_str) == Some(id))
                .map(|_| node_id)
        })
    }

    pub fn is_alive(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn tag_of(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.kind {
            NodeKind::Element { tag } => Some(tag),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn text_of(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.kind {
            NodeKind::Text { text } => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attr_of(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)?.attrs.get(name).map(String::as_str)
    }

    pub fn style_of(&self, node: NodeId, prop: &str) -> Option<&str> {
        self.node(node)?.styles.get(prop).map(String::as_str)
    }

    pub fn class_of(&self, node: NodeId) -> String {
        self.node(node)
            .map(|n| n.classes.join(" "))
            .unwrap_or_default()
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.node(node).map(|n| n.visible).unwrap_or(false)
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.node(node).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|&c| c != node);
            }
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
    }

    fn free_subtree(&mut self, node: NodeId) {
        let children = self.children_of(node);
        for child in children {
            self.free_subtree(child);
        }
        if self.nodes.get_mut(node).map(Option::take).is_some() {
            self.free.push(node);
        }
    }

    /// Snapshot the listeners that should see an event dispatched at
    /// `target`: local listeners first, then each ancestor's (upward
    /// propagation).
    fn listener_chain(&self, target: NodeId, event: &str) -> Vec<Listener> {
        let mut chain = Vec::new();
        let mut current = Some(target);
        while let Some(id) = current {
            let Some(node) = self.node(id) else { break };
            chain.extend(
                node.listeners
                    .iter()
                    .filter(|(_, name, _)| name == event)
                    .map(|(_, _, listener)| listener.clone()),
            );
            current = node.parent;
        }
        chain
    }

    /// Serialize a subtree. Text is escaped; hidden nodes carry
    /// `display:none`; attributes print in key order.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else { return };
        match &node.kind {
            NodeKind::Text { text } => out.push_str(&escape(text)),
            NodeKind::Element { tag } => {
                out.push('<');
                out.push_str(tag);
                if !node.classes.is_empty() {
                    out.push_str(&format!(" class=\"{}\"", node.classes.join(" ")));
                }
                let mut styles: Vec<String> = node
                    .styles
                    .iter()
                    .map(|(k, v)| format!("{k}:{v}"))
                    .collect();
                if !node.visible {
                    styles.push("display:none".to_owned());
                }
                if !styles.is_empty() {
                    out.push_str(&format!(" style=\"{}\"", styles.join(";")));
                }
                for (name, value) in &node.attrs {
                    out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
                }
                out.push('>');
                for child in &node.children {
                    self.write_html(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

/// Event dispatch lives on the concrete document, not the backend trait:
/// it is a stimulus surface (tests, demo loops), not a mutation the
/// reconciler needs.
impl Document {
    /// Dispatch an event at a node. Listeners on the node run first, then
    /// each ancestor's, in attach order. The listener snapshot is taken
    /// before any callback runs, so handlers may mutate the tree or the
    /// listener set freely.
    pub fn dispatch(doc: &std::rc::Rc<std::cell::RefCell<Document>>, target: NodeId, event: &str, args: &[Value]) {
        let chain = doc.borrow().listener_chain(target, event);
        let payload = Event {
            name: event.to_owned(),
            target,
            args: args.to_vec(),
        };
        for listener in chain {
            listener(&payload);
        }
    }
}

impl Backend for Document {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Node::new(NodeKind::Element {
            tag: tag.to_owned(),
        }))
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node::new(NodeKind::Text {
            text: text.to_owned(),
        }))
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.node_mut(node) {
            if let NodeKind::Text { text: slot } = &mut n.kind {
                *slot = text.to_owned();
            }
        }
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.node_mut(node) {
            n.attrs.insert(name.to_owned(), value.to_owned());
        }
    }

    fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(n) = self.node_mut(node) {
            n.attrs.remove(name);
        }
    }

    fn set_style(&mut self, node: NodeId, prop: &str, value: &str) {
        if let Some(n) = self.node_mut(node) {
            n.styles.insert(prop.to_owned(), value.to_owned());
        }
    }

    fn remove_style(&mut self, node: NodeId, prop: &str) {
        if let Some(n) = self.node_mut(node) {
            n.styles.remove(prop);
        }
    }

    fn set_class_name(&mut self, node: NodeId, classes: &str) {
        if let Some(n) = self.node_mut(node) {
            n.classes = classes
                .split_whitespace()
                .map(str::to_owned)
                .collect();
        }
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(n) = self.node_mut(node) {
            if !n.classes.iter().any(|c| c == class) {
                n.classes.push(class.to_owned());
            }
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(n) = self.node_mut(node) {
            n.classes.retain(|c| c != class);
        }
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(n) = self.node_mut(node) {
            n.visible = visible;
        }
    }

    fn insert_child(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        if self.node(parent).is_none() || self.node(child).is_none() {
            tracing::warn!(parent, child, "insert_child on a dead node; ignored");
            return;
        }
        self.detach(child);
        if let Some(p) = self.node_mut(parent) {
            let index = index.unwrap_or(p.children.len()).min(p.children.len());
            p.children.insert(index, child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.node(parent)?.children.iter().position(|&c| c == child)
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
        self.free_subtree(node);
    }

    fn add_listener(&mut self, node: NodeId, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        if let Some(n) = self.node_mut(node) {
            n.listeners.push((id, event.to_owned(), listener));
        }
        id
    }

    fn remove_listener(&mut self, node: NodeId, id: ListenerId) {
        if let Some(n) = self.node_mut(node) {
            n.listeners.retain(|(listener_id, _, _)| *listener_id != id);
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// Attribute values sit inside double quotes.
fn escape_attr(value: &str) -> String {
    escape(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_tree_structure() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div");
        let text = doc.create_text("hello");
        doc.insert_child(root, div, None);
        doc.insert_child(div, text, None);

        assert_eq!(doc.parent_of(div), Some(root));
        assert_eq!(doc.children_of(div), vec![text]);
        assert_eq!(doc.outer_html(div), "<div>hello</div>");
    }

    #[test]
    fn test_insert_at_index_and_move() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let c = doc.create_element("c");
        doc.insert_child(root, a, None);
        doc.insert_child(root, b, None);
        doc.insert_child(root, c, Some(1));
        assert_eq!(doc.children_of(root), vec![a, c, b]);

        // Re-inserting an attached node moves it.
        doc.insert_child(root, a, None);
        assert_eq!(doc.children_of(root), vec![c, b, a]);
    }

    #[test]
    fn test_remove_frees_subtree_and_recycles() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div");
        let span = doc.create_element("span");
        doc.insert_child(root, div, None);
        doc.insert_child(div, span, None);

        doc.remove(div);
        assert!(!doc.is_alive(div));
        assert!(!doc.is_alive(span));
        assert!(doc.children_of(root).is_empty());

        // Freed indices are reused.
        let reused = doc.create_element("p");
        assert!(reused == div || reused == span);
    }

    #[test]
    fn test_attrs_styles_classes_serialize() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attr(div, "id", "x");
        doc.set_style(div, "color", "red");
        doc.set_class_name(div, "a b");
        doc.set_visible(div, false);
        assert_eq!(
            doc.outer_html(div),
            "<div class=\"a b\" style=\"color:red;display:none\" id=\"x\"></div>"
        );

        doc.remove_attr(div, "id");
        doc.remove_style(div, "color");
        doc.remove_class(div, "a");
        doc.set_visible(div, true);
        assert_eq!(doc.outer_html(div), "<div class=\"b\"></div>");
    }

    #[test]
    fn test_attr_value_quotes_escaped() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attr(div, "title", "say \"hi\" & <bye>");
        assert_eq!(
            doc.outer_html(div),
            "<div title=\"say &quot;hi&quot; &amp; &lt;bye&gt;\"></div>"
        );
    }

    #[test]
    fn test_index_of_child() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.insert_child(root, a, None);
        doc.insert_child(root, b, None);
        assert_eq!(doc.index_of(root, b), Some(1));
        assert_eq!(doc.index_of(a, b), None);
    }

    #[test]
    fn test_dispatch_bubbles_upward() {
        let doc = Rc::new(RefCell::new(Document::new()));
        let (outer, inner) = {
            let mut d = doc.borrow_mut();
            let root = d.root();
            let outer = d.create_element("div");
            let inner = d.create_element("button");
            d.insert_child(root, outer, None);
            d.insert_child(outer, inner, None);
            (outer, inner)
        };

        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let mut d = doc.borrow_mut();
            let order_inner = order.clone();
            d.add_listener(inner, "click", Rc::new(move |_| order_inner.borrow_mut().push("inner")));
            let order_outer = order.clone();
            d.add_listener(outer, "click", Rc::new(move |_| order_outer.borrow_mut().push("outer")));
        }

        Document::dispatch(&doc, inner, "click", &[]);
        assert_eq!(*order.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_remove_listener() {
        let doc = Rc::new(RefCell::new(Document::new()));
        let button = doc.borrow_mut().create_element("button");
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let id = doc.borrow_mut().add_listener(
            button,
            "click",
            Rc::new(move |_| hits_clone.set(hits_clone.get() + 1)),
        );
        Document::dispatch(&doc, button, "click", &[]);
        doc.borrow_mut().remove_listener(button, id);
        Document::dispatch(&doc, button, "click", &[]);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_element_by_id() {
        let mut doc = Document::new();
        let container = doc.create_container("app");
        assert_eq!(doc.element_by_id("app"), Some(container));
        assert_eq!(doc.element_by_id("missing"), None);
    }
}
