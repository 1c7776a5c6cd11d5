//! Tree reconciler.
//!
//! [`patch`] compares a previously materialized subtree against a freshly
//! rendered [`VNode`] and applies the minimal set of backend mutations:
//! unchanged subtrees are skipped via structural equality, matching nodes
//! are updated in place, and only genuinely new or removed positions touch
//! the backend.
//!
//! A [`Mounted`] value is the live counterpart of a vnode: the backend
//! node(s) it produced, attached listener ids for targeted teardown, child
//! mounts, and for component positions the running instance.

use std::rc::Rc;

use crate::component::Component;
use crate::runtime::Runtime;
use crate::tree::{BackendHandle, ListenerId, NodeId};
use crate::vdom::markup;
use crate::vdom::vnode::{ClassSpec, Props, VNode};

// =============================================================================
// Patch context
// =============================================================================

/// Everything a patch pass needs: the runtime (tick deferral, component
/// wiring), the backend to mutate, and the component owning this subtree
/// (parent link for instantiated children).
pub struct PatchCx<'a> {
    pub runtime: &'a Runtime,
    pub backend: &'a BackendHandle,
    pub owner: Option<&'a Rc<Component>>,
}

// =============================================================================
// Mounted subtrees
// =============================================================================

/// A materialized subtree.
pub struct Mounted {
    /// The vnode this mount was produced from. Compared against the next
    /// pass's vnode for the short-circuit and for prop diffing.
    pub(crate) vnode: VNode,
    kind: Kind,
}

enum Kind {
    Text(NodeId),
    Element {
        node: NodeId,
        listeners: Vec<(String, ListenerId)>,
        children: Vec<Mounted>,
    },
    Component(Rc<Component>),
    Transition(Box<Mounted>),
    /// Multiple roots (a top-level fragment), or zero (a failed component
    /// occurrence holding its position).
    Many(Vec<Mounted>),
}

impl Mounted {
    /// Number of backend nodes this mount occupies in its parent.
    pub fn node_count(&self) -> usize {
        match &self.kind {
            Kind::Text(_) | Kind::Element { .. } => 1,
            Kind::Component(instance) => instance.node_count(),
            Kind::Transition(inner) => inner.node_count(),
            Kind::Many(children) => children.iter().map(Mounted::node_count).sum(),
        }
    }

    /// Collect the top-level backend nodes, in tree order.
    pub fn collect_nodes(&self, out: &mut Vec<NodeId>) {
        match &self.kind {
            Kind::Text(node) | Kind::Element { node, .. } => out.push(*node),
            Kind::Component(instance) => instance.collect_nodes(out),
            Kind::Transition(inner) => inner.collect_nodes(out),
            Kind::Many(children) => {
                for child in children {
                    child.collect_nodes(out);
                }
            }
        }
    }

    pub fn first_node(&self) -> Option<NodeId> {
        let mut nodes = Vec::new();
        self.collect_nodes(&mut nodes);
        nodes.first().copied()
    }

    /// The component instance at this position, when it is one.
    pub fn component(&self) -> Option<&Rc<Component>> {
        match &self.kind {
            Kind::Component(instance) => Some(instance),
            Kind::Transition(inner) => inner.component(),
            _ => None,
        }
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Flatten fragments, drop omitted children, and route markup-looking text
/// through the parser. The result contains only text, element, component,
/// and transition nodes, which is what the diff below operates on.
pub fn normalize_children(children: &[VNode]) -> Vec<VNode> {
    let mut out = Vec::new();
    normalize_into(children, &mut out);
    out
}

fn normalize_into(children: &[VNode], out: &mut Vec<VNode>) {
    for child in children {
        match child {
            VNode::Empty => {}
            VNode::Fragment(nested) => normalize_into(nested, out),
            VNode::Text(text) if markup::looks_like_markup(text) => {
                match markup::parse(text) {
                    Ok(parsed) => normalize_into(&parsed, out),
                    Err(err) => {
                        tracing::warn!(%err, "markup child failed to parse; kept as text");
                        out.push(child.clone());
                    }
                }
            }
            other => out.push(other.clone()),
        }
    }
}

/// The children an element actually materializes: the `html` prop replaces
/// the declared children wholesale; otherwise the `text` prop prepends a
/// text child to the normalized list.
fn effective_children(props: &Props, children: &[VNode]) -> Vec<VNode> {
    if let Some(html) = &props.html {
        match markup::parse(html) {
            Ok(parsed) => normalize_children(&parsed),
            Err(err) => {
                tracing::warn!(%err, "html prop failed to parse; kept as text");
                vec![VNode::Text(html.clone())]
            }
        }
    } else {
        let mut out = Vec::new();
        if let Some(text) = &props.text {
            out.push(VNode::Text(text.clone()));
        }
        normalize_into(children, &mut out);
        out
    }
}

// =============================================================================
// Patch entry points
// =============================================================================

/// Reconcile `new` against a previously mounted subtree under `parent`.
///
/// Returns the updated mount, or `None` when `new` is [`VNode::Empty`]
/// (the old subtree, if any, is detached).
pub fn patch(
    cx: &PatchCx<'_>,
    parent: NodeId,
    old: Option<Mounted>,
    new: &VNode,
) -> Option<Mounted> {
    patch_at(cx, parent, usize::MAX, old, new)
}

/// [`patch`] with an explicit insertion index for fresh mounts, used when a
/// component splices its root among existing siblings.
pub(crate) fn patch_indexed(
    cx: &PatchCx<'_>,
    parent: NodeId,
    index: Option<usize>,
    old: Option<Mounted>,
    new: &VNode,
) -> Option<Mounted> {
    patch_at(cx, parent, index.unwrap_or(usize::MAX), old, new)
}

fn patch_at(
    cx: &PatchCx<'_>,
    parent: NodeId,
    index: usize,
    old: Option<Mounted>,
    new: &VNode,
) -> Option<Mounted> {
    if new.is_empty() {
        if let Some(old) = old {
            detach(cx, old);
        }
        return None;
    }

    let Some(old) = old else {
        return Some(mount(cx, parent, index, new));
    };

    // Identical subtree: leave the backend untouched.
    if old.vnode == *new {
        return Some(old);
    }

    match (old.kind, new) {
        (Kind::Text(node), VNode::Text(text)) => {
            cx.backend.borrow_mut().set_text(node, text);
            Some(Mounted {
                vnode: new.clone(),
                kind: Kind::Text(node),
            })
        }
        (
            Kind::Element {
                node,
                mut listeners,
                children,
            },
            VNode::Element {
                tag: new_tag,
                props: new_props,
                children: new_children,
                ..
            },
        ) if matches!(&old.vnode, VNode::Element { tag, .. } if tag == new_tag) => {
            let old_props = match &old.vnode {
                VNode::Element { props, .. } => props,
                _ => unreachable!(),
            };
            apply_props(cx, node, Some(old_props), new_props, &mut listeners);
            let new_eff = effective_children(new_props, new_children);
            let children = patch_children(cx, node, children, &new_eff);
            Some(Mounted {
                vnode: new.clone(),
                kind: Kind::Element {
                    node,
                    listeners,
                    children,
                },
            })
        }
        (Kind::Transition(inner), VNode::Transition(new_ref))
            if matches!(&old.vnode, VNode::Transition(old_ref)
                if Rc::ptr_eq(&old_ref.spec, &new_ref.spec)) =>
        {
            let inner = patch_at(cx, parent, index, Some(*inner), &new_ref.child);
            match inner {
                Some(inner) => Some(Mounted {
                    vnode: new.clone(),
                    kind: Kind::Transition(Box::new(inner)),
                }),
                None => None,
            }
        }
        // Kind or tag mismatch, or a component occurrence that is not
        // vnode-equal: rebuild from scratch.
        (old_kind, _) => {
            let position = position_of(cx, parent, &old_kind);
            detach(
                cx,
                Mounted {
                    vnode: old.vnode,
                    kind: old_kind,
                },
            );
            Some(mount(cx, parent, position.unwrap_or(index), new))
        }
    }
}

/// Physical index of a mount's first node within its parent, so a
/// replacement lands in the same position.
fn position_of(cx: &PatchCx<'_>, parent: NodeId, kind: &Kind) -> Option<usize> {
    let mut nodes = Vec::new();
    match kind {
        Kind::Text(node) | Kind::Element { node, .. } => nodes.push(*node),
        Kind::Component(instance) => instance.collect_nodes(&mut nodes),
        Kind::Transition(inner) => inner.collect_nodes(&mut nodes),
        Kind::Many(children) => {
            for child in children {
                child.collect_nodes(&mut nodes);
            }
        }
    }
    let first = *nodes.first()?;
    cx.backend.borrow().index_of(parent, first)
}

// =============================================================================
// Mounting
// =============================================================================

fn insert(cx: &PatchCx<'_>, parent: NodeId, node: NodeId, index: usize) {
    let index = if index == usize::MAX { None } else { Some(index) };
    cx.backend.borrow_mut().insert_child(parent, node, index);
}

fn mount(cx: &PatchCx<'_>, parent: NodeId, index: usize, new: &VNode) -> Mounted {
    match new {
        VNode::Empty => Mounted {
            vnode: new.clone(),
            kind: Kind::Many(Vec::new()),
        },
        VNode::Text(text) => {
            let node = cx.backend.borrow_mut().create_text(text);
            insert(cx, parent, node, index);
            Mounted {
                vnode: new.clone(),
                kind: Kind::Text(node),
            }
        }
        VNode::Element {
            tag,
            props,
            children,
            ..
        } => {
            let node = cx.backend.borrow_mut().create_element(tag);
            let mut listeners = Vec::new();
            apply_props(cx, node, None, props, &mut listeners);
            let eff = effective_children(props, children);
            let mut mounted_children = Vec::new();
            for child in &eff {
                if let Some(mounted) = patch_at(cx, node, usize::MAX, None, child) {
                    mounted_children.push(mounted);
                }
            }
            insert(cx, parent, node, index);
            Mounted {
                vnode: new.clone(),
                kind: Kind::Element {
                    node,
                    listeners,
                    children: mounted_children,
                },
            }
        }
        VNode::Fragment(children) => {
            let eff = normalize_children(children);
            let mut mounted_children = Vec::new();
            let mut at = index;
            for child in &eff {
                if let Some(mounted) = patch_at(cx, parent, at, None, child) {
                    if at != usize::MAX {
                        at += mounted.node_count();
                    }
                    mounted_children.push(mounted);
                }
            }
            Mounted {
                vnode: new.clone(),
                kind: Kind::Many(mounted_children),
            }
        }
        VNode::Component(component_ref) => {
            let instance = Component::instantiate(
                cx.runtime.clone(),
                cx.backend.clone(),
                component_ref.config.clone(),
                component_ref.children.clone(),
                cx.owner.map(Rc::downgrade),
            )
            .and_then(|instance| {
                instance.mount_at(
                    parent,
                    if index == usize::MAX { None } else { Some(index) },
                )?;
                Ok(instance)
            });
            match instance {
                Ok(instance) => Mounted {
                    vnode: new.clone(),
                    kind: Kind::Component(instance),
                },
                Err(err) => {
                    tracing::error!(
                        component = component_ref.config.name.as_str(),
                        %err,
                        "component failed to mount"
                    );
                    Mounted {
                        vnode: new.clone(),
                        kind: Kind::Many(Vec::new()),
                    }
                }
            }
        }
        VNode::Transition(transition_ref) => {
            let inner = mount(cx, parent, index, &transition_ref.child);
            if let Some(node) = inner.first_node() {
                transition_ref
                    .spec
                    .stage_enter(cx.runtime, cx.backend, node);
            }
            Mounted {
                vnode: new.clone(),
                kind: Kind::Transition(Box::new(inner)),
            }
        }
    }
}

// =============================================================================
// Props
// =============================================================================

fn apply_props(
    cx: &PatchCx<'_>,
    node: NodeId,
    old: Option<&Props>,
    new: &Props,
    listeners: &mut Vec<(String, ListenerId)>,
) {
    let mut backend = cx.backend.borrow_mut();

    for (name, value) in &new.attrs {
        if old.and_then(|o| o.attrs.get(name)) != Some(value) {
            backend.set_attr(node, name, &value.to_attr_string());
        }
    }
    if let Some(old) = old {
        for name in old.attrs.keys() {
            if !new.attrs.contains_key(name) {
                backend.remove_attr(node, name);
            }
        }
    }

    for (prop, value) in &new.style {
        if old.and_then(|o| o.style.get(prop)) != Some(value) {
            backend.set_style(node, prop, value);
        }
    }
    if let Some(old) = old {
        for prop in old.style.keys() {
            if !new.style.contains_key(prop) {
                backend.remove_style(node, prop);
            }
        }
    }

    if old.map(|o| &o.class) != Some(&new.class) || (old.is_none() && new.class.is_some()) {
        let resolved = new.class.as_ref().map(ClassSpec::resolve).unwrap_or_default();
        backend.set_class_name(node, &resolved);
    }

    let old_show = old.and_then(|o| o.show);
    if old_show != new.show {
        backend.set_visible(node, new.show.unwrap_or(true));
    }

    // Handler lists compare by pointer; a changed list drops exactly the
    // listeners previously attached for that event and attaches the new
    // ones.
    let unchanged = |event: &str| {
        old.is_some_and(|o| {
            match (o.on.get(event), new.on.get(event)) {
                (Some(a), Some(b)) => {
                    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Rc::ptr_eq(x, y))
                }
                (None, None) => true,
                _ => false,
            }
        })
    };

    let mut events: Vec<&String> = new.on.keys().collect();
    if let Some(old) = old {
        for event in old.on.keys() {
            if !new.on.contains_key(event) {
                events.push(event);
            }
        }
    }
    for event in events {
        if unchanged(event) {
            continue;
        }
        listeners.retain(|(name, id)| {
            if name == event {
                backend.remove_listener(node, *id);
                false
            } else {
                true
            }
        });
        if let Some(handlers) = new.on.get(event) {
            for handler in handlers {
                let id = backend.add_listener(node, event, handler.clone());
                listeners.push((event.clone(), id));
            }
        }
    }
}

// =============================================================================
// Children
// =============================================================================

fn patch_children(
    cx: &PatchCx<'_>,
    parent: NodeId,
    old: Vec<Mounted>,
    new: &[VNode],
) -> Vec<Mounted> {
    let keyed = !old.is_empty()
        && !new.is_empty()
        && old.iter().all(|m| m.vnode.key().is_some())
        && new.iter().all(|v| v.key().is_some());
    if keyed {
        patch_children_keyed(cx, parent, old, new)
    } else {
        patch_children_positional(cx, parent, old, new)
    }
}

fn patch_children_positional(
    cx: &PatchCx<'_>,
    parent: NodeId,
    old: Vec<Mounted>,
    new: &[VNode],
) -> Vec<Mounted> {
    let mut old_iter = old.into_iter();
    let mut out = Vec::with_capacity(new.len());
    let mut index = 0usize;
    for child in new {
        let previous = old_iter.next();
        if let Some(mounted) = patch_at(cx, parent, index, previous, child) {
            index += mounted.node_count();
            out.push(mounted);
        }
    }
    for stale in old_iter {
        detach(cx, stale);
    }
    out
}

fn patch_children_keyed(
    cx: &PatchCx<'_>,
    parent: NodeId,
    old: Vec<Mounted>,
    new: &[VNode],
) -> Vec<Mounted> {
    let mut pool: Vec<Option<Mounted>> = old.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(new.len());
    let mut index = 0usize;

    for child in new {
        let key = child.key().expect("keyed diff requires keys");
        let matched = pool
            .iter_mut()
            .find(|slot| {
                slot.as_ref()
                    .is_some_and(|m| m.vnode.key() == Some(key))
            })
            .and_then(Option::take);
        if let Some(mounted) = patch_at(cx, parent, index, matched, child) {
            // Re-place so backend order follows the new key order.
            let mut nodes = Vec::new();
            mounted.collect_nodes(&mut nodes);
            for node in nodes {
                insert(cx, parent, node, index);
                index += 1;
            }
            out.push(mounted);
        }
    }
    for stale in pool.into_iter().flatten() {
        detach(cx, stale);
    }
    out
}

// =============================================================================
// Teardown
// =============================================================================

/// Detach a mounted subtree: nested component instances unmount (hooks
/// fire), attached listeners die with their nodes, the backend nodes are
/// removed. Transitions defer the physical removal through their leave
/// staging.
pub fn detach(cx: &PatchCx<'_>, mounted: Mounted) {
    match mounted.kind {
        Kind::Text(node) => cx.backend.borrow_mut().remove(node),
        Kind::Element { node, children, .. } => {
            for child in children {
                detach_nested(cx, child);
            }
            cx.backend.borrow_mut().remove(node);
        }
        Kind::Component(instance) => instance.unmount(),
        Kind::Transition(inner) => {
            let spec = match &mounted.vnode {
                VNode::Transition(t) => t.spec.clone(),
                _ => {
                    detach(cx, *inner);
                    return;
                }
            };
            let node = inner.first_node();
            match node {
                Some(node) => {
                    spec.stage_leave(cx.runtime, cx.backend, node, {
                        let runtime = cx.runtime.clone();
                        let backend = cx.backend.clone();
                        let inner = *inner;
                        move || {
                            let cx = PatchCx {
                                runtime: &runtime,
                                backend: &backend,
                                owner: None,
                            };
                            detach(&cx, inner);
                        }
                    });
                }
                None => detach(cx, *inner),
            }
        }
        Kind::Many(children) => {
            for child in children {
                detach(cx, child);
            }
        }
    }
}

/// Teardown for a child whose backend node dies with its parent: component
/// instances still unmount, but plain nodes skip the per-node removal.
fn detach_nested(cx: &PatchCx<'_>, mounted: Mounted) {
    match mounted.kind {
        Kind::Text(_) => {}
        Kind::Element { children, .. } => {
            for child in children {
                detach_nested(cx, child);
            }
        }
        Kind::Component(instance) => instance.unmount(),
        Kind::Transition(inner) => detach_nested(cx, *inner),
        Kind::Many(children) => {
            for child in children {
                detach_nested(cx, child);
            }
        }
    }
}
