//! Virtual node values.
//!
//! A [`VNode`] is a cheap description of a subtree. Render functions build
//! fresh trees on every pass; the reconciler in [`super::patch`] compares
//! them against the previous pass and applies the difference to a backend.
//!
//! # Example
//!
//! ```ignore
//! use sprig_ui::vdom::{h, Props, VNode};
//!
//! let view = h(
//!     "div",
//!     Props::new().class("card").attr("id", "greeting"),
//!     vec![
//!         h("span", Props::new(), vec![VNode::from("hello")]),
//!     ],
//! );
//! ```

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::component::transition::TransitionSpec;
use crate::component::Config;
use crate::tree::{Event, Listener};

// =============================================================================
// Attribute and class values
// =============================================================================

/// A plain attribute value. Serialized to a string when applied.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttrValue {
    pub fn to_attr_string(&self) -> String {
        match self {
            AttrValue::Str(s) => s.clone(),
            AttrValue::Int(n) => n.to_string(),
            AttrValue::Float(f) => f.to_string(),
            AttrValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<i32> for AttrValue {
    fn from(n: i32) -> Self {
        AttrValue::Int(n as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// The `class` prop accepts a single name, a list of specs, or a
/// name-to-enabled toggle map.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassSpec {
    Name(String),
    Many(Vec<ClassSpec>),
    Toggle(Vec<(String, bool)>),
}

impl ClassSpec {
    /// Flatten to the space-separated class string the backend receives.
    pub fn resolve(&self) -> String {
        let mut names = Vec::new();
        self.collect(&mut names);
        names.join(" ")
    }

    fn collect(&self, out: &mut Vec<String>) {
        match self {
            ClassSpec::Name(name) => {
                if !name.is_empty() {
                    out.push(name.clone());
                }
            }
            ClassSpec::Many(specs) => {
                for spec in specs {
                    spec.collect(out);
                }
            }
            ClassSpec::Toggle(entries) => {
                for (name, enabled) in entries {
                    if *enabled {
                        out.push(name.clone());
                    }
                }
            }
        }
    }
}

impl From<&str> for ClassSpec {
    fn from(s: &str) -> Self {
        ClassSpec::Name(s.to_owned())
    }
}

impl From<String> for ClassSpec {
    fn from(s: String) -> Self {
        ClassSpec::Name(s)
    }
}

impl From<Vec<&str>> for ClassSpec {
    fn from(names: Vec<&str>) -> Self {
        ClassSpec::Many(names.into_iter().map(ClassSpec::from).collect())
    }
}

// =============================================================================
// Props
// =============================================================================

/// Event handler attached through the `on` prop.
pub type Handler = Listener;

/// Element attribute map with the reserved keys as typed fields.
///
/// Reserved keys never reach the generic attribute table: `style` merges
/// into inline styles, `class` sets the class string, `show` toggles
/// visibility, `html` replaces the children with parsed markup, `text`
/// prepends a text child, and `on` attaches event handlers.
#[derive(Clone, Default)]
pub struct Props {
    pub attrs: BTreeMap<String, AttrValue>,
    pub style: BTreeMap<String, String>,
    pub class: Option<ClassSpec>,
    pub show: Option<bool>,
    pub html: Option<String>,
    pub text: Option<String>,
    pub on: BTreeMap<String, Vec<Handler>>,
}

impl Props {
    pub fn new() -> Props {
        Props::default()
    }

    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_owned(), value.into());
        self
    }

    pub fn style(mut self, prop: &str, value: &str) -> Self {
        self.style.insert(prop.to_owned(), value.to_owned());
        self
    }

    pub fn class(mut self, spec: impl Into<ClassSpec>) -> Self {
        self.class = Some(spec.into());
        self
    }

    pub fn show(mut self, visible: bool) -> Self {
        self.show = Some(visible);
        self
    }

    pub fn html(mut self, markup: &str) -> Self {
        self.html = Some(markup.to_owned());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_owned());
        self
    }

    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.on
            .entry(event.to_owned())
            .or_default()
            .push(Rc::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
            && self.style.is_empty()
            && self.class.is_none()
            && self.show.is_none()
            && self.html.is_none()
            && self.text.is_none()
            && self.on.is_empty()
    }
}

fn handlers_eq(a: &BTreeMap<String, Vec<Handler>>, b: &BTreeMap<String, Vec<Handler>>) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
            ka == kb
                && va.len() == vb.len()
                && va
                    .iter()
                    .zip(vb.iter())
                    .all(|(ha, hb)| Rc::ptr_eq(ha, hb))
        })
}

/// Handlers compare by pointer identity: a fresh closure is a different
/// handler even when behaviorally identical.
impl PartialEq for Props {
    fn eq(&self, other: &Props) -> bool {
        self.attrs == other.attrs
            && self.style == other.style
            && self.class == other.class
            && self.show == other.show
            && self.html == other.html
            && self.text == other.text
            && handlers_eq(&self.on, &other.on)
    }
}

impl std::fmt::Debug for Props {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Props")
            .field("attrs", &self.attrs)
            .field("class", &self.class)
            .field("show", &self.show)
            .field("on", &self.on.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// VNode
// =============================================================================

/// Reference to a component occurrence inside a tree. The config is shared;
/// `children` is slot content routed at instantiation time.
#[derive(Clone)]
pub struct ComponentRef {
    pub config: Rc<Config>,
    pub children: Vec<VNode>,
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &ComponentRef) -> bool {
        Rc::ptr_eq(&self.config, &other.config) && self.children == other.children
    }
}

/// Reference to a transition wrapper around a single child.
#[derive(Clone)]
pub struct TransitionRef {
    pub spec: Rc<TransitionSpec>,
    pub child: Box<VNode>,
}

impl PartialEq for TransitionRef {
    fn eq(&self, other: &TransitionRef) -> bool {
        Rc::ptr_eq(&self.spec, &other.spec) && self.child == other.child
    }
}

/// One node of a virtual tree.
#[derive(Clone, PartialEq)]
pub enum VNode {
    /// An omitted child. Produced by `Option::None` and `false` coercions;
    /// contributes nothing to the backend.
    Empty,
    Text(String),
    Element {
        tag: String,
        props: Props,
        children: Vec<VNode>,
        key: Option<String>,
    },
    /// A nested list of children, flattened during normalization.
    Fragment(Vec<VNode>),
    Component(ComponentRef),
    Transition(TransitionRef),
}

impl VNode {
    pub fn key(&self) -> Option<&str> {
        match self {
            VNode::Element { key, .. } => key.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, VNode::Empty)
    }

    /// The `slot` attribute names the slot a component child is routed to.
    pub(crate) fn slot_name(&self) -> Option<String> {
        match self {
            VNode::Element { props, .. } => props
                .attrs
                .get("slot")
                .map(AttrValue::to_attr_string),
            _ => None,
        }
    }
}

impl std::fmt::Debug for VNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VNode::Empty => write!(f, "Empty"),
            VNode::Text(text) => f.debug_tuple("Text").field(text).finish(),
            VNode::Element { tag, children, key, .. } => f
                .debug_struct("Element")
                .field("tag", tag)
                .field("key", key)
                .field("children", children)
                .finish_non_exhaustive(),
            VNode::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            VNode::Component(c) => f
                .debug_struct("Component")
                .field("name", &c.config.name)
                .finish_non_exhaustive(),
            VNode::Transition(t) => f
                .debug_struct("Transition")
                .field("name", &t.spec.name)
                .field("child", &t.child)
                .finish(),
        }
    }
}

// =============================================================================
// Builders and coercions
// =============================================================================

/// Build an element node. Pure; nothing touches a backend until the tree is
/// patched.
pub fn create_vnode(
    tag: &str,
    props: Props,
    children: Vec<VNode>,
    key: Option<&str>,
) -> VNode {
    VNode::Element {
        tag: tag.to_owned(),
        props,
        children,
        key: key.map(str::to_owned),
    }
}

/// Shorthand element builder.
pub fn h(tag: &str, props: Props, children: Vec<VNode>) -> VNode {
    create_vnode(tag, props, children, None)
}

/// Build a text node.
pub fn text_node(text: impl Into<String>) -> VNode {
    VNode::Text(text.into())
}

/// Build a fragment node.
pub fn fragment(children: Vec<VNode>) -> VNode {
    VNode::Fragment(children)
}

/// Reference a component as a child, with its children routed into slots.
pub fn component(config: Rc<Config>, children: Vec<VNode>) -> VNode {
    VNode::Component(ComponentRef { config, children })
}

impl From<&str> for VNode {
    fn from(s: &str) -> Self {
        VNode::Text(s.to_owned())
    }
}

impl From<String> for VNode {
    fn from(s: String) -> Self {
        VNode::Text(s)
    }
}

impl From<i64> for VNode {
    fn from(n: i64) -> Self {
        VNode::Text(n.to_string())
    }
}

impl From<i32> for VNode {
    fn from(n: i32) -> Self {
        VNode::Text(n.to_string())
    }
}

impl From<f64> for VNode {
    fn from(f: f64) -> Self {
        VNode::Text(f.to_string())
    }
}

impl From<bool> for VNode {
    fn from(b: bool) -> Self {
        if b {
            VNode::Text("true".to_owned())
        } else {
            VNode::Empty
        }
    }
}

impl<T: Into<VNode>> From<Option<T>> for VNode {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => VNode::Empty,
        }
    }
}

impl<T: Into<VNode>> From<Vec<T>> for VNode {
    fn from(items: Vec<T>) -> Self {
        VNode::Fragment(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_spec_resolution() {
        assert_eq!(ClassSpec::from("card").resolve(), "card");
        assert_eq!(ClassSpec::from(vec!["a", "b"]).resolve(), "a b");
        let toggled = ClassSpec::Toggle(vec![
            ("on".to_owned(), true),
            ("off".to_owned(), false),
        ]);
        assert_eq!(toggled.resolve(), "on");
        let mixed = ClassSpec::Many(vec![
            ClassSpec::from("base"),
            ClassSpec::Toggle(vec![("active".to_owned(), true)]),
        ]);
        assert_eq!(mixed.resolve(), "base active");
    }

    #[test]
    fn test_child_coercions() {
        assert_eq!(VNode::from("hi"), VNode::Text("hi".to_owned()));
        assert_eq!(VNode::from(42i64), VNode::Text("42".to_owned()));
        assert_eq!(VNode::from(false), VNode::Empty);
        assert_eq!(VNode::from(None::<&str>), VNode::Empty);
        assert_eq!(
            VNode::from(vec!["a", "b"]),
            VNode::Fragment(vec![
                VNode::Text("a".to_owned()),
                VNode::Text("b".to_owned())
            ])
        );
    }

    #[test]
    fn test_props_equality_by_handler_pointer() {
        let handler: Handler = Rc::new(|_| {});
        let a = Props {
            on: [("click".to_owned(), vec![handler.clone()])].into(),
            ..Props::default()
        };
        let b = Props {
            on: [("click".to_owned(), vec![handler])].into(),
            ..Props::default()
        };
        assert_eq!(a, b);

        let fresh = Props::new().on("click", |_| {});
        assert_ne!(a, fresh);
    }

    #[test]
    fn test_vnode_structural_equality() {
        let a = h("div", Props::new().attr("id", "x"), vec!["hi".into()]);
        let b = h("div", Props::new().attr("id", "x"), vec!["hi".into()]);
        assert_eq!(a, b);

        let c = h("div", Props::new().attr("id", "y"), vec!["hi".into()]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_slot_name_from_attr() {
        let named = h("div", Props::new().attr("slot", "header"), vec![]);
        assert_eq!(named.slot_name(), Some("header".to_owned()));
        assert_eq!(h("div", Props::new(), vec![]).slot_name(), None);
    }
}
