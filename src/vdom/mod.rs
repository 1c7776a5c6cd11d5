//! Virtual tree: node values, markup parsing, and the reconciler.

pub mod markup;
pub mod patch;
pub mod vnode;

pub use patch::{patch, Mounted, PatchCx};
pub use vnode::{
    component, create_vnode, fragment, h, text_node, AttrValue, ClassSpec, ComponentRef,
    Handler, Props, TransitionRef, VNode,
};
