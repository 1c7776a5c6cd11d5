//! Enter/leave transitions.
//!
//! A transition wraps a single child and stages class toggles across ticks
//! when the child enters or leaves the tree: `{name}-enter-from` on
//! insertion, swapped for `{name}-enter-to` one tick later, cleared the
//! tick after. Leaving mirrors the sequence with `-leave-` classes and the
//! physical removal deferred to the end. User hooks fire at each stage.
//!
//! The crate animates nothing itself; the classes are the contract with
//! whatever styling layer the backend feeds.

use std::rc::Rc;

use crate::runtime::Runtime;
use crate::tree::{BackendHandle, NodeId};
use crate::vdom::vnode::{TransitionRef, VNode};

type StageHook = Rc<dyn Fn()>;

/// Declarative transition: a class-name prefix and optional stage hooks.
#[derive(Default)]
pub struct TransitionSpec {
    pub name: String,
    before_enter: Option<StageHook>,
    enter: Option<StageHook>,
    after_enter: Option<StageHook>,
    before_leave: Option<StageHook>,
    leave: Option<StageHook>,
    after_leave: Option<StageHook>,
}

macro_rules! stage_setter {
    ($($name:ident),+ $(,)?) => {
        $(
            pub fn $name(mut self, hook: impl Fn() + 'static) -> Self {
                self.$name = Some(Rc::new(hook));
                self
            }
        )+
    };
}

impl TransitionSpec {
    pub fn new(name: &str) -> TransitionSpec {
        TransitionSpec {
            name: name.to_owned(),
            ..TransitionSpec::default()
        }
    }

    stage_setter!(before_enter, enter, after_enter, before_leave, leave, after_leave);

    /// Wrap a child node in this transition.
    pub fn wrap(self: Rc<Self>, child: VNode) -> VNode {
        VNode::Transition(TransitionRef {
            spec: self,
            child: Box::new(child),
        })
    }

    fn class(&self, stage: &str) -> String {
        format!("{}-{}", self.name, stage)
    }

    /// Enter staging, called right after the child's node is inserted.
    pub(crate) fn stage_enter(&self, runtime: &Runtime, backend: &BackendHandle, node: NodeId) {
        if let Some(hook) = &self.before_enter {
            hook();
        }
        let from = self.class("enter-from");
        let to = self.class("enter-to");
        backend.borrow_mut().add_class(node, &from);

        let backend = backend.clone();
        let rt = runtime.clone();
        let enter = self.enter.clone();
        let after_enter = self.after_enter.clone();
        runtime.next_tick(move || {
            {
                let mut be = backend.borrow_mut();
                be.remove_class(node, &from);
                be.add_class(node, &to);
            }
            if let Some(hook) = enter {
                hook();
            }
            rt.next_tick(move || {
                backend.borrow_mut().remove_class(node, &to);
                if let Some(hook) = after_enter {
                    hook();
                }
            });
        });
    }

    /// Leave staging; `remove` performs the deferred physical teardown.
    pub(crate) fn stage_leave(
        &self,
        runtime: &Runtime,
        backend: &BackendHandle,
        node: NodeId,
        remove: impl FnOnce() + 'static,
    ) {
        if let Some(hook) = &self.before_leave {
            hook();
        }
        let from = self.class("leave-from");
        let to = self.class("leave-to");
        backend.borrow_mut().add_class(node, &from);

        let backend = backend.clone();
        let rt = runtime.clone();
        let leave = self.leave.clone();
        let after_leave = self.after_leave.clone();
        runtime.next_tick(move || {
            {
                let mut be = backend.borrow_mut();
                be.remove_class(node, &from);
                be.add_class(node, &to);
            }
            if let Some(hook) = leave {
                hook();
            }
            rt.next_tick(move || {
                remove();
                if let Some(hook) = after_leave {
                    hook();
                }
            });
        });
    }
}

/// Wrap `child` in a transition with no hooks.
pub fn transition(name: &str, child: VNode) -> VNode {
    Rc::new(TransitionSpec::new(name)).wrap(child)
}
