//! Property-based tests for the reconciler.
//!
//! The core invariant: patching a mounted tree to a new vnode leaves the
//! backend in exactly the state a fresh render of the new vnode would
//! produce, for arbitrary trees.

use proptest::prelude::*;

use sprig_ui::vdom::patch::{patch, PatchCx};
use sprig_ui::{h, BackendHandle, NodeId, Props, Runtime, VNode};

fn arb_tag() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["div", "span", "p", "ul", "li"])
}

fn arb_vnode() -> impl Strategy<Value = VNode> {
    let leaf = prop_oneof![
        3 => "[a-z]{1,8}".prop_map(VNode::from),
        1 => Just(VNode::Empty),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            arb_tag(),
            prop::option::of("[a-z]{1,5}"),
            prop::option::of("[a-z]{1,5}"),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(tag, class, attr, children)| {
                let mut props = Props::new();
                if let Some(class) = class {
                    props = props.class(class.as_str());
                }
                if let Some(attr) = attr {
                    props = props.attr("data-x", attr.as_str());
                }
                h(tag, props, children)
            })
    })
}

fn mount_fresh(vnode: &VNode) -> (Runtime, String) {
    let runtime = Runtime::new();
    let doc = runtime.document();
    let root = doc.borrow().root();
    let backend: BackendHandle = doc;
    let cx = PatchCx {
        runtime: &runtime,
        backend: &backend,
        owner: None,
    };
    patch(&cx, root, None, vnode);
    let html = runtime.document().borrow().outer_html(root);
    (runtime, html)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Patching old -> new converges to the same backend state as a fresh
    /// render of new.
    #[test]
    fn test_patch_converges_to_fresh_render(old in arb_vnode(), new in arb_vnode()) {
        let runtime = Runtime::new();
        let doc = runtime.document();
        let root = doc.borrow().root();
        let backend: BackendHandle = doc;
        let cx = PatchCx {
            runtime: &runtime,
            backend: &backend,
            owner: None,
        };
        let mounted = patch(&cx, root, None, &old);
        patch(&cx, root, mounted, &new);
        let patched = runtime.document().borrow().outer_html(root);

        let (_fresh_rt, fresh) = mount_fresh(&new);
        prop_assert_eq!(patched, fresh);
    }

    /// Patching a tree to a structurally equal clone touches no nodes.
    #[test]
    fn test_patch_to_self_preserves_node_identity(tree in arb_vnode()) {
        let runtime = Runtime::new();
        let doc = runtime.document();
        let root = doc.borrow().root();
        let backend: BackendHandle = doc;
        let cx = PatchCx {
            runtime: &runtime,
            backend: &backend,
            owner: None,
        };
        let mounted = patch(&cx, root, None, &tree);
        let before: Vec<NodeId> = collect_all(&runtime, root);

        let same = tree.clone();
        patch(&cx, root, mounted, &same);
        let after: Vec<NodeId> = collect_all(&runtime, root);
        prop_assert_eq!(before, after);
    }

    /// A second patch with the same target is idempotent.
    #[test]
    fn test_patch_idempotent(old in arb_vnode(), new in arb_vnode()) {
        let runtime = Runtime::new();
        let doc = runtime.document();
        let root = doc.borrow().root();
        let backend: BackendHandle = doc;
        let cx = PatchCx {
            runtime: &runtime,
            backend: &backend,
            owner: None,
        };
        let mounted = patch(&cx, root, None, &old);
        let mounted = patch(&cx, root, mounted, &new);
        let once = runtime.document().borrow().outer_html(root);
        patch(&cx, root, mounted, &new);
        let twice = runtime.document().borrow().outer_html(root);
        prop_assert_eq!(once, twice);
    }
}

fn collect_all(runtime: &Runtime, node: NodeId) -> Vec<NodeId> {
    let mut out = vec![node];
    let children = runtime.document().borrow().children_of(node);
    for child in children {
        out.extend(collect_all(runtime, child));
    }
    out
}

/// Keyed reorders preserve node identity for every key, not just order.
#[test]
fn test_keyed_permutation_preserves_identity() {
    use sprig_ui::vdom::create_vnode;

    let keys = ["a", "b", "c", "d", "e"];
    let list = |order: &[&str]| {
        h(
            "ul",
            Props::new(),
            order
                .iter()
                .map(|k| create_vnode("li", Props::new(), vec![(*k).into()], Some(*k)))
                .collect(),
        )
    };

    let runtime = Runtime::new();
    let doc = runtime.document();
    let root = doc.borrow().root();
    let backend: BackendHandle = doc;
    let cx = PatchCx {
        runtime: &runtime,
        backend: &backend,
        owner: None,
    };
    let mounted = patch(&cx, root, None, &list(&keys)).unwrap();
    let ul = mounted.first_node().unwrap();
    let original = runtime.document().borrow().children_of(ul);

    let permuted = ["d", "a", "e", "c", "b"];
    patch(&cx, root, Some(mounted), &list(&permuted));
    let after = runtime.document().borrow().children_of(ul);

    // Node that held key k before still holds it after.
    let expect: Vec<NodeId> = permuted
        .iter()
        .map(|k| {
            let at = keys.iter().position(|orig| orig == k).unwrap();
            original[at]
        })
        .collect();
    assert_eq!(after, expect);
}
