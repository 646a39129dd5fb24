//! Fiber Differ - brings one templated fiber up to date.
//!
//! For a fiber rendering a tag element or a tagged template:
//!
//! 1. Resolve the SVG context (inherited, or opened by the SVG root tag)
//! 2. Detach the node if its cached template belongs to another position
//! 3. Carry the previous pass's realized template over on a matching shape
//! 4. Otherwise realize one (tag path or template path)
//! 5. Patch root-level parts of non-tag templates against the fiber's part
//! 6. Bind parts to child fibers, or clone the children on a pure move
//! 7. Link the fiber as an effect and propagate the parent's context

use std::rc::Rc;

use tracing::{trace, trace_span};

use crate::engine::{FiberId, FiberTree, TemplateRealizer};
use crate::error::{ReconcileError, Result};
use crate::types::{Node, TemplateSlot};

use super::parts::parts_to_fiber;

/// Update a tag or template fiber against its alternate.
pub fn process_tag_fiber(
    tree: &mut FiberTree,
    fiber_id: FiberId,
    realizer: &dyn TemplateRealizer,
) -> Result<()> {
    let _span = trace_span!("process_tag_fiber", ?fiber_id).entered();

    let fiber = tree.fiber(fiber_id)?;
    let mut node = fiber
        .node
        .clone()
        .filter(|node| node.is_templated())
        .ok_or(ReconcileError::NotTemplated(fiber_id))?;
    let part = fiber.part.clone();
    let inherited_svg = fiber.is_svg_part();
    let old_node = fiber
        .alternate
        .and_then(|alternate| tree.fiber(alternate).ok())
        .and_then(|alternate| alternate.node.clone());
    let context = match fiber.parent {
        Some(parent) => tree.fiber(parent)?.context.clone(),
        None => tree.root(fiber.root)?.context.clone(),
    };

    let is_tag_element = matches!(*node, Node::Tag(_));

    // Store the SVG context back on the fiber, children inherit it
    let is_svg_part = inherited_svg
        || node
            .tag_name()
            .is_some_and(|tag| tree.config().is_svg_tag(tag));
    tree.fiber_mut(fiber_id)?.set_svg_part(is_svg_part);

    let is_same_node = old_node
        .as_ref()
        .is_some_and(|old_node| Rc::ptr_eq(old_node, &node));

    // A cached template on a node that is new at this position belongs to
    // another position: render a copy with an empty slot instead
    if !is_same_node && node.template_slot().is_some_and(TemplateSlot::is_set) {
        if let Some(detached) = node.detached() {
            node = Rc::new(detached);
            tree.fiber_mut(fiber_id)?.node = Some(node.clone());
            tree.stats.nodes_detached += 1;
            trace!(?fiber_id, "detached shared node");
        }
    }

    // Same static shape: reuse the realized template, only values change
    if let Some(old_node) = &old_node {
        if old_node.template_key() == node.template_key() {
            if let (Some(slot), Some(old_slot)) = (node.template_slot(), old_node.template_slot()) {
                slot.set(old_slot.get());
            }
        }
    }

    let slot = node
        .template_slot()
        .ok_or(ReconcileError::NotTemplated(fiber_id))?;
    let template = match slot.get() {
        Some(template) => {
            tree.stats.templates_reused += 1;
            template
        }
        None => {
            let template = match &*node {
                Node::Tag(tag) => realizer.realize_tag(tag, is_svg_part),
                Node::Template(element) => {
                    realizer.realize_template(&element.template, is_svg_part)
                }
                _ => return Err(ReconcileError::NotTemplated(fiber_id)),
            };
            slot.set(Some(template.clone()));
            tree.stats.templates_realized += 1;
            trace!(?fiber_id, is_svg_part, "realized template");
            template
        }
    };

    // Fragment-like templates and first/last children may lack a parent
    // linkage for their root-level parts
    if !is_tag_element {
        template.patch_parts(part.as_ref());
    }

    if is_same_node {
        // Position-only move: nothing about the parts changed
        tree.clone_children_fibers(fiber_id)?;
    } else {
        parts_to_fiber(tree, &template.parts(), node.values(), fiber_id)?;
    }

    tree.link_effect(fiber_id)?;
    tree.fiber_mut(fiber_id)?.context = context;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{NodePart, Part, RealizedTemplate, RootId};
    use crate::primitives::create_element;
    use crate::testing::{FakeRealizer, PartSpec};
    use crate::types::{AttrValue, Attributes, NodeRef, Value};

    fn class_attrs(value: &str) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("class".into(), value.into());
        attrs
    }

    fn template_of(tree: &FiberTree, fiber: FiberId) -> Rc<dyn RealizedTemplate> {
        tree.fiber(fiber)
            .unwrap()
            .node
            .as_ref()
            .and_then(|node| node.template_slot())
            .and_then(TemplateSlot::get)
            .unwrap()
    }

    /// Start a pass and link `node` as the top fiber, threading the old top.
    fn link_top(tree: &mut FiberTree, root: RootId, node: NodeRef) -> FiberId {
        let host = tree.begin_pass(root).unwrap();
        let old = tree.alternate_child(host).unwrap();
        tree.create_and_link(Some(node), None, old, host, host).unwrap()
    }

    #[test]
    fn test_tag_element_binds_config_and_children() {
        let realizer = FakeRealizer::new();
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);

        let node = create_element("div", class_attrs("a"), Some(crate::types::Node::text("hi")));
        let fiber = link_top(&mut tree, root, node);
        process_tag_fiber(&mut tree, fiber, &realizer).unwrap();

        let children = tree.children(fiber);
        assert_eq!(children.len(), 2);
        match tree.fiber(children[0]).unwrap().node.as_deref() {
            Some(Node::Attribute(attrs)) => {
                assert_eq!(attrs.attributes.get("class"), Some(&AttrValue::from("a")));
            }
            other => panic!("expected attribute node, got {other:?}"),
        }
        assert_eq!(realizer.realize_count(), 1);
        assert_eq!(tree.root(root).unwrap().pass(), 1);
        assert!(tree.root(root).unwrap().has_effects());
    }

    #[test]
    fn test_template_reused_for_same_shape() {
        let realizer = FakeRealizer::new();
        let shape = realizer.shape(
            &["<div class=\"a\" ", "></div>"],
            vec![PartSpec::Attr {
                host: 0,
                tag_attrs: vec!["class"],
                attr_index: 1,
            }],
        );
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);

        let first = link_top(
            &mut tree,
            root,
            Node::template(shape.clone(), vec![Value::Attributes(class_attrs("x"))]),
        );
        process_tag_fiber(&mut tree, first, &realizer).unwrap();
        let first_template = template_of(&tree, first);
        tree.promote_wip(root).unwrap();

        let second = link_top(
            &mut tree,
            root,
            Node::template(shape, vec![Value::Attributes(class_attrs("y"))]),
        );
        process_tag_fiber(&mut tree, second, &realizer).unwrap();

        assert!(Rc::ptr_eq(&first_template, &template_of(&tree, second)));
        assert_eq!(realizer.realize_count(), 1);
        assert_eq!(tree.stats().templates_reused, 1);
        assert_eq!(tree.stats().parts_bound, 2);
    }

    #[test]
    fn test_shape_change_realizes_fresh() {
        let realizer = FakeRealizer::new();
        let a = realizer.shape(&["<p>", "</p>"], vec![PartSpec::Node { host: 0 }]);
        let b = realizer.shape(&["<p>", "</p>"], vec![PartSpec::Node { host: 0 }]);
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);

        let first = link_top(&mut tree, root, Node::template(a, vec![Value::Node(None)]));
        process_tag_fiber(&mut tree, first, &realizer).unwrap();
        tree.promote_wip(root).unwrap();

        let second = link_top(&mut tree, root, Node::template(b, vec![Value::Node(None)]));
        assert_eq!(tree.fiber(second).unwrap().alternate, None);
        process_tag_fiber(&mut tree, second, &realizer).unwrap();

        assert_eq!(realizer.realize_count(), 2);
        assert_eq!(tree.pending_tear_down(root).unwrap(), &[first]);
    }

    #[test]
    fn test_shared_node_gets_independent_templates() {
        let realizer = FakeRealizer::new();
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);
        let shared = create_element("span", Attributes::new(), None);

        let host = tree.begin_pass(root).unwrap();
        let a = tree.create_and_link(Some(shared.clone()), None, None, host, host).unwrap();
        let b = tree.create_and_link(Some(shared.clone()), None, None, a, host).unwrap();
        process_tag_fiber(&mut tree, a, &realizer).unwrap();
        process_tag_fiber(&mut tree, b, &realizer).unwrap();

        let template_a = template_of(&tree, a);
        let template_b = template_of(&tree, b);
        assert!(!Rc::ptr_eq(&template_a, &template_b));
        // The first position keeps the shared node, the second renders a copy
        assert!(Rc::ptr_eq(tree.fiber(a).unwrap().node.as_ref().unwrap(), &shared));
        assert!(!Rc::ptr_eq(tree.fiber(b).unwrap().node.as_ref().unwrap(), &shared));
        assert_eq!(tree.stats().nodes_detached, 1);
        assert_eq!(realizer.realize_count(), 2);
    }

    #[test]
    fn test_same_node_clones_children() {
        let realizer = FakeRealizer::new();
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);
        let node = create_element("div", class_attrs("a"), Some(crate::types::Node::text("x")));

        let first = link_top(&mut tree, root, node.clone());
        process_tag_fiber(&mut tree, first, &realizer).unwrap();
        let old_children = tree.children(first);
        tree.promote_wip(root).unwrap();
        tree.reset_stats();

        let second = link_top(&mut tree, root, node.clone());
        process_tag_fiber(&mut tree, second, &realizer).unwrap();

        assert_eq!(tree.stats().parts_bound, 0);
        assert_eq!(tree.stats().children_cloned, 1);
        assert_eq!(tree.stats().nodes_detached, 0);
        let new_children = tree.children(second);
        assert_eq!(new_children.len(), old_children.len());
        for (new, old) in new_children.iter().zip(&old_children) {
            let new = tree.fiber(*new).unwrap();
            assert_eq!(new.alternate, Some(*old));
        }
        assert!(Rc::ptr_eq(tree.fiber(second).unwrap().node.as_ref().unwrap(), &node));
    }

    #[test]
    fn test_svg_root_opens_svg_context() {
        let realizer = FakeRealizer::new();
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);
        let inner = create_element("circle", Attributes::new(), None);
        let svg = create_element("svg", Attributes::new(), Some(inner));

        let fiber = link_top(&mut tree, root, svg);
        process_tag_fiber(&mut tree, fiber, &realizer).unwrap();

        assert!(tree.fiber(fiber).unwrap().is_svg_part());
        assert!(realizer.realized.borrow()[0].is_svg);
        for child in tree.children(fiber) {
            assert!(tree.fiber(child).unwrap().is_svg_part());
        }
    }

    #[test]
    fn test_non_tag_template_patches_parts() {
        let realizer = FakeRealizer::new();
        let shape = realizer.shape(&["", ""], vec![PartSpec::RootNode]);
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);

        let host = tree.begin_pass(root).unwrap();
        let outer = Part::Node(NodePart {
            parent: Some(crate::engine::HostNodeId(99)),
            previous_sibling: None,
            next_sibling: None,
        });
        let fiber = tree
            .create_and_link(
                Some(Node::template(shape, vec![Value::Node(None)])),
                Some(outer),
                None,
                host,
                host,
            )
            .unwrap();
        process_tag_fiber(&mut tree, fiber, &realizer).unwrap();

        let template = realizer.realized.borrow()[0].clone();
        assert_eq!(template.patched.get(), 1);
        match &template.parts()[0] {
            Part::Node(part) => assert_eq!(part.parent, Some(crate::engine::HostNodeId(99))),
            other => panic!("expected node part, got {other:?}"),
        }
    }

    #[test]
    fn test_context_taken_from_parent() {
        let realizer = FakeRealizer::new();
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);
        let mut context = Attributes::new();
        context.insert("theme".into(), "dark".into());
        tree.root_mut(root).unwrap().context = Rc::new(context);

        let fiber = link_top(&mut tree, root, create_element("div", Attributes::new(), None));
        process_tag_fiber(&mut tree, fiber, &realizer).unwrap();

        let context = tree.fiber(fiber).unwrap().context.clone();
        assert_eq!(context.get("theme"), Some(&AttrValue::from("dark")));
    }

    #[test]
    fn test_rejects_untemplated_node() {
        let realizer = FakeRealizer::new();
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);
        let fiber = link_top(&mut tree, root, crate::types::Node::text("plain"));

        assert_eq!(
            process_tag_fiber(&mut tree, fiber, &realizer),
            Err(ReconcileError::NotTemplated(fiber))
        );
    }
}
