//! Part Binder - maps a template's dynamic parts onto child fibers.
//!
//! A realized template exposes its dynamic slots as an ordered list of
//! [`Part`]s, aligned index-for-index with the node's dynamic values:
//!
//! ```text
//! parts:  [Attr(host=1), Attr(host=1), Node, Attr(host=2)]
//! values: [{a: 1},       {b: 2},       <p>,  {c: 3}      ]
//!            └──── one attribute node ──┘  │        │
//! fibers:  [AttributeNode{a, b},         <p>,  AttributeNode{c}]
//! ```
//!
//! Consecutive attribute parts on the same host are merged into one
//! attribute node so the host receives a single attribute set.
//!
//! # Override resolution
//!
//! `tag_attrs` lists the host's static attribute names in declaration
//! order and `attr_index` counts the static attributes declared before the
//! dynamic slot. A dynamic attribute is overridden when a static attribute
//! of the same name is declared after the slot:
//!
//! ```text
//! <div class="a" ${attrs}>   tag_attrs=[class] attr_index=1  -> dynamic class wins
//! <div ${attrs} class="a">   tag_attrs=[class] attr_index=0  -> static class wins
//! ```

use std::rc::Rc;

use tracing::{trace, warn};

use crate::config::ReconcileConfig;
use crate::engine::{AttributePart, FiberId, FiberTree, Part};
use crate::error::{ReconcileError, Result};
use crate::types::{AttributeNode, AttrValue, Attributes, Callback, Node, NodeRef, Value};

/// Whether the dynamic slot at `attr_index` is shadowed by a later static
/// declaration of `attr_name`.
pub fn is_attr_overridden(tag_attrs: &[String], attr_name: &str, attr_index: usize) -> bool {
    tag_attrs
        .iter()
        .rposition(|name| name == attr_name)
        .is_some_and(|last_index| attr_index <= last_index)
}

/// Build the synthesized node carrying a host's coalesced dynamic attributes.
pub fn attribute_node(attributes: Attributes, node_ref: Option<Callback>) -> NodeRef {
    Rc::new(Node::Attribute(AttributeNode {
        attributes,
        node_ref,
    }))
}

/// Create or update the child-fiber chain of `parent` from the template's
/// parts and the node's dynamic values.
///
/// The previous pass's chain (`parent.alternate.child`, then siblings) is
/// consumed one link per produced fiber and threaded into
/// [`FiberTree::create_and_link`] as the diff baseline.
pub fn parts_to_fiber(
    tree: &mut FiberTree,
    parts: &[Part],
    values: &[Value],
    parent: FiberId,
) -> Result<()> {
    tree.stats.parts_bound += 1;

    let mut ref_fiber = parent;
    let mut old_child = tree.alternate_child(parent)?;

    let mut i = 0;
    while i < parts.len() {
        let part = &parts[i];

        let node = match part {
            Part::Attribute(first) => {
                let host = first.host;
                let mut dynamic_attributes = Attributes::new();
                let mut node_ref = None;

                // Mix all consecutive attribute parts of the same host
                while let Some(Part::Attribute(attr_part)) = parts.get(i) {
                    if attr_part.host != host {
                        break;
                    }
                    let attributes = value_at(values, i)?.as_attributes().ok_or(
                        ReconcileError::PartValueMismatch {
                            index: i,
                            expected: "attributes",
                        },
                    )?;
                    collect_attributes(
                        tree.config(),
                        attr_part,
                        attributes,
                        &mut dynamic_attributes,
                        &mut node_ref,
                    );
                    i += 1;
                }

                Some(attribute_node(dynamic_attributes, node_ref))
            }
            Part::Node(_) => {
                let node = value_at(values, i)?
                    .as_node()
                    .ok_or(ReconcileError::PartValueMismatch {
                        index: i,
                        expected: "node",
                    })?
                    .clone();
                i += 1;
                node
            }
        };

        ref_fiber = tree.create_and_link(node, Some(part.clone()), old_child, ref_fiber, parent)?;

        old_child = match old_child {
            Some(id) => tree.fiber(id)?.sibling,
            None => None,
        };
    }

    tree.tear_down_from(old_child)
}

fn value_at(values: &[Value], index: usize) -> Result<&Value> {
    values.get(index).ok_or(ReconcileError::MissingValue { index })
}

/// Copy one slot's attributes into the host's dynamic set, skipping reserved
/// and overridden names and capturing a function ref.
fn collect_attributes(
    config: &ReconcileConfig,
    part: &AttributePart,
    attributes: &Attributes,
    dynamic_attributes: &mut Attributes,
    node_ref: &mut Option<Callback>,
) {
    for (name, value) in attributes {
        if name == "ref" {
            // Last ref of the host wins; only function refs are supported
            *node_ref = match value {
                AttrValue::Function(callback) => Some(callback.clone()),
                AttrValue::Null => None,
                other => {
                    warn!(host = ?part.host, value = ?other, "ignored non-function ref");
                    None
                }
            };
            continue;
        }

        if config.is_reserved(name) {
            continue;
        }

        let static_name = config.static_attribute_name(name);
        if is_attr_overridden(&part.tag_attrs, static_name, part.attr_index) {
            trace!(host = ?part.host, attribute = %name, "dynamic attribute overridden");
            continue;
        }

        dynamic_attributes.insert(name.clone(), value.clone());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{HostNodeId, NodePart};
    use crate::types::AttrValue;

    fn strings(names: &[&str]) -> Rc<[String]> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn attr_part(host: u64, tag_attrs: &[&str], attr_index: usize) -> Part {
        Part::Attribute(AttributePart {
            host: HostNodeId(host),
            tag_attrs: strings(tag_attrs),
            attr_index,
        })
    }

    fn node_part(parent: u64) -> Part {
        Part::Node(NodePart {
            parent: Some(HostNodeId(parent)),
            previous_sibling: None,
            next_sibling: None,
        })
    }

    fn attrs(pairs: &[(&str, AttrValue)]) -> Value {
        Value::Attributes(
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }

    fn attribute_set(tree: &FiberTree, fiber: FiberId) -> AttributeNode {
        match tree.fiber(fiber).unwrap().node.as_deref() {
            Some(Node::Attribute(node)) => node.clone(),
            other => panic!("expected attribute node, got {other:?}"),
        }
    }

    /// Tree with a root and a work-in-progress parent fiber.
    fn setup() -> (FiberTree, crate::engine::RootId, FiberId) {
        let mut tree = FiberTree::new();
        let root = tree.create_root(None);
        let host = tree.begin_pass(root).unwrap();
        (tree, root, host)
    }

    #[test]
    fn test_is_attr_overridden() {
        let tag_attrs = strings(&["id", "class", "id"]);

        // A single later declaration wins over the slot
        assert!(is_attr_overridden(&tag_attrs, "class", 0));
        assert!(is_attr_overridden(&tag_attrs, "class", 1));
        // The slot comes after the only class declaration
        assert!(!is_attr_overridden(&tag_attrs, "class", 2));
        // The last id is at index 2
        assert!(is_attr_overridden(&tag_attrs, "id", 2));
        assert!(!is_attr_overridden(&tag_attrs, "id", 3));
        // Never declared statically: always applied
        assert!(!is_attr_overridden(&tag_attrs, "title", 0));
        assert!(!is_attr_overridden(&[], "title", 0));
    }

    #[test]
    fn test_dynamic_class_after_static_wins() {
        let (mut tree, _, host) = setup();
        let parts = vec![attr_part(1, &["class"], 1)];
        let values = vec![attrs(&[("class", "dynamic".into())])];

        parts_to_fiber(&mut tree, &parts, &values, host).unwrap();

        let children = tree.children(host);
        assert_eq!(children.len(), 1);
        let node = attribute_set(&tree, children[0]);
        assert_eq!(node.attributes.get("class"), Some(&AttrValue::from("dynamic")));
    }

    #[test]
    fn test_static_class_after_slot_wins() {
        let (mut tree, _, host) = setup();
        let parts = vec![attr_part(1, &["class"], 0)];
        let values = vec![attrs(&[("class", "dynamic".into()), ("id", "x".into())])];

        parts_to_fiber(&mut tree, &parts, &values, host).unwrap();

        let node = attribute_set(&tree, tree.children(host)[0]);
        assert!(node.attributes.get("class").is_none());
        assert_eq!(node.attributes.get("id"), Some(&AttrValue::from("x")));
    }

    #[test]
    fn test_alias_checked_against_static_name() {
        let (mut tree, _, host) = setup();
        let parts = vec![attr_part(1, &["class"], 0)];
        let values = vec![attrs(&[("className", "dynamic".into())])];

        parts_to_fiber(&mut tree, &parts, &values, host).unwrap();

        let node = attribute_set(&tree, tree.children(host)[0]);
        assert!(node.attributes.is_empty());
    }

    #[test]
    fn test_consecutive_attribute_parts_coalesce() {
        let (mut tree, _, host) = setup();
        let parts = vec![
            attr_part(1, &[], 0),
            attr_part(1, &[], 0),
            node_part(1),
            attr_part(2, &[], 0),
        ];
        let child = Node::text("child");
        let values = vec![
            attrs(&[("a", 1.into()), ("b", 1.into())]),
            attrs(&[("b", 2.into()), ("c", 3.into())]),
            Value::Node(Some(child.clone())),
            attrs(&[("d", 4.into())]),
        ];

        parts_to_fiber(&mut tree, &parts, &values, host).unwrap();

        let children = tree.children(host);
        assert_eq!(children.len(), 3);

        let first = attribute_set(&tree, children[0]);
        let names: Vec<_> = first.attributes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        // The later slot wins for a shared name
        assert_eq!(first.attributes.get("b"), Some(&AttrValue::from(2)));

        let text = tree.fiber(children[1]).unwrap().node.clone().unwrap();
        assert!(Rc::ptr_eq(&text, &child));

        let last = attribute_set(&tree, children[2]);
        assert_eq!(last.attributes.get("d"), Some(&AttrValue::from(4)));
    }

    #[test]
    fn test_reserved_skipped_and_function_ref_captured() {
        let (mut tree, _, host) = setup();
        let callback = Callback::new(|_| {});
        let parts = vec![attr_part(1, &[], 0)];
        let values = vec![attrs(&[
            ("key", "k".into()),
            ("ref", AttrValue::Function(callback.clone())),
            ("title", "t".into()),
        ])];

        parts_to_fiber(&mut tree, &parts, &values, host).unwrap();

        let node = attribute_set(&tree, tree.children(host)[0]);
        assert_eq!(node.node_ref, Some(callback));
        assert!(node.attributes.get("key").is_none());
        assert!(node.attributes.get("ref").is_none());
        assert_eq!(node.attributes.len(), 1);
    }

    #[test]
    fn test_non_function_ref_ignored() {
        let (mut tree, _, host) = setup();
        let parts = vec![attr_part(1, &[], 0)];
        let values = vec![attrs(&[("ref", "not-a-function".into())])];

        parts_to_fiber(&mut tree, &parts, &values, host).unwrap();

        let node = attribute_set(&tree, tree.children(host)[0]);
        assert!(node.node_ref.is_none());
        assert!(node.attributes.is_empty());
    }

    #[test]
    fn test_later_null_ref_clears_earlier_ref() {
        let (mut tree, _, host) = setup();
        let callback = Callback::new(|_| {});
        let parts = vec![attr_part(1, &[], 0), attr_part(1, &[], 0)];
        let values = vec![
            attrs(&[("ref", AttrValue::Function(callback.clone()))]),
            attrs(&[("ref", AttrValue::Null)]),
        ];

        parts_to_fiber(&mut tree, &parts, &values, host).unwrap();

        assert_eq!(tree.children(host).len(), 1);
        let node = attribute_set(&tree, tree.children(host)[0]);
        assert!(node.node_ref.is_none());

        // A function ref in the later slot replaces the earlier one
        let (mut tree, _, host) = setup();
        let later = Callback::new(|_| {});
        let values = vec![
            attrs(&[("ref", AttrValue::Function(callback))]),
            attrs(&[("ref", AttrValue::Function(later.clone()))]),
        ];
        parts_to_fiber(&mut tree, &parts, &values, host).unwrap();
        let node = attribute_set(&tree, tree.children(host)[0]);
        assert_eq!(node.node_ref, Some(later));
    }

    #[test]
    fn test_previous_chain_threaded_per_fiber() {
        let (mut tree, root, host) = setup();
        let parts = vec![attr_part(1, &[], 0), attr_part(1, &[], 0), node_part(1)];
        let values = vec![
            attrs(&[("a", 1.into())]),
            attrs(&[("b", 2.into())]),
            Value::Node(Some(Node::text("one"))),
        ];
        let parent = tree
            .create_and_link(Some(Node::text("parent")), None, None, host, host)
            .unwrap();
        parts_to_fiber(&mut tree, &parts, &values, parent).unwrap();
        let old_children = tree.children(parent);
        tree.promote_wip(root).unwrap();

        let host = tree.begin_pass(root).unwrap();
        let next = tree
            .create_and_link(Some(Node::text("parent")), None, Some(parent), host, host)
            .unwrap();
        let values = vec![
            attrs(&[("a", 5.into())]),
            attrs(&[("b", 6.into())]),
            Value::Node(Some(Node::text("two"))),
        ];
        parts_to_fiber(&mut tree, &parts, &values, next).unwrap();

        let new_children = tree.children(next);
        assert_eq!(new_children.len(), 2);
        for (new, old) in new_children.iter().zip(&old_children) {
            assert_eq!(tree.fiber(*new).unwrap().alternate, Some(*old));
        }
        assert!(tree.pending_tear_down(root).unwrap().is_empty());
    }

    #[test]
    fn test_missing_and_mismatched_values() {
        let (mut tree, _, host) = setup();

        let parts = vec![attr_part(1, &[], 0), node_part(1)];
        let values = vec![attrs(&[])];
        assert_eq!(
            parts_to_fiber(&mut tree, &parts, &values, host),
            Err(ReconcileError::MissingValue { index: 1 })
        );

        let parts = vec![node_part(1)];
        let values = vec![attrs(&[])];
        assert_eq!(
            parts_to_fiber(&mut tree, &parts, &values, host),
            Err(ReconcileError::PartValueMismatch {
                index: 0,
                expected: "node"
            })
        );
    }

    #[test]
    fn test_parts_bound_probe() {
        let (mut tree, _, host) = setup();
        parts_to_fiber(&mut tree, &[], &[], host).unwrap();
        parts_to_fiber(&mut tree, &[], &[], host).unwrap();
        assert_eq!(tree.stats().parts_bound, 2);
    }
}
