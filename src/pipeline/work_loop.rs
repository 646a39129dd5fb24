//! Work Loop - render passes and commit.
//!
//! A pass builds a work-in-progress tree against the committed one, walking
//! it depth-first and dispatching on each fiber's node:
//!
//! ```text
//! Tag / Template   -> process_tag_fiber (template reuse + part binding)
//! Component        -> render, link the single child
//! List             -> positional children
//! Attribute / Text -> effect when the value changed
//! ```
//!
//! Committing is gated on the pass's transition. A committable pass hands
//! its tear-down list and effect list to an [`EffectApplier`], promotes the
//! work-in-progress tree and frees the replaced one. A pass that may not
//! commit yet keeps its work-in-progress tree until the transition allows
//! it, or until the next pass discards it.
//!
//! # Example
//!
//! ```ignore
//! let root = tree.create_root(Some(app()));
//! render_sync(&mut tree, root, &realizer, &mut applier)?;
//!
//! let transition = start_transition(&mut tree, root)?;
//! tree.set_root_node(root, Some(app_v2()))?;
//! while let Some(outcome) = perform_next_transition(&mut tree, root, &realizer, &mut applier)? {
//!     if outcome.is_committed() {
//!         break;
//!     }
//! }
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, debug_span, trace};

use crate::engine::{ComponentInstance, FiberId, FiberTree, RootId, TemplateRealizer};
use crate::error::Result;
use crate::state::transition::{
    can_commit_transition, get_first_transition_to_process, is_custom_transition,
    predefined_sync_transition, set_transition_complete, Transition,
};
use crate::types::{ComponentElement, ComponentType, Node, NodeRef};

use super::tag_fiber::process_tag_fiber;

// =============================================================================
// Effect Applier
// =============================================================================

/// Host side of a commit: makes fiber changes visible.
pub trait EffectApplier {
    /// Apply a fiber whose rendered output changed in this pass.
    fn apply(&mut self, tree: &FiberTree, fiber: FiberId) -> Result<()>;

    /// Remove a previous-pass fiber replaced by an incompatible node.
    fn remove(&mut self, tree: &FiberTree, fiber: FiberId) -> Result<()>;
}

/// Result of trying to commit a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The work-in-progress tree became current.
    Committed { effects: usize, removed: usize },
    /// The transition does not allow a commit yet; the pass is kept.
    Deferred,
    /// No work-in-progress tree to commit.
    Idle,
}

impl PassOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, PassOutcome::Committed { .. })
    }
}

// =============================================================================
// Render
// =============================================================================

/// Build a work-in-progress tree for the root's node under `transition`.
///
/// Returns the host fiber of the new tree.
pub fn render_pass(
    tree: &mut FiberTree,
    root: RootId,
    realizer: &dyn TemplateRealizer,
    transition: Rc<Transition>,
) -> Result<FiberId> {
    let _span = debug_span!("render_pass", ?root, transition = %transition.id()).entered();

    tree.root_mut(root)?.current_transition = Some(transition.clone());
    let host = tree.begin_pass(root)?;

    let node = tree.root(root)?.node.clone();
    let old_child = tree.alternate_child(host)?;
    match node {
        Some(node) => {
            tree.create_and_link(Some(node), None, old_child, host, host)?;
        }
        None => tree.tear_down_from(old_child)?,
    }

    let mut units = 0usize;
    let mut next = tree.fiber(host)?.child;
    while let Some(fiber) = next {
        perform_unit_of_work(tree, fiber, realizer)?;
        units += 1;
        next = next_fiber(tree, fiber, host)?;
    }

    set_transition_complete(&transition);
    debug!(?root, units, state = %transition.state(), "render pass finished");
    Ok(host)
}

/// Depth-first successor of `fiber`, staying inside `host`'s tree.
fn next_fiber(tree: &FiberTree, fiber: FiberId, host: FiberId) -> Result<Option<FiberId>> {
    if let Some(child) = tree.fiber(fiber)?.child {
        return Ok(Some(child));
    }

    let mut current = fiber;
    while current != host {
        let f = tree.fiber(current)?;
        if let Some(sibling) = f.sibling {
            return Ok(Some(sibling));
        }
        match f.parent {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(None)
}

fn perform_unit_of_work(
    tree: &mut FiberTree,
    fiber: FiberId,
    realizer: &dyn TemplateRealizer,
) -> Result<()> {
    let Some(node) = tree.fiber(fiber)?.node.clone() else {
        return Ok(());
    };

    match &*node {
        Node::Tag(_) | Node::Template(_) => process_tag_fiber(tree, fiber, realizer),
        Node::Component(element) => update_component(tree, fiber, &node, element),
        Node::List(items) => update_list(tree, fiber, &node, items),
        Node::Attribute(_) | Node::Text(_) => update_leaf(tree, fiber, &node),
    }
}

/// Node rendered by the fiber's alternate, if any.
fn alternate_node(tree: &FiberTree, fiber: FiberId) -> Result<Option<NodeRef>> {
    let alternate = tree.fiber(fiber)?.alternate;
    Ok(alternate
        .and_then(|alternate| tree.fiber(alternate).ok())
        .and_then(|alternate| alternate.node.clone()))
}

fn is_unchanged(tree: &FiberTree, fiber: FiberId, node: &NodeRef) -> Result<bool> {
    Ok(alternate_node(tree, fiber)?.is_some_and(|old| Rc::ptr_eq(&old, node)))
}

fn update_component(
    tree: &mut FiberTree,
    fiber: FiberId,
    node: &NodeRef,
    element: &ComponentElement,
) -> Result<()> {
    if is_unchanged(tree, fiber, node)? {
        return tree.clone_children_fibers(fiber);
    }

    let rendered = match &element.component {
        ComponentType::Functional { render, .. } => (**render)(&element.props),
        ComponentType::Class { create, .. } => {
            let existing = tree.fiber(fiber)?.instance.clone();
            let instance = match existing {
                Some(instance) => instance,
                None => {
                    let instance: ComponentInstance =
                        Rc::new(RefCell::new((**create)(&element.props)));
                    tree.fiber_mut(fiber)?.instance = Some(instance.clone());
                    instance
                }
            };
            instance.borrow_mut().render(&element.props)
        }
    };
    trace!(?fiber, component = element.component.name(), "rendered component");

    // The component occupies its parent's slot; so does what it renders
    let part = tree.fiber(fiber)?.part.clone();
    let old_child = tree.alternate_child(fiber)?;
    tree.create_and_link(rendered, part, old_child, fiber, fiber)?;

    let rest = match old_child {
        Some(id) => tree.fiber(id)?.sibling,
        None => None,
    };
    tree.tear_down_from(rest)
}

fn update_list(
    tree: &mut FiberTree,
    fiber: FiberId,
    node: &NodeRef,
    items: &[NodeRef],
) -> Result<()> {
    if is_unchanged(tree, fiber, node)? {
        return tree.clone_children_fibers(fiber);
    }

    let part = tree.fiber(fiber)?.part.clone();
    let mut ref_fiber = fiber;
    let mut old_child = tree.alternate_child(fiber)?;
    for item in items {
        let next_old = match old_child {
            Some(id) => tree.fiber(id)?.sibling,
            None => None,
        };
        ref_fiber =
            tree.create_and_link(Some(item.clone()), part.clone(), old_child, ref_fiber, fiber)?;
        old_child = next_old;
    }
    tree.tear_down_from(old_child)
}

fn update_leaf(tree: &mut FiberTree, fiber: FiberId, node: &NodeRef) -> Result<()> {
    let unchanged = alternate_node(tree, fiber)?.is_some_and(|old| *old == **node);
    if unchanged {
        return Ok(());
    }
    tree.link_effect(fiber)
}

// =============================================================================
// Commit
// =============================================================================

/// Commit the root's work-in-progress tree if its transition allows it.
pub fn commit(
    tree: &mut FiberTree,
    root: RootId,
    applier: &mut dyn EffectApplier,
) -> Result<PassOutcome> {
    let state = tree.root(root)?;
    if state.wip.is_none() {
        return Ok(PassOutcome::Idle);
    }
    let transition = state
        .current_transition
        .clone()
        .unwrap_or_else(predefined_sync_transition);

    if !can_commit_transition(&transition) {
        debug!(
            ?root,
            transition = %transition.id(),
            state = %transition.state(),
            "commit deferred"
        );
        return Ok(PassOutcome::Deferred);
    }

    let removed = tree.take_tear_down(root)?;
    for fiber in &removed {
        applier.remove(tree, *fiber)?;
    }
    let effects = tree.take_effects(root)?;
    for fiber in &effects {
        applier.apply(tree, *fiber)?;
    }

    let freed = tree.promote_wip(root)?;
    tree.root_mut(root)?.current_transition = None;
    if is_custom_transition(&transition) {
        // A transition committed by timing out never had its pending flag cleared
        if transition.is_pending() {
            transition.reset_is_pending();
            transition.update_pending_state(false);
        }
        tree.retire_transition(root, &transition)?;
    }

    debug!(
        ?root,
        transition = %transition.id(),
        effects = effects.len(),
        removed = removed.len(),
        freed,
        "committed"
    );
    Ok(PassOutcome::Committed {
        effects: effects.len(),
        removed: removed.len(),
    })
}

// =============================================================================
// Scheduling
// =============================================================================

/// Render and try to commit the first pending transition worth processing.
///
/// Returns None when no transition needs work.
pub fn perform_next_transition(
    tree: &mut FiberTree,
    root: RootId,
    realizer: &dyn TemplateRealizer,
    applier: &mut dyn EffectApplier,
) -> Result<Option<PassOutcome>> {
    let Some(transition) = get_first_transition_to_process(tree.root(root)?) else {
        return Ok(None);
    };
    render_pass(tree, root, realizer, transition)?;
    commit(tree, root, applier).map(Some)
}

/// Render and commit under the synchronous transition.
pub fn render_sync(
    tree: &mut FiberTree,
    root: RootId,
    realizer: &dyn TemplateRealizer,
    applier: &mut dyn EffectApplier,
) -> Result<PassOutcome> {
    render_pass(tree, root, realizer, predefined_sync_transition())?;
    commit(tree, root, applier)
}

// =============================================================================
// Tests
// =============================================================================
