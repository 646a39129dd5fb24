//! Fiber arena - the persistent render tree.
//!
//! Fibers are records in a [`SlotMap`] keyed by [`FiberId`]. Relations
//! (`child`, `sibling`, `parent`, `alternate`) are plain ids, never owning
//! pointers. `alternate` points from a work-in-progress fiber to the fiber
//! that occupied the same position in the last committed tree; it is only
//! read, never followed for destruction.
//!
//! # Double buffering
//!
//! ```text
//! root.current ──► host ──child──► div ──sibling──► span      (committed)
//!                   ▲               ▲                 ▲
//!                alternate       alternate         alternate
//!                   │               │                 │
//! root.wip ─────► host ──child──► div ──sibling──► span      (in progress)
//! ```
//!
//! Each pass allocates a fresh work-in-progress tree. Committing frees the
//! previous tree; starting another pass first discards an abandoned one.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, trace};

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::state::transition::Transition;
use crate::types::{Attributes, ClassComponent, NodeRef};

use super::template::Part;

new_key_type! {
    /// Key of a fiber in the arena.
    pub struct FiberId;

    /// Key of a fiber root in the arena.
    pub struct RootId;
}

/// Ambient values inherited top-down through the tree.
pub type Context = Rc<Attributes>;

/// Shared handle to a class component instance.
pub type ComponentInstance = Rc<RefCell<Box<dyn ClassComponent>>>;

bitflags! {
    /// Per-fiber state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FiberFlags: u8 {
        /// The fiber renders inside an SVG subtree.
        const SVG_PART = 1 << 0;
        /// The fiber is on its root's pending effect list.
        const EFFECT_LINKED = 1 << 1;
    }
}

// =============================================================================
// Fiber
// =============================================================================

/// One position of the render tree for one pass.
pub struct Fiber {
    pub root: RootId,
    /// Description node rendered here (None renders nothing).
    pub node: Option<NodeRef>,
    /// Slot of the parent's template this fiber fills.
    pub part: Option<Part>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub parent: Option<FiberId>,
    /// Same position in the last committed tree.
    pub alternate: Option<FiberId>,
    pub context: Context,
    pub flags: FiberFlags,
    pub next_effect: Option<FiberId>,
    /// Class component instance, carried across passes.
    pub instance: Option<ComponentInstance>,
}

impl Fiber {
    #[inline]
    pub fn is_svg_part(&self) -> bool {
        self.flags.contains(FiberFlags::SVG_PART)
    }

    pub fn set_svg_part(&mut self, is_svg_part: bool) {
        self.flags.set(FiberFlags::SVG_PART, is_svg_part);
    }
}

// =============================================================================
// Fiber Root
// =============================================================================

/// Mount point of a tree plus the transitions rendering into it.
pub struct FiberRoot {
    /// Top-level description node.
    pub node: Option<NodeRef>,
    /// Host fiber of the committed tree.
    pub current: Option<FiberId>,
    /// Host fiber of the tree being built.
    pub wip: Option<FiberId>,
    /// Context handed to the top of the tree.
    pub context: Context,
    /// Transition the current pass renders under.
    pub current_transition: Option<Rc<Transition>>,
    /// In-flight transitions, in insertion order.
    pub pending_transitions: Vec<Rc<Transition>>,
    first_effect: Option<FiberId>,
    last_effect: Option<FiberId>,
    /// Previous-pass fibers replaced by incompatible nodes.
    tear_down: Vec<FiberId>,
    pass: u64,
}

impl FiberRoot {
    fn new(node: Option<NodeRef>) -> Self {
        Self {
            node,
            current: None,
            wip: None,
            context: Context::default(),
            current_transition: None,
            pending_transitions: Vec::new(),
            first_effect: None,
            last_effect: None,
            tear_down: Vec::new(),
            pass: 0,
        }
    }

    /// Number of passes started on this root.
    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn has_effects(&self) -> bool {
        self.first_effect.is_some()
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Counters describing the work done by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileStats {
    /// Fibers created without a reusable alternate.
    pub fibers_created: usize,
    /// Fibers created on top of a compatible alternate.
    pub fibers_reused: usize,
    /// Template instances realized fresh.
    pub templates_realized: usize,
    /// Template instances carried over from the previous pass.
    pub templates_reused: usize,
    /// Nodes cloned because their cached template belonged elsewhere.
    pub nodes_detached: usize,
    /// Part binder invocations.
    pub parts_bound: usize,
    /// Child chains cloned verbatim.
    pub children_cloned: usize,
    /// Fibers appended to an effect list.
    pub effects_linked: usize,
}

// =============================================================================
// Fiber Tree
// =============================================================================

/// Arena owning every fiber and root.
pub struct FiberTree {
    fibers: SlotMap<FiberId, Fiber>,
    roots: SlotMap<RootId, FiberRoot>,
    config: ReconcileConfig,
    pub(crate) stats: ReconcileStats,
}

impl Default for FiberTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FiberTree {
    /// Create an empty tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ReconcileConfig::default())
    }

    pub fn with_config(config: ReconcileConfig) -> Self {
        Self {
            fibers: SlotMap::with_key(),
            roots: SlotMap::with_key(),
            config,
            stats: ReconcileStats::default(),
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ReconcileStats::default();
    }

    /// Number of live fibers.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(id)
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn fiber(&self, id: FiberId) -> Result<&Fiber> {
        self.fibers.get(id).ok_or(ReconcileError::UnknownFiber(id))
    }

    pub fn fiber_mut(&mut self, id: FiberId) -> Result<&mut Fiber> {
        self.fibers.get_mut(id).ok_or(ReconcileError::UnknownFiber(id))
    }

    pub fn root(&self, id: RootId) -> Result<&FiberRoot> {
        self.roots.get(id).ok_or(ReconcileError::UnknownRoot(id))
    }

    pub fn root_mut(&mut self, id: RootId) -> Result<&mut FiberRoot> {
        self.roots.get_mut(id).ok_or(ReconcileError::UnknownRoot(id))
    }

    /// Child chain of a fiber, in order.
    pub fn children(&self, id: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.fibers.get(id).and_then(|f| f.child);
        while let Some(child) = next {
            out.push(child);
            next = self.fibers.get(child).and_then(|f| f.sibling);
        }
        out
    }

    /// First child of the fiber's alternate (the previous pass's child chain).
    pub fn alternate_child(&self, id: FiberId) -> Result<Option<FiberId>> {
        let alternate = self.fiber(id)?.alternate;
        Ok(alternate
            .and_then(|alt| self.fibers.get(alt))
            .and_then(|alt| alt.child))
    }

    /// All fibers of a subtree in pre-order, starting with `start`.
    pub fn subtree(&self, start: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !self.fibers.contains_key(id) {
                continue;
            }
            out.push(id);
            let children = self.children(id);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    // -------------------------------------------------------------------------
    // Roots
    // -------------------------------------------------------------------------

    /// Create a root that will render `node`.
    pub fn create_root(&mut self, node: Option<NodeRef>) -> RootId {
        self.roots.insert(FiberRoot::new(node))
    }

    /// Replace the top-level node rendered by the next pass.
    pub fn set_root_node(&mut self, root: RootId, node: Option<NodeRef>) -> Result<()> {
        self.root_mut(root)?.node = node;
        Ok(())
    }

    /// Remove a root and every fiber it owns.
    pub fn destroy_root(&mut self, root: RootId) -> Result<()> {
        let state = self.roots.remove(root).ok_or(ReconcileError::UnknownRoot(root))?;
        for host in [state.current, state.wip].into_iter().flatten() {
            self.remove_subtree(host);
        }
        Ok(())
    }

    /// Drop a transition from the root's pending list.
    pub fn retire_transition(&mut self, root: RootId, transition: &Rc<Transition>) -> Result<()> {
        self.root_mut(root)?
            .pending_transitions
            .retain(|t| !Rc::ptr_eq(t, transition));
        Ok(())
    }

    /// Start a new pass: discard any abandoned work-in-progress tree and
    /// create a fresh host fiber mirroring the committed one.
    pub fn begin_pass(&mut self, root: RootId) -> Result<FiberId> {
        let abandoned = self.root(root)?.wip;
        if let Some(host) = abandoned {
            let removed = self.remove_subtree(host);
            debug!(?root, removed, "discarded abandoned work-in-progress tree");
        }

        let state = self.root_mut(root)?;
        state.pass += 1;
        state.first_effect = None;
        state.last_effect = None;
        state.tear_down.clear();
        let pass = state.pass;
        let alternate = state.current;
        let context = state.context.clone();

        let host = self.fibers.insert(Fiber {
            root,
            node: None,
            part: None,
            child: None,
            sibling: None,
            parent: None,
            alternate,
            context,
            flags: FiberFlags::empty(),
            next_effect: None,
            instance: None,
        });
        self.root_mut(root)?.wip = Some(host);
        trace!(?root, pass, ?host, "began pass");
        Ok(host)
    }

    /// Promote the work-in-progress tree to current and free the old tree.
    ///
    /// Returns the number of fibers freed.
    pub fn promote_wip(&mut self, root: RootId) -> Result<usize> {
        let state = self.root_mut(root)?;
        let Some(wip) = state.wip.take() else {
            return Ok(0);
        };
        let old = state.current.replace(wip);
        state.tear_down.clear();

        let mut freed = 0;
        if let Some(old_host) = old {
            freed = self.remove_subtree(old_host);
        }
        for id in self.subtree(wip) {
            if let Some(fiber) = self.fibers.get_mut(id) {
                fiber.alternate = None;
            }
        }
        debug!(?root, freed, "promoted work-in-progress tree");
        Ok(freed)
    }

    /// Remove every fiber of a subtree. Returns the number removed.
    pub fn remove_subtree(&mut self, start: FiberId) -> usize {
        let ids = self.subtree(start);
        let count = ids.len();
        for id in ids {
            self.fibers.remove(id);
        }
        count
    }

    // -------------------------------------------------------------------------
    // Linking
    // -------------------------------------------------------------------------

    /// Create a fiber for `node` and link it after `ref_fiber` under `parent`.
    ///
    /// If `old_fiber` (the previous pass's fiber at this position) rendered a
    /// compatible node it becomes the new fiber's alternate; otherwise it is
    /// scheduled for tear-down and the new fiber starts from scratch.
    /// `ref_fiber == parent` links the new fiber as the parent's first child.
    pub fn create_and_link(
        &mut self,
        node: Option<NodeRef>,
        part: Option<Part>,
        old_fiber: Option<FiberId>,
        ref_fiber: FiberId,
        parent: FiberId,
    ) -> Result<FiberId> {
        let (root, context, parent_flags) = {
            let parent = self.fiber(parent)?;
            (parent.root, parent.context.clone(), parent.flags)
        };
        let reusable = old_fiber
            .and_then(|id| self.fibers.get(id).map(|old| (id, old)))
            .filter(|(_, old)| match (&old.node, &node) {
                (Some(a), Some(b)) => a.same_kind(b),
                (None, None) => true,
                _ => false,
            })
            .map(|(id, old)| (id, old.instance.clone()));

        let (alternate, instance) = match reusable {
            Some((id, instance)) => {
                self.stats.fibers_reused += 1;
                (Some(id), instance)
            }
            None => {
                self.stats.fibers_created += 1;
                if let Some(old) = old_fiber {
                    self.root_mut(root)?.tear_down.push(old);
                }
                (None, None)
            }
        };

        let fiber = self.fibers.insert(Fiber {
            root,
            node,
            part,
            child: None,
            sibling: None,
            parent: Some(parent),
            alternate,
            context,
            flags: parent_flags & FiberFlags::SVG_PART,
            next_effect: None,
            instance,
        });

        self.link(fiber, ref_fiber, parent)?;
        Ok(fiber)
    }

    fn link(&mut self, fiber: FiberId, ref_fiber: FiberId, parent: FiberId) -> Result<()> {
        if ref_fiber == parent {
            self.fiber_mut(parent)?.child = Some(fiber);
        } else {
            self.fiber_mut(ref_fiber)?.sibling = Some(fiber);
        }
        Ok(())
    }

    /// Schedule the previous-pass fibers starting at `old_fiber` (and its
    /// siblings) for tear-down. Used when a new child chain is shorter.
    pub fn tear_down_from(&mut self, old_fiber: Option<FiberId>) -> Result<()> {
        let mut next = old_fiber;
        while let Some(id) = next {
            let fiber = self.fiber(id)?;
            let root = fiber.root;
            next = fiber.sibling;
            self.root_mut(root)?.tear_down.push(id);
        }
        Ok(())
    }

    /// Previous-pass fibers scheduled for removal in the current pass.
    pub fn pending_tear_down(&self, root: RootId) -> Result<&[FiberId]> {
        Ok(&self.root(root)?.tear_down)
    }

    /// Rebuild the fiber's child chain as verbatim copies of its alternate's
    /// children. Used when a node moved without changing.
    pub fn clone_children_fibers(&mut self, fiber: FiberId) -> Result<()> {
        let root = self.fiber(fiber)?.root;
        let mut old_child = self.alternate_child(fiber)?;
        let mut ref_fiber = fiber;

        while let Some(old_id) = old_child {
            let old = self.fiber(old_id)?;
            let clone = Fiber {
                root,
                node: old.node.clone(),
                part: old.part.clone(),
                child: None,
                sibling: None,
                parent: Some(fiber),
                alternate: Some(old_id),
                context: old.context.clone(),
                flags: old.flags & FiberFlags::SVG_PART,
                next_effect: None,
                instance: old.instance.clone(),
            };
            old_child = old.sibling;

            let id = self.fibers.insert(clone);
            self.link(id, ref_fiber, fiber)?;
            ref_fiber = id;
        }

        self.stats.children_cloned += 1;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Effects
    // -------------------------------------------------------------------------

    /// Append a fiber to its root's pending effect list (once per pass).
    pub fn link_effect(&mut self, fiber: FiberId) -> Result<()> {
        let f = self.fiber_mut(fiber)?;
        if f.flags.contains(FiberFlags::EFFECT_LINKED) {
            return Ok(());
        }
        f.flags.insert(FiberFlags::EFFECT_LINKED);
        f.next_effect = None;
        let root = f.root;

        let last = self.root(root)?.last_effect;
        match last {
            Some(last) => self.fiber_mut(last)?.next_effect = Some(fiber),
            None => self.root_mut(root)?.first_effect = Some(fiber),
        }
        self.root_mut(root)?.last_effect = Some(fiber);
        self.stats.effects_linked += 1;
        Ok(())
    }

    /// Drain the root's effect list in link order.
    pub fn take_effects(&mut self, root: RootId) -> Result<Vec<FiberId>> {
        let state = self.root_mut(root)?;
        let mut next = state.first_effect.take();
        state.last_effect = None;

        let mut effects = Vec::new();
        while let Some(id) = next {
            let fiber = self.fiber_mut(id)?;
            next = fiber.next_effect.take();
            fiber.flags.remove(FiberFlags::EFFECT_LINKED);
            effects.push(id);
        }
        Ok(effects)
    }

    /// Take the tear-down list of the current pass.
    pub fn take_tear_down(&mut self, root: RootId) -> Result<Vec<FiberId>> {
        Ok(std::mem::take(&mut self.root_mut(root)?.tear_down))
    }
}

// =============================================================================
// Tests
// =============================================================================
