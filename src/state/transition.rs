//! Transition Tracker - commit eligibility of concurrent render passes.
//!
//! Every render pass runs under a [`Transition`]. Its [`TransitionState`]
//! tells the scheduler whether the pass is worth (re)processing and whether
//! its work-in-progress tree may be committed.
//!
//! ```text
//! Initial ──► Start ──► Suspended ──► Resolved ──► Completed
//!               │           ▲             │
//!               │           └─────────────┘
//!               └──────────────────────────────────► Completed
//!
//! any non-terminal state ──────────────────────────► TimedOut
//! ```
//!
//! Two predefined transitions exist per thread, both fixed at `TimedOut`
//! (always committable):
//! - the synchronous one (empty id) for work outside any transition,
//! - the deferred one (generated id) for deferred work without an explicit
//!   transition context.
//!
//! User transitions ([`start_transition`]) additionally carry a pending flag,
//! published through a signal so loading indicators can observe it.
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::state::transition::*;
//!
//! let transition = start_transition(&mut tree, root)?;
//! assert!(should_process_transition(&transition));
//! assert!(!can_commit_transition(&transition));
//!
//! transition.time_out();
//! assert!(can_commit_transition(&transition));
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use spark_signals::{signal, Signal};
use tracing::{trace, warn};

use crate::engine::{FiberId, FiberRoot, FiberTree, RootId};
use crate::error::Result;

// =============================================================================
// Transition State
// =============================================================================

/// Lifecycle state of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionState {
    #[default]
    Initial,
    Start,
    Suspended,
    Resolved,
    Completed,
    TimedOut,
}

impl TransitionState {
    /// Worth advancing by the scheduler.
    pub const fn should_process(self) -> bool {
        match self {
            TransitionState::Start | TransitionState::Resolved | TransitionState::TimedOut => true,
            TransitionState::Initial | TransitionState::Suspended | TransitionState::Completed => {
                false
            }
        }
    }

    /// Work rendered under this state may be made visible.
    pub const fn can_commit(self) -> bool {
        match self {
            TransitionState::Completed | TransitionState::TimedOut => true,
            TransitionState::Initial
            | TransitionState::Start
            | TransitionState::Suspended
            | TransitionState::Resolved => false,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, TransitionState::Completed | TransitionState::TimedOut)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TransitionState::Initial => "initial",
            TransitionState::Start => "start",
            TransitionState::Suspended => "suspended",
            TransitionState::Resolved => "resolved",
            TransitionState::Completed => "completed",
            TransitionState::TimedOut => "timedOut",
        }
    }
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Transition
// =============================================================================

/// Pending flag of a user transition plus its observable mirror.
pub struct PendingState {
    is_pending: Cell<bool>,
    pending_signal: Signal<bool>,
}

impl PendingState {
    fn new() -> Self {
        Self {
            is_pending: Cell::new(false),
            pending_signal: signal(false),
        }
    }
}

/// Where a transition came from.
pub enum TransitionKind {
    /// Predefined, non-deferred work.
    Sync,
    /// Predefined, deferred work without an explicit transition.
    Deferred,
    /// Created through the user transition API.
    Custom(PendingState),
}

/// A tracked unit of deferred render work.
pub struct Transition {
    id: String,
    state: Cell<TransitionState>,
    kind: TransitionKind,
}

impl Transition {
    fn predefined(id: String, kind: TransitionKind) -> Self {
        Self {
            id,
            state: Cell::new(TransitionState::TimedOut),
            kind,
        }
    }

    /// Create a user transition in the `Initial` state.
    pub fn custom() -> Rc<Self> {
        Rc::new(Self {
            id: next_transition_id(),
            state: Cell::new(TransitionState::Initial),
            kind: TransitionKind::Custom(PendingState::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &TransitionKind {
        &self.kind
    }

    pub fn state(&self) -> TransitionState {
        self.state.get()
    }

    pub fn is_predefined(&self) -> bool {
        !matches!(self.kind, TransitionKind::Custom(_))
    }

    /// Move to a new state. Terminal states are absorbing, so predefined
    /// transitions stay `TimedOut`.
    pub fn set_state(&self, state: TransitionState) {
        if self.is_predefined() {
            warn!(id = %self.id, %state, "ignored state change on predefined transition");
            return;
        }
        let current = self.state();
        if current.is_terminal() && current != state {
            warn!(
                id = %self.id,
                from = %current,
                to = %state,
                "ignored state change on finished transition"
            );
            return;
        }
        trace!(id = %self.id, from = %self.state(), to = %state, "transition state");
        self.state.set(state);
    }

    /// Force the transition committable. `Completed` stays `Completed`.
    pub fn time_out(&self) {
        if !self.state().is_terminal() {
            self.set_state(TransitionState::TimedOut);
        }
    }

    /// Begin the transition: mark it pending and move to `Start`.
    pub fn start(&self) {
        if let TransitionKind::Custom(pending) = &self.kind {
            pending.is_pending.set(true);
            pending.pending_signal.set(true);
        }
        self.set_state(TransitionState::Start);
    }

    pub fn is_pending(&self) -> bool {
        match &self.kind {
            TransitionKind::Custom(pending) => pending.is_pending.get(),
            _ => false,
        }
    }

    /// Clear the internal pending flag.
    pub fn reset_is_pending(&self) {
        if let TransitionKind::Custom(pending) = &self.kind {
            pending.is_pending.set(false);
        }
    }

    /// Publish the pending state to observers.
    pub fn update_pending_state(&self, is_pending: bool) {
        if let TransitionKind::Custom(pending) = &self.kind {
            pending.pending_signal.set(is_pending);
        }
    }

    /// Observable pending state (user transitions only).
    pub fn pending_signal(&self) -> Option<Signal<bool>> {
        match &self.kind {
            TransitionKind::Custom(pending) => Some(pending.pending_signal.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("custom", &!self.is_predefined())
            .field("pending", &self.is_pending())
            .finish()
    }
}

// =============================================================================
// Predefined Transitions
// =============================================================================

thread_local! {
    /// Counter for generating transition ids.
    static TRANSITION_COUNTER: Cell<usize> = const { Cell::new(0) };

    static PREDEFINED_SYNC: Rc<Transition> =
        Rc::new(Transition::predefined(String::new(), TransitionKind::Sync));

    static PREDEFINED_DEFERRED: Rc<Transition> =
        Rc::new(Transition::predefined(next_transition_id(), TransitionKind::Deferred));
}

fn next_transition_id() -> String {
    TRANSITION_COUNTER.with(|counter| {
        let id = counter.get();
        counter.set(id + 1);
        format!("t{}", id)
    })
}

/// The transition non-deferred work renders under.
pub fn predefined_sync_transition() -> Rc<Transition> {
    PREDEFINED_SYNC.with(Rc::clone)
}

/// The transition deferred work renders under when no transition is active.
pub fn predefined_deferred_transition() -> Rc<Transition> {
    PREDEFINED_DEFERRED.with(Rc::clone)
}

// =============================================================================
// Gating Predicates
// =============================================================================

/// Whether the scheduler should advance this transition next.
pub fn should_process_transition(transition: &Transition) -> bool {
    transition.state().should_process()
}

/// Whether a pass rendered under this transition may be committed.
pub fn can_commit_transition(transition: &Transition) -> bool {
    transition.state().can_commit()
}

/// Tell a transition its render pass finished.
///
/// Timed-out and suspended transitions are left alone. A pending transition
/// only has its pending flag cleared (its observers re-render, and the next
/// pass completes it); otherwise the transition becomes `Completed`.
pub fn set_transition_complete(transition: &Transition) {
    match transition.state() {
        TransitionState::TimedOut | TransitionState::Suspended => {}
        _ if transition.is_pending() => {
            transition.reset_is_pending();
            transition.update_pending_state(false);
        }
        _ => transition.set_state(TransitionState::Completed),
    }
}

/// Transition the pass containing `fiber` renders under.
pub fn get_transition_from_fiber(tree: &FiberTree, fiber: FiberId) -> Result<Rc<Transition>> {
    let root = tree.fiber(fiber)?.root;
    Ok(tree
        .root(root)?
        .current_transition
        .clone()
        .unwrap_or_else(predefined_sync_transition))
}

/// First pending transition (insertion order) worth processing.
pub fn get_first_transition_to_process(root: &FiberRoot) -> Option<Rc<Transition>> {
    root.pending_transitions
        .iter()
        .find(|t| should_process_transition(t))
        .cloned()
}

/// Whether the transition came from the user transition API.
pub fn is_custom_transition(transition: &Transition) -> bool {
    matches!(transition.kind, TransitionKind::Custom(_))
}

/// Create a user transition, start it and queue it on the root.
pub fn start_transition(tree: &mut FiberTree, root: RootId) -> Result<Rc<Transition>> {
    let transition = Transition::custom();
    transition.start();
    tree.root_mut(root)?
        .pending_transitions
        .push(transition.clone());
    Ok(transition)
}

// =============================================================================
// Tests
// =============================================================================
