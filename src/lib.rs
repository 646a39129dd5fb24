//! # spark-fiber
//!
//! Fiber reconciliation core for declarative templated UIs.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! observable transition state.
//!
//! ## Architecture
//!
//! Description nodes are immutable values produced once per pass. The
//! reconciler keeps a persistent fiber tree in an arena and, for every pass,
//! builds a work-in-progress tree whose fibers point at the committed fibers
//! they replace (`alternate`). Templated nodes cache their realized template
//! so that a pass only re-binds dynamic values:
//!
//! ```text
//! create_element / Node::template → render_pass → process_tag_fiber → parts_to_fiber
//!                                        │
//!                              transition gates commit → EffectApplier
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Description nodes, attribute values, components
//! - [`engine`] - Fiber arena, parts and the template realizer seam
//! - [`state`] - Transition tracking
//! - [`pipeline`] - Part binder, fiber differ and the work loop
//! - [`primitives`] - `create_element`
//! - [`config`] - Reconciliation configuration
//! - [`error`] - Error type

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod primitives;
pub mod state;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use types::*;

pub use config::ReconcileConfig;
pub use error::{ReconcileError, Result};

pub use engine::{
    AttributePart, Fiber, FiberFlags, FiberId, FiberRoot, FiberTree, HostNodeId, NodePart, Part,
    RealizedTemplate, ReconcileStats, RootId, TemplateRealizer,
};

pub use pipeline::{
    attribute_node, commit, is_attr_overridden, parts_to_fiber, perform_next_transition,
    process_tag_fiber, render_pass, render_sync, EffectApplier, PassOutcome,
};

pub use primitives::{create_element, create_tag_element, ElementType};

pub use state::{
    can_commit_transition, get_first_transition_to_process, get_transition_from_fiber,
    is_custom_transition, predefined_deferred_transition, predefined_sync_transition,
    set_transition_complete, should_process_transition, start_transition, Transition,
    TransitionKind, TransitionState,
};
