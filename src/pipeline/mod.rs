//! Reconciliation Pipeline
//!
//! This module turns description nodes into an updated fiber tree and
//! commits it.
//!
//! # Pipeline Architecture
//!
//! ```text
//! root node → render_pass → process_tag_fiber → parts_to_fiber → commit → EffectApplier
//! ```
//!
//! ## Data Flow
//!
//! 1. **render_pass** - Walks the work-in-progress tree depth-first
//! 2. **process_tag_fiber** - Reuses or realizes the template of a templated node
//! 3. **parts_to_fiber** - Maps the template's parts and values onto child fibers
//! 4. **commit** - Gated on the pass's transition, hands effects to the host
//!
//! ## Key Design Principles
//!
//! - **Immutable descriptions**: nodes are never mutated apart from their
//!   template cache slot
//! - **Identity means unchanged**: the same node at the same position skips
//!   part binding entirely
//! - **Host-agnostic**: realizing templates and applying effects go through
//!   [`TemplateRealizer`](crate::engine::TemplateRealizer) and [`EffectApplier`]

pub mod parts;
pub mod tag_fiber;
pub mod work_loop;

// Re-exports
pub use parts::{attribute_node, is_attr_overridden, parts_to_fiber};
pub use tag_fiber::process_tag_fiber;
pub use work_loop::{
    commit, perform_next_transition, render_pass, render_sync, EffectApplier, PassOutcome,
};
