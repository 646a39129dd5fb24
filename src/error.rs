//! Error types for reconciliation.
//!
//! Every variant is a contract violation by the layer that produced the
//! description nodes or drives the walk. The pass that hits one is abandoned.

use thiserror::Error;

use crate::engine::{FiberId, RootId};

/// Errors surfaced by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A fiber id no longer refers to a live fiber.
    #[error("unknown fiber {0:?}")]
    UnknownFiber(FiberId),

    /// A root id no longer refers to a live root.
    #[error("unknown root {0:?}")]
    UnknownRoot(RootId),

    /// A template part has no corresponding dynamic value.
    #[error("no value for part {index}")]
    MissingValue {
        /// Position of the part in the realized template.
        index: usize,
    },

    /// A dynamic value does not match the kind of its part.
    #[error("value {index} does not fit its part: expected {expected}")]
    PartValueMismatch {
        /// Position of the part in the realized template.
        index: usize,
        /// What the part expected ("attributes" or "node").
        expected: &'static str,
    },

    /// The differ was asked to process a node that has no template.
    #[error("fiber {0:?} does not render a tag or template node")]
    NotTemplated(FiberId),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReconcileError>;
