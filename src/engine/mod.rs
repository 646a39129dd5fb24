//! Fiber Engine - the persistent render tree and its collaborator seams.
//!
//! - Fiber: arena of fibers and roots, link/clone/effect primitives
//! - Template: parts and the template realizer traits
//!
//! # Architecture
//!
//! Fibers are NOT owned by their parents. They live in one arena and refer
//! to each other by id:
//!
//! ```text
//! FiberId(0): host (child=1)
//! FiberId(1): div  (parent=0, child=2, alternate=..)
//! FiberId(2): attr (parent=1, sibling=3)
//! FiberId(3): text (parent=1)
//! ```
//!
//! Removing a subtree is a walk over ids; `alternate` never keeps anything alive.

mod fiber;
mod template;

pub use fiber::*;
pub use template::*;
