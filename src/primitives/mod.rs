//! Primitives - Description node building blocks.
//!
//! This module provides the declaration layer's entry points:
//! - [`create_element`] - Tag or component element from a call-style invocation
//! - [`create_tag_element`] - Tag element from a tag name
//!
//! # Architecture
//!
//! Description nodes are immutable and built fresh for every pass. To tell
//! the reconciler a subtree did not change, hand back the same `NodeRef`:
//!
//! ```ignore
//! // Unchanged: same Rc, children fibers are cloned verbatim
//! let header = create_element("header", attrs, None);
//! render(Node::list(vec![header.clone(), body_v2]));
//!
//! // Changed: a fresh node, parts are re-bound
//! render(Node::list(vec![create_element("header", attrs, None), body_v2]));
//! ```

mod element;

pub use element::{create_element, create_tag_element, ElementType};
