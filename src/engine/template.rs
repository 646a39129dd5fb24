//! Template realization seam.
//!
//! Turning a static template shape into platform nodes is done by an
//! external [`TemplateRealizer`]. What comes back is a [`RealizedTemplate`]:
//! an opaque structural instance exposing the ordered list of dynamic
//! [`Part`]s the part binder fills.
//!
//! ```text
//! TemplateShape ──realize_template──► RealizedTemplate { parts: [Attr, Attr, Node, ..] }
//! TagElement    ──realize_tag───────► RealizedTemplate { parts: [Attr, Node] }
//! ```

use std::rc::Rc;

use crate::types::{TagElement, TemplateShape};

/// Opaque handle to a platform node owned by the realizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNodeId(pub u64);

// =============================================================================
// Parts
// =============================================================================

/// A dynamic attribute slot on a host node.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePart {
    /// Host node the attributes are applied to.
    pub host: HostNodeId,
    /// Statically declared attribute names of the host, in declaration order.
    pub tag_attrs: Rc<[String]>,
    /// Number of static attributes declared before this slot.
    pub attr_index: usize,
}

/// A dynamic child position.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePart {
    pub parent: Option<HostNodeId>,
    pub previous_sibling: Option<HostNodeId>,
    pub next_sibling: Option<HostNodeId>,
}

/// One dynamic slot inside a realized template.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Attribute(AttributePart),
    Node(NodePart),
}

impl Part {
    #[inline]
    pub fn is_attribute(&self) -> bool {
        matches!(self, Part::Attribute(_))
    }

    #[inline]
    pub fn is_node(&self) -> bool {
        matches!(self, Part::Node(_))
    }

    /// Host node targeted by an attribute part.
    pub fn host(&self) -> Option<HostNodeId> {
        match self {
            Part::Attribute(part) => Some(part.host),
            Part::Node(_) => None,
        }
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// A realized template instance.
pub trait RealizedTemplate {
    /// Ordered dynamic parts.
    fn parts(&self) -> Vec<Part>;

    /// Fill in parent linkage of root-level parts from the part this
    /// template itself occupies (fragments, first/last children).
    fn patch_parts(&self, part: Option<&Part>);
}

/// Produces realized templates.
pub trait TemplateRealizer {
    /// Realize a tagged-template shape.
    fn realize_template(
        &self,
        template: &Rc<TemplateShape>,
        is_svg: bool,
    ) -> Rc<dyn RealizedTemplate>;

    /// Realize a single tag element.
    fn realize_tag(&self, tag: &TagElement, is_svg: bool) -> Rc<dyn RealizedTemplate>;
}
