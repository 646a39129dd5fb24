//! Reconciler configuration.
//!
//! Holds the small attribute tables the part binder consults and the tag
//! name that opens an SVG context. A [`ReconcileConfig`] is owned by each
//! [`FiberTree`](crate::engine::FiberTree).
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::{FiberTree, ReconcileConfig};
//!
//! let config = ReconcileConfig::default()
//!     .with_reserved_attribute("slot")
//!     .with_attribute_alias("xlinkHref", "xlink:href");
//! let tree = FiberTree::with_config(config);
//! ```

use std::collections::{HashMap, HashSet};

/// Default tag name that switches a subtree into SVG mode.
pub const SVG_TAG: &str = "svg";

/// Attribute names the framework reserves for itself.
pub const RESERVED_ATTRIBUTES: [&str; 3] = ["key", "ref", "children"];

/// Prop names that map onto a different static attribute name.
pub const MODIFIED_ATTRIBUTES: [(&str, &str); 5] = [
    ("className", "class"),
    ("htmlFor", "for"),
    ("acceptCharset", "accept-charset"),
    ("httpEquiv", "http-equiv"),
    ("tabIndex", "tabindex"),
];

// =============================================================================
// ReconcileConfig
// =============================================================================

/// Tables and names that parameterize reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Tag name that opens an SVG context for the subtree below it.
    pub svg_tag: String,
    /// Names never copied into a dynamic attribute set.
    pub reserved_attributes: HashSet<String>,
    /// Dynamic prop name -> static attribute name used for override checks.
    pub attribute_aliases: HashMap<String, String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            svg_tag: SVG_TAG.to_string(),
            reserved_attributes: RESERVED_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            attribute_aliases: MODIFIED_ATTRIBUTES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

impl ReconcileConfig {
    /// Replace the SVG root tag name.
    pub fn with_svg_tag(mut self, tag: impl Into<String>) -> Self {
        self.svg_tag = tag.into();
        self
    }

    /// Add a reserved attribute name.
    pub fn with_reserved_attribute(mut self, name: impl Into<String>) -> Self {
        self.reserved_attributes.insert(name.into());
        self
    }

    /// Add (or replace) an attribute alias.
    pub fn with_attribute_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.attribute_aliases.insert(from.into(), to.into());
        self
    }

    /// Check if an attribute name is reserved.
    #[inline]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_attributes.contains(name)
    }

    /// Static attribute name a dynamic prop name is checked against.
    ///
    /// Names without an alias are checked against themselves.
    pub fn static_attribute_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.attribute_aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Check if a tag name opens an SVG context.
    #[inline]
    pub fn is_svg_tag(&self, tag: &str) -> bool {
        self.svg_tag == tag
    }
}
