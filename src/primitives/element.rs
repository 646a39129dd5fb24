//! Element creation - call-style construction of description nodes.
//!
//! `create_element` is the entry point the declaration layer uses for
//! call-style invocations:
//!
//! - a string element becomes a tag element, usable like a tagged template
//!   with values `[configs, children]`;
//! - a component becomes a component element with `key` and `ref` lifted out
//!   of its props and `children` added to them.
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::{create_element, Attributes, Node};
//!
//! let mut configs = Attributes::new();
//! configs.insert("class".into(), "title".into());
//! let heading = create_element("h1", configs, Some(Node::text("Hello")));
//! ```

use std::rc::Rc;

use crate::types::{Attributes, ComponentElement, ComponentType, Node, NodeRef, Props, TagElement};

/// What `create_element` is invoked with.
#[derive(Debug, Clone)]
pub enum ElementType {
    Tag(String),
    Component(ComponentType),
}

impl From<&str> for ElementType {
    fn from(value: &str) -> Self {
        ElementType::Tag(value.to_string())
    }
}

impl From<String> for ElementType {
    fn from(value: String) -> Self {
        ElementType::Tag(value)
    }
}

impl From<ComponentType> for ElementType {
    fn from(value: ComponentType) -> Self {
        ElementType::Component(value)
    }
}

/// Build a tag element from a tag name.
pub fn create_tag_element(
    element: impl Into<String>,
    configs: Attributes,
    children: Option<NodeRef>,
) -> NodeRef {
    Rc::new(Node::Tag(TagElement::new(element, configs, children)))
}

/// Build a description node from a call-style invocation.
///
/// Refs are only attached to class components; a functional component never
/// receives one directly.
pub fn create_element(
    element: impl Into<ElementType>,
    configs: Attributes,
    children: Option<NodeRef>,
) -> NodeRef {
    let component = match element.into() {
        ElementType::Tag(tag) => return create_tag_element(tag, configs, children),
        ElementType::Component(component) => component,
    };

    let mut attributes = configs;
    let key = attributes.shift_remove("key");
    let node_ref = attributes.shift_remove("ref");

    let props = Props {
        attributes,
        children: children.clone(),
    };

    let node_ref = if component.is_class() { node_ref } else { None };

    Rc::new(Node::Component(ComponentElement {
        component,
        props,
        key,
        node_ref,
        children,
    }))
}
