//! Core types for spark-fiber.
//!
//! These are the immutable description nodes the declaration layer produces
//! once per render pass and the fiber walker consumes. They are shared as
//! [`NodeRef`] (`Rc<Node>`): node identity (`Rc::ptr_eq`) is meaningful, since
//! an unchanged subtree is signalled by handing back the very same node.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::engine::RealizedTemplate;

/// Shared handle to a description node.
pub type NodeRef = Rc<Node>;

/// Ordered attribute set (declaration order is preserved).
pub type Attributes = IndexMap<String, AttrValue>;

// =============================================================================
// Attribute Values
// =============================================================================

/// A function-valued attribute (event handler or ref callback).
///
/// Equality is identity: two callbacks are equal only if they share the same
/// closure allocation.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&dyn Any)>);

impl Callback {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&dyn Any) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback with an arbitrary argument.
    pub fn call(&self, arg: &dyn Any) {
        (self.0)(arg)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// Value of a single attribute or prop.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttrValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Function(Callback),
}

impl AttrValue {
    /// Get the callback if this value is function-valued.
    pub fn as_function(&self) -> Option<&Callback> {
        match self {
            AttrValue::Function(cb) => Some(cb),
            _ => None,
        }
    }

    /// Get the string if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Number(value as f64)
    }
}

impl From<Callback> for AttrValue {
    fn from(value: Callback) -> Self {
        AttrValue::Function(value)
    }
}

// =============================================================================
// Dynamic Values
// =============================================================================

/// One dynamic expression value of a template, aligned with its part.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Attribute map spread onto a host node.
    Attributes(Attributes),
    /// Child node (None renders nothing).
    Node(Option<NodeRef>),
}

impl Value {
    /// Attribute map, if this value fills an attribute slot.
    pub fn as_attributes(&self) -> Option<&Attributes> {
        match self {
            Value::Attributes(attrs) => Some(attrs),
            Value::Node(_) => None,
        }
    }

    /// Child node, if this value fills a child slot.
    pub fn as_node(&self) -> Option<&Option<NodeRef>> {
        match self {
            Value::Node(node) => Some(node),
            Value::Attributes(_) => None,
        }
    }
}

impl From<Attributes> for Value {
    fn from(value: Attributes) -> Self {
        Value::Attributes(value)
    }
}

impl From<NodeRef> for Value {
    fn from(value: NodeRef) -> Self {
        Value::Node(Some(value))
    }
}

impl From<Option<NodeRef>> for Value {
    fn from(value: Option<NodeRef>) -> Self {
        Value::Node(value)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Static structure of a tagged template (its literal string segments).
///
/// Identity is the allocation: two templates are the same shape only if they
/// are the same `Rc<TemplateShape>`.
#[derive(Debug, PartialEq, Eq)]
pub struct TemplateShape {
    pub strings: Vec<String>,
}

impl TemplateShape {
    pub fn new<S: Into<String>>(strings: impl IntoIterator<Item = S>) -> Rc<Self> {
        Rc::new(Self {
            strings: strings.into_iter().map(Into::into).collect(),
        })
    }
}

/// Static template identity of a templated node.
#[derive(Debug, Clone, Copy)]
pub enum TemplateKey<'a> {
    Shape(&'a Rc<TemplateShape>),
    Tag(&'a str),
}

impl PartialEq for TemplateKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TemplateKey::Shape(a), TemplateKey::Shape(b)) => Rc::ptr_eq(a, b),
            (TemplateKey::Tag(a), TemplateKey::Tag(b)) => a == b,
            _ => false,
        }
    }
}

/// Cache slot for a node's realized template instance.
#[derive(Default)]
pub struct TemplateSlot(RefCell<Option<Rc<dyn RealizedTemplate>>>);

impl TemplateSlot {
    pub fn get(&self) -> Option<Rc<dyn RealizedTemplate>> {
        self.0.borrow().clone()
    }

    pub fn set(&self, template: Option<Rc<dyn RealizedTemplate>>) {
        *self.0.borrow_mut() = template;
    }

    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }
}

impl fmt::Debug for TemplateSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_set() { "TemplateSlot(set)" } else { "TemplateSlot(empty)" })
    }
}

// =============================================================================
// Components
// =============================================================================

/// Props handed to a component's render function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Props {
    pub attributes: Attributes,
    pub children: Option<NodeRef>,
}

impl Props {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }
}

/// Render function of a functional component.
pub type RenderFn = Rc<dyn Fn(&Props) -> Option<NodeRef>>;

/// A stateful component instance. Survives across passes at its position.
pub trait ClassComponent {
    fn render(&mut self, props: &Props) -> Option<NodeRef>;
}

/// Factory creating a class component instance on first mount.
pub type ClassFactory = Rc<dyn Fn(&Props) -> Box<dyn ClassComponent>>;

/// The type of a component element.
#[derive(Clone)]
pub enum ComponentType {
    Functional { name: &'static str, render: RenderFn },
    Class { name: &'static str, create: ClassFactory },
}

impl ComponentType {
    /// Create a functional component type.
    pub fn functional(
        name: &'static str,
        render: impl Fn(&Props) -> Option<NodeRef> + 'static,
    ) -> Self {
        ComponentType::Functional {
            name,
            render: Rc::new(render),
        }
    }

    /// Create a class component type.
    pub fn class(
        name: &'static str,
        create: impl Fn(&Props) -> Box<dyn ClassComponent> + 'static,
    ) -> Self {
        ComponentType::Class {
            name,
            create: Rc::new(create),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComponentType::Functional { name, .. } | ComponentType::Class { name, .. } => name,
        }
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self, ComponentType::Class { .. })
    }

    /// Same component type (identity of the render function / factory).
    pub fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ComponentType::Functional { render: a, .. },
                ComponentType::Functional { render: b, .. },
            ) => Rc::ptr_eq(a, b),
            (ComponentType::Class { create: a, .. }, ComponentType::Class { create: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_class() { "Class" } else { "Functional" };
        write!(f, "{}({})", kind, self.name())
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other)
    }
}

// =============================================================================
// Description Nodes
// =============================================================================

/// A native tag created through `create_element("div", ..)`.
///
/// `values` is always `[configs, children]`.
#[derive(Debug)]
pub struct TagElement {
    pub element: String,
    pub values: Vec<Value>,
    pub template_node: TemplateSlot,
}

impl TagElement {
    pub fn new(element: impl Into<String>, configs: Attributes, children: Option<NodeRef>) -> Self {
        Self {
            element: element.into(),
            values: vec![Value::Attributes(configs), Value::Node(children)],
            template_node: TemplateSlot::default(),
        }
    }

    pub fn configs(&self) -> Option<&Attributes> {
        self.values.first().and_then(Value::as_attributes)
    }

    pub fn children(&self) -> Option<&NodeRef> {
        self.values.get(1).and_then(Value::as_node).and_then(Option::as_ref)
    }
}

/// A tagged-template instance: static shape plus its dynamic values.
#[derive(Debug)]
pub struct TemplateElement {
    pub template: Rc<TemplateShape>,
    pub values: Vec<Value>,
    pub template_node: TemplateSlot,
}

impl TemplateElement {
    pub fn new(template: Rc<TemplateShape>, values: Vec<Value>) -> Self {
        Self {
            template,
            values,
            template_node: TemplateSlot::default(),
        }
    }
}

/// A component invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentElement {
    pub component: ComponentType,
    pub props: Props,
    pub key: Option<AttrValue>,
    /// Only ever set for class components.
    pub node_ref: Option<AttrValue>,
    pub children: Option<NodeRef>,
}

/// Coalesced dynamic attributes of one host node, synthesized by the part binder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeNode {
    pub attributes: Attributes,
    pub node_ref: Option<Callback>,
}

/// Kind of a description node, used to decide fiber compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Tag,
    Template,
    Component,
    Attribute,
    Text,
    List,
}

/// An immutable description node.
#[derive(Debug)]
pub enum Node {
    Tag(TagElement),
    Template(TemplateElement),
    Component(ComponentElement),
    Attribute(AttributeNode),
    Text(String),
    List(Vec<NodeRef>),
}

impl Node {
    /// Shorthand for a tagged-template node.
    pub fn template(template: Rc<TemplateShape>, values: Vec<Value>) -> NodeRef {
        Rc::new(Node::Template(TemplateElement::new(template, values)))
    }

    pub fn text(text: impl Into<String>) -> NodeRef {
        Rc::new(Node::Text(text.into()))
    }

    pub fn list(items: Vec<NodeRef>) -> NodeRef {
        Rc::new(Node::List(items))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Tag(_) => NodeKind::Tag,
            Node::Template(_) => NodeKind::Template,
            Node::Component(_) => NodeKind::Component,
            Node::Attribute(_) => NodeKind::Attribute,
            Node::Text(_) => NodeKind::Text,
            Node::List(_) => NodeKind::List,
        }
    }

    /// True for nodes that are realized through a template (tags and templates).
    #[inline]
    pub fn is_templated(&self) -> bool {
        matches!(self, Node::Tag(_) | Node::Template(_))
    }

    pub fn tag_name(&self) -> Option<&str> {
        match self {
            Node::Tag(tag) => Some(&tag.element),
            _ => None,
        }
    }

    pub fn template_key(&self) -> Option<TemplateKey<'_>> {
        match self {
            Node::Tag(tag) => Some(TemplateKey::Tag(&tag.element)),
            Node::Template(tpl) => Some(TemplateKey::Shape(&tpl.template)),
            _ => None,
        }
    }

    pub fn template_slot(&self) -> Option<&TemplateSlot> {
        match self {
            Node::Tag(tag) => Some(&tag.template_node),
            Node::Template(tpl) => Some(&tpl.template_node),
            _ => None,
        }
    }

    /// Dynamic values of a templated node (empty for everything else).
    pub fn values(&self) -> &[Value] {
        match self {
            Node::Tag(tag) => &tag.values,
            Node::Template(tpl) => &tpl.values,
            _ => &[],
        }
    }

    /// Copy of a templated node with an empty template slot.
    ///
    /// Returns None for nodes that carry no template slot.
    pub fn detached(&self) -> Option<Node> {
        match self {
            Node::Tag(tag) => Some(Node::Tag(TagElement {
                element: tag.element.clone(),
                values: tag.values.clone(),
                template_node: TemplateSlot::default(),
            })),
            Node::Template(tpl) => Some(Node::Template(TemplateElement {
                template: tpl.template.clone(),
                values: tpl.values.clone(),
                template_node: TemplateSlot::default(),
            })),
            _ => None,
        }
    }

    /// Whether a fiber that rendered `self` can be reused to render `other`.
    pub fn same_kind(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Tag(a), Node::Tag(b)) => a.element == b.element,
            (Node::Template(a), Node::Template(b)) => Rc::ptr_eq(&a.template, &b.template),
            (Node::Component(a), Node::Component(b)) => {
                a.component.same_type(&b.component) && a.key == b.key
            }
            (a, b) => a.kind() == b.kind(),
        }
    }
}

impl PartialEq for TagElement {
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element && self.values == other.values
    }
}

impl PartialEq for TemplateElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.template, &other.template) && self.values == other.values
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Tag(a), Node::Tag(b)) => a == b,
            (Node::Template(a), Node::Template(b)) => a == b,
            (Node::Component(a), Node::Component(b)) => a == b,
            (Node::Attribute(a), Node::Attribute(b)) => a == b,
            (Node::Text(a), Node::Text(b)) => a == b,
            (Node::List(a), Node::List(b)) => a == b,
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
