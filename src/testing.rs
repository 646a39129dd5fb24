//! Test doubles for the realizer and applier collaborators.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::engine::{
    AttributePart, FiberId, FiberTree, HostNodeId, NodePart, Part, RealizedTemplate,
    TemplateRealizer,
};
use crate::error::Result;
use crate::pipeline::EffectApplier;
use crate::types::{TagElement, TemplateShape};

/// Declarative description of one part of a fake template.
#[derive(Debug, Clone)]
pub enum PartSpec {
    /// Attribute slot on the template's `host`-th element.
    Attr {
        host: usize,
        tag_attrs: Vec<&'static str>,
        attr_index: usize,
    },
    /// Child slot under the template's `host`-th element.
    Node { host: usize },
    /// Root-level child slot (its parent is only known once patched).
    RootNode,
}

/// Realized template handed out by [`FakeRealizer`].
pub struct FakeTemplate {
    pub label: String,
    pub is_svg: bool,
    parts: RefCell<Vec<Part>>,
    pub patched: Cell<usize>,
}

impl RealizedTemplate for FakeTemplate {
    fn parts(&self) -> Vec<Part> {
        self.parts.borrow().clone()
    }

    fn patch_parts(&self, part: Option<&Part>) {
        self.patched.set(self.patched.get() + 1);
        let Some(Part::Node(outer)) = part else {
            return;
        };
        for part in self.parts.borrow_mut().iter_mut() {
            if let Part::Node(inner) = part {
                if inner.parent.is_none() {
                    inner.parent = outer.parent;
                }
            }
        }
    }
}

/// Realizer producing [`FakeTemplate`]s with fresh host ids per instance.
#[derive(Default)]
pub struct FakeRealizer {
    shapes: RefCell<Vec<(Rc<TemplateShape>, Vec<PartSpec>)>>,
    next_host: Cell<u64>,
    pub realized: RefCell<Vec<Rc<FakeTemplate>>>,
}

impl FakeRealizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template shape and the parts it realizes to.
    pub fn shape(&self, strings: &[&str], parts: Vec<PartSpec>) -> Rc<TemplateShape> {
        let shape = TemplateShape::new(strings.iter().copied());
        self.shapes.borrow_mut().push((shape.clone(), parts));
        shape
    }

    pub fn realize_count(&self) -> usize {
        self.realized.borrow().len()
    }

    fn alloc_host(&self) -> HostNodeId {
        let id = self.next_host.get() + 1;
        self.next_host.set(id);
        HostNodeId(id)
    }

    fn finish(&self, label: String, is_svg: bool, parts: Vec<Part>) -> Rc<dyn RealizedTemplate> {
        let template = Rc::new(FakeTemplate {
            label,
            is_svg,
            parts: RefCell::new(parts),
            patched: Cell::new(0),
        });
        self.realized.borrow_mut().push(template.clone());
        template
    }
}

impl TemplateRealizer for FakeRealizer {
    fn realize_template(
        &self,
        template: &Rc<TemplateShape>,
        is_svg: bool,
    ) -> Rc<dyn RealizedTemplate> {
        let specs = self
            .shapes
            .borrow()
            .iter()
            .find(|(shape, _)| Rc::ptr_eq(shape, template))
            .map(|(_, specs)| specs.clone())
            .unwrap_or_default();

        let host_count = specs
            .iter()
            .filter_map(|spec| match spec {
                PartSpec::Attr { host, .. } | PartSpec::Node { host } => Some(host + 1),
                PartSpec::RootNode => None,
            })
            .max()
            .unwrap_or(0);
        let hosts: Vec<HostNodeId> = (0..host_count).map(|_| self.alloc_host()).collect();

        let parts = specs
            .into_iter()
            .map(|spec| match spec {
                PartSpec::Attr {
                    host,
                    tag_attrs,
                    attr_index,
                } => Part::Attribute(AttributePart {
                    host: hosts[host],
                    tag_attrs: tag_attrs.iter().map(|s| s.to_string()).collect(),
                    attr_index,
                }),
                PartSpec::Node { host } => Part::Node(NodePart {
                    parent: Some(hosts[host]),
                    previous_sibling: None,
                    next_sibling: None,
                }),
                PartSpec::RootNode => Part::Node(NodePart {
                    parent: None,
                    previous_sibling: None,
                    next_sibling: None,
                }),
            })
            .collect();

        self.finish(template.strings.join("${}"), is_svg, parts)
    }

    fn realize_tag(&self, tag: &TagElement, is_svg: bool) -> Rc<dyn RealizedTemplate> {
        let host = self.alloc_host();
        let parts = vec![
            Part::Attribute(AttributePart {
                host,
                tag_attrs: Rc::from(Vec::<String>::new()),
                attr_index: 0,
            }),
            Part::Node(NodePart {
                parent: Some(host),
                previous_sibling: None,
                next_sibling: None,
            }),
        ];
        self.finish(tag.element.clone(), is_svg, parts)
    }
}

/// Applier that records what it was asked to do.
#[derive(Default)]
pub struct RecordingApplier {
    pub applied: Vec<FiberId>,
    pub removed: Vec<FiberId>,
}

impl EffectApplier for RecordingApplier {
    fn apply(&mut self, _tree: &FiberTree, fiber: FiberId) -> Result<()> {
        self.applied.push(fiber);
        Ok(())
    }

    fn remove(&mut self, _tree: &FiberTree, fiber: FiberId) -> Result<()> {
        self.removed.push(fiber);
        Ok(())
    }
}
