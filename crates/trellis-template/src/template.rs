use std::fmt;
use std::sync::Arc;

use ulid::Ulid;

use crate::node::{Attribute, Node};

/// Identity of one template description instance.
///
/// Two descriptions built from textually identical sources still get
/// different ids; compatibility between renders is decided by identity only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TemplateId(Ulid);

impl TemplateId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by [`Template::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The root node is neither `root` nor `element`.
    InvalidRoot { kind: &'static str },
    /// A `parts` attribute without any literal string.
    EmptyParts { name: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::InvalidRoot { kind } => {
                write!(f, "template root must be a root or element node, found {kind}")
            }
            TemplateError::EmptyParts { name } => {
                write!(f, "attribute `{name}` has parts but no literal strings")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Immutable, validated template description.
///
/// Always handled as `Arc<Template>`; engines compare descriptions with
/// [`Template::same`] (pointer identity), never structurally.
#[derive(Debug)]
pub struct Template {
    id: TemplateId,
    root: Node,
    dynamic_count: usize,
}

impl Template {
    pub fn new(root: Node) -> Result<Arc<Self>, TemplateError> {
        match &root {
            Node::Root { .. } | Node::Element { .. } => {}
            Node::Text { .. } => return Err(TemplateError::InvalidRoot { kind: "text" }),
            Node::ChildSlot => return Err(TemplateError::InvalidRoot { kind: "child-slot" }),
            Node::NullSlot => return Err(TemplateError::InvalidRoot { kind: "null-slot" }),
        }
        validate(&root)?;
        let dynamic_count = root.dynamic_count();
        Ok(Arc::new(Self {
            id: TemplateId::new(),
            root,
            dynamic_count,
        }))
    }

    pub fn id(&self) -> TemplateId {
        self.id
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Length of the values array every render of this template must supply.
    pub fn dynamic_count(&self) -> usize {
        self.dynamic_count
    }

    pub fn same(a: &Arc<Template>, b: &Arc<Template>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

fn validate(node: &Node) -> Result<(), TemplateError> {
    if let Node::Element { attributes, .. } = node {
        for attribute in attributes {
            if let Attribute::Parts { name, strings } = attribute {
                if strings.is_empty() {
                    return Err(TemplateError::EmptyParts { name: name.clone() });
                }
            }
        }
    }
    node.children().iter().try_for_each(validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_leaf_roots() {
        assert_eq!(
            Template::new(Node::text("x")).unwrap_err(),
            TemplateError::InvalidRoot { kind: "text" }
        );
        assert!(Template::new(Node::child_slot()).is_err());
    }

    #[test]
    fn rejects_empty_parts_deep_in_tree() {
        let root = Node::root([Node::element("ul").with_child(
            Node::element("li").with_attribute(Attribute::Parts {
                name: "class".into(),
                strings: vec![],
            }),
        )]);
        assert_eq!(
            Template::new(root).unwrap_err(),
            TemplateError::EmptyParts { name: "class".into() }
        );
    }

    #[test]
    fn identical_sources_are_distinct_templates() {
        let a = Template::new(Node::element("div")).unwrap();
        let b = Template::new(Node::element("div")).unwrap();
        assert_eq!(a.root(), b.root());
        assert!(!Template::same(&a, &b));
        assert_ne!(a.id(), b.id());
        assert!(Template::same(&a, &a.clone()));
    }
}
