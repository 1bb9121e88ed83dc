use serde::{Deserialize, Serialize};

/// One node of a template description.
///
/// Serialized with an internal `kind` tag:
///
/// ```json
/// { "kind": "element", "tag": { "static": "div" }, "attributes": [], "children": [
///     { "kind": "text", "text": "Hello " },
///     { "kind": "child-slot" }
/// ] }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Node {
    /// Fragment root holding several top-level nodes.
    Root {
        #[serde(default)]
        children: Vec<Node>,
    },
    Element {
        tag: Tag,
        #[serde(default)]
        attributes: Vec<Attribute>,
        #[serde(default)]
        children: Vec<Node>,
    },
    /// Literal text.
    Text { text: String },
    /// Dynamic child content (text, nested template, collection, custom slot).
    ChildSlot,
    /// Dynamic value in a non-rendering position.
    NullSlot,
}

/// Element tag name, either literal or taken from the values array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tag {
    Static(String),
    Dynamic,
}

/// Attribute descriptor of an element node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Attribute {
    /// Literal `name="value"`.
    Static { name: String, value: String },
    /// `name=${value}` - a single fully dynamic attribute.
    Value { name: String },
    /// `${object}` spread into the element's attributes.
    Map,
    /// `name="a${x}b${y}c"` - literal strings interleaved with dynamic fragments.
    /// `strings.len()` is one more than the number of dynamic fragments.
    Parts { name: String, strings: Vec<String> },
    /// Dynamic value inside the tag that renders nothing.
    Null,
}

impl Node {
    pub fn root(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Root {
            children: children.into_iter().collect(),
        }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Node::Element {
            tag: Tag::Static(tag.into()),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element whose tag name is the next value of the values array.
    pub fn dynamic_element() -> Self {
        Node::Element {
            tag: Tag::Dynamic,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    pub fn child_slot() -> Self {
        Node::ChildSlot
    }

    pub fn null_slot() -> Self {
        Node::NullSlot
    }

    /// Appends an attribute. No-op on anything but an element.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        if let Node::Element { attributes, .. } = &mut self {
            attributes.push(attribute);
        }
        self
    }

    /// Appends a child. No-op on text and slot nodes.
    pub fn with_child(mut self, child: Node) -> Self {
        match &mut self {
            Node::Root { children } | Node::Element { children, .. } => children.push(child),
            _ => {}
        }
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::text(text))
    }

    pub fn with_children(mut self, new_children: impl IntoIterator<Item = Node>) -> Self {
        match &mut self {
            Node::Root { children } | Node::Element { children, .. } => {
                children.extend(new_children)
            }
            _ => {}
        }
        self
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Root { children } | Node::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Number of values this node and its subtree consume, in pre-order.
    pub fn dynamic_count(&self) -> usize {
        match self {
            Node::Root { children } => children.iter().map(Node::dynamic_count).sum(),
            Node::Element {
                tag,
                attributes,
                children,
            } => {
                let tag = usize::from(*tag == Tag::Dynamic);
                let attributes: usize = attributes.iter().map(Attribute::dynamic_count).sum();
                tag + attributes + children.iter().map(Node::dynamic_count).sum::<usize>()
            }
            Node::Text { .. } => 0,
            Node::ChildSlot | Node::NullSlot => 1,
        }
    }
}

impl Attribute {
    pub fn static_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute::Static {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn value(name: impl Into<String>) -> Self {
        Attribute::Value { name: name.into() }
    }

    pub fn parts(
        name: impl Into<String>,
        strings: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Attribute::Parts {
            name: name.into(),
            strings: strings.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Attribute::Static { name, .. }
            | Attribute::Value { name }
            | Attribute::Parts { name, .. } => Some(name),
            Attribute::Map | Attribute::Null => None,
        }
    }

    pub fn dynamic_count(&self) -> usize {
        match self {
            Attribute::Static { .. } => 0,
            Attribute::Value { .. } | Attribute::Map | Attribute::Null => 1,
            Attribute::Parts { strings, .. } => strings.len().saturating_sub(1),
        }
    }
}
