//! Live-tree adapter.
//!
//! The engine never touches a concrete document. Every mutation goes through
//! the [`Dom`] trait, which addresses nodes by [`NodeId`]. Adapters keep the
//! mapping from ids to their real nodes (browser nodes, terminal cells, or the
//! in-memory [`VirtualDocument`](crate::VirtualDocument)).

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Generational handle of a live node.
/// Allows safe reuse of adapter slots with use-after-free detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Element namespace, resolved from the nearest element ancestor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
}

impl Namespace {
    /// Namespace of an element named `tag` created under `self`.
    pub fn for_element(self, tag: &str) -> Namespace {
        if tag.eq_ignore_ascii_case("svg") {
            Namespace::Svg
        } else {
            self
        }
    }

    /// Namespace the children of an element named `tag` inherit.
    pub fn for_children_of(self, tag: &str) -> Namespace {
        if self == Namespace::Svg && tag == "foreignObject" {
            Namespace::Html
        } else {
            self.for_element(tag)
        }
    }
}

/// Primitive value written to attributes, properties and text nodes.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
}

impl Scalar {
    /// Attribute removal is folded into writes: `Null` and `false` remove.
    pub fn removes_attribute(&self) -> bool {
        matches!(self, Scalar::Null | Scalar::Bool(false))
    }

    /// String written for an attribute named `name`, `None` when removing.
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        match self {
            Scalar::Null | Scalar::Bool(false) => None,
            Scalar::Bool(true) => Some(name.to_owned()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{}", format_number(*n)),
            Scalar::Text(text) => f.write_str(text),
        }
    }
}

/// Integral numbers print without a fractional part (`3`, not `3.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else {
        format!("{n}")
    }
}

/// Primitive operations the engine needs from a live tree.
///
/// Methods take `&self`; adapters use interior mutability. The engine calls
/// them from a single thread only.
pub trait Dom {
    fn create_element(&self, tag: &str, namespace: Namespace) -> NodeId;
    fn create_text(&self, content: &str) -> NodeId;
    /// Detached container used to assemble a block before one insertion.
    fn create_fragment(&self) -> NodeId;

    fn set_text(&self, node: NodeId, content: &str);
    fn text(&self, node: NodeId) -> Option<String>;

    /// Writes an attribute; `Null`/`false` remove it, `true` writes the name as its value.
    fn set_attribute(&self, node: NodeId, name: &str, value: &Scalar);
    /// Whether `name` is a natively settable property of `node`.
    fn has_property(&self, node: NodeId, name: &str) -> bool;
    fn set_property(&self, node: NodeId, name: &str, value: &Scalar);

    /// Inserts `node` into `parent` before `before`, appending when `None`.
    /// A node that already has a parent is moved.
    fn insert_child(&self, node: NodeId, parent: NodeId, before: Option<NodeId>);
    /// Inserts an empty text node used as a stable position marker.
    fn insert_marker(&self, parent: NodeId, before: Option<NodeId>) -> NodeId {
        let marker = self.create_text("");
        self.insert_child(marker, parent, before);
        marker
    }
    /// Moves the sibling run `first..=last` into `parent` before `before`.
    fn insert_sibling_run(&self, first: NodeId, last: NodeId, parent: NodeId, before: Option<NodeId>);
    /// Detaches the sibling run `first..=last`.
    fn remove_sibling_run(&self, first: NodeId, last: NodeId);
    fn clear_children(&self, node: NodeId);

    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
    fn first_child_of(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling_of(&self, node: NodeId) -> Option<NodeId>;

    fn tag_name(&self, node: NodeId) -> Option<String>;
    fn namespace_of(&self, node: NodeId) -> Namespace;
    /// Whether `node` can receive children (elements and fragments).
    fn can_have_children(&self, node: NodeId) -> bool;
    /// Whether `node` is attached to the document root.
    fn is_connected(&self, node: NodeId) -> bool;

    /// The engine holds no further reference to the detached subtree rooted
    /// at `node`. Adapters that own node storage may free it.
    fn release(&self, _node: NodeId) {}
}

/// Detaches the run `first..=last` and releases each of its nodes.
pub(crate) fn discard_run(dom: &dyn Dom, first: NodeId, last: NodeId) {
    let mut run = vec![first];
    let mut current = first;
    while current != last {
        match dom.next_sibling_of(current) {
            Some(next) => {
                run.push(next);
                current = next;
            }
            None => break,
        }
    }
    dom.remove_sibling_run(first, last);
    for node in run {
        dom.release(node);
    }
}

/// Removes and releases every child of `node`.
pub(crate) fn discard_children(dom: &dyn Dom, node: NodeId) {
    let mut children = Vec::new();
    let mut child = dom.first_child_of(node);
    while let Some(current) = child {
        children.push(current);
        child = dom.next_sibling_of(current);
    }
    dom.clear_children(node);
    for child in children {
        dom.release(child);
    }
}

/// Namespace children of `context` inherit.
pub(crate) fn child_namespace(dom: &dyn Dom, context: NodeId) -> Namespace {
    match dom.tag_name(context) {
        Some(tag) => dom.namespace_of(context).for_children_of(&tag),
        None => dom.namespace_of(context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_text_folds_removal() {
        assert_eq!(Scalar::Null.attribute_text("hidden"), None);
        assert_eq!(Scalar::Bool(false).attribute_text("hidden"), None);
        assert_eq!(Scalar::Bool(true).attribute_text("hidden").as_deref(), Some("hidden"));
        assert_eq!(Scalar::Number(2.0).attribute_text("cols").as_deref(), Some("2"));
        assert_eq!(Scalar::Number(0.5).attribute_text("x").as_deref(), Some("0.5"));
    }

    #[test]
    fn svg_namespace_is_inherited_until_foreign_object() {
        let ns = Namespace::Html.for_element("svg");
        assert_eq!(ns, Namespace::Svg);
        assert_eq!(ns.for_children_of("svg"), Namespace::Svg);
        assert_eq!(ns.for_element("circle"), Namespace::Svg);
        assert_eq!(ns.for_children_of("foreignObject"), Namespace::Html);
        assert_eq!(Namespace::Html.for_children_of("div"), Namespace::Html);
    }
}
