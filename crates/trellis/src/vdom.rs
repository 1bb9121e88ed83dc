//! In-memory document implementing [`Dom`].
//!
//! Nodes live in an arena addressed by generational [`NodeId`]s and are linked
//! with explicit parent/sibling indices. Besides serving hosts without a real
//! document, it records mutation counters so callers can assert that an update
//! touched only what it had to.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::dom::{Dom, Namespace, NodeId, Scalar};

/// Names treated as natively settable element properties.
const PROPERTIES: &[&str] = &["value", "checked", "selected", "indeterminate", "muted"];

/// Mutation counters of a [`VirtualDocument`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DocumentStats {
    pub elements_created: usize,
    pub texts_created: usize,
    pub attribute_writes: usize,
    pub property_writes: usize,
    pub text_writes: usize,
    pub insertions: usize,
    pub removals: usize,
}

#[derive(Debug)]
enum Kind {
    Document,
    Fragment,
    Element {
        tag: String,
        namespace: Namespace,
        attributes: IndexMap<String, String>,
        properties: IndexMap<String, Scalar>,
    },
    Text(String),
}

#[derive(Debug)]
struct VNode {
    generation: u32,
    alive: bool,
    kind: Kind,
    parent: Option<u32>,
    first_child: Option<u32>,
    last_child: Option<u32>,
    prev: Option<u32>,
    next: Option<u32>,
}

impl VNode {
    fn new(kind: Kind) -> Self {
        Self {
            generation: 0,
            alive: true,
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev: None,
            next: None,
        }
    }
}

#[derive(Default)]
struct Arena {
    nodes: Vec<VNode>,
    free_list: Vec<u32>,
}

impl Arena {
    fn alloc(&mut self, kind: Kind) -> NodeId {
        if let Some(index) = self.free_list.pop() {
            // Reuse freed slot, generation was bumped on free
            let node = &mut self.nodes[index as usize];
            let generation = node.generation;
            *node = VNode::new(kind);
            node.generation = generation;
            NodeId { index, generation }
        } else {
            let index = self.nodes.len() as u32;
            self.nodes.push(VNode::new(kind));
            NodeId { index, generation: 0 }
        }
    }

    fn is_valid(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.index as usize)
            .is_some_and(|node| node.alive && node.generation == id.generation)
    }

    fn get(&self, id: NodeId) -> &VNode {
        if !self.is_valid(id) {
            panic!("[VirtualDocument] stale or unknown node {id}");
        }
        &self.nodes[id.index as usize]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut VNode {
        if !self.is_valid(id) {
            panic!("[VirtualDocument] stale or unknown node {id}");
        }
        &mut self.nodes[id.index as usize]
    }

    fn id_of(&self, index: u32) -> NodeId {
        NodeId {
            index,
            generation: self.nodes[index as usize].generation,
        }
    }

    fn detach(&mut self, index: u32) {
        let (parent, prev, next) = {
            let node = &self.nodes[index as usize];
            (node.parent, node.prev, node.next)
        };
        let Some(parent) = parent else { return };
        match prev {
            Some(prev) => self.nodes[prev as usize].next = next,
            None => self.nodes[parent as usize].first_child = next,
        }
        match next {
            Some(next) => self.nodes[next as usize].prev = prev,
            None => self.nodes[parent as usize].last_child = prev,
        }
        let node = &mut self.nodes[index as usize];
        node.parent = None;
        node.prev = None;
        node.next = None;
    }

    fn insert(&mut self, index: u32, parent: u32, before: Option<u32>) {
        self.detach(index);
        let prev = match before {
            Some(before) => {
                if self.nodes[before as usize].parent != Some(parent) {
                    panic!("[VirtualDocument] reference node is not a child of the target parent");
                }
                self.nodes[before as usize].prev
            }
            None => self.nodes[parent as usize].last_child,
        };
        {
            let node = &mut self.nodes[index as usize];
            node.parent = Some(parent);
            node.prev = prev;
            node.next = before;
        }
        match prev {
            Some(prev) => self.nodes[prev as usize].next = Some(index),
            None => self.nodes[parent as usize].first_child = Some(index),
        }
        match before {
            Some(before) => self.nodes[before as usize].prev = Some(index),
            None => self.nodes[parent as usize].last_child = Some(index),
        }
    }

    /// Indices of the sibling run `first..=last`.
    fn run(&self, first: NodeId, last: NodeId) -> Vec<u32> {
        self.get(first);
        self.get(last);
        let mut run = vec![first.index];
        let mut current = first.index;
        while current != last.index {
            match self.nodes[current as usize].next {
                Some(next) => {
                    run.push(next);
                    current = next;
                }
                None => panic!("[VirtualDocument] {last} is not a following sibling of {first}"),
            }
        }
        run
    }

    fn children(&self, index: u32) -> Vec<u32> {
        let mut children = Vec::new();
        let mut child = self.nodes[index as usize].first_child;
        while let Some(index) = child {
            children.push(index);
            child = self.nodes[index as usize].next;
        }
        children
    }
}

/// Arena-backed document tree.
pub struct VirtualDocument {
    arena: RefCell<Arena>,
    root: NodeId,
    body: NodeId,
    stats: Cell<DocumentStats>,
}

impl VirtualDocument {
    pub fn new() -> Self {
        let mut arena = Arena::default();
        let root = arena.alloc(Kind::Document);
        let body = arena.alloc(Kind::Element {
            tag: "body".into(),
            namespace: Namespace::Html,
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
        });
        arena.insert(body.index, root.index, None);
        Self {
            arena: RefCell::new(arena),
            root,
            body,
            stats: Cell::new(DocumentStats::default()),
        }
    }

    /// Document node; everything connected descends from it.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Connected `<body>` element, the usual render target.
    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn stats(&self) -> DocumentStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(DocumentStats::default());
    }

    /// Number of allocated nodes, the document and body included.
    pub fn node_count(&self) -> usize {
        let arena = self.arena.borrow();
        arena.nodes.len() - arena.free_list.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.arena.borrow().is_valid(node)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let arena = self.arena.borrow();
        arena.get(node);
        arena
            .children(node.index)
            .into_iter()
            .map(|index| arena.id_of(index))
            .collect()
    }

    /// Element children only, skipping text nodes and markers.
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|child| self.tag_name(*child).is_some())
            .collect()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.arena.borrow().get(node).kind {
            Kind::Element { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        }
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<Scalar> {
        match &self.arena.borrow().get(node).kind {
            Kind::Element { properties, .. } => properties.get(name).cloned(),
            _ => None,
        }
    }

    /// Frees a detached subtree. Its ids become stale.
    pub fn dispose(&self, node: NodeId) {
        let mut arena = self.arena.borrow_mut();
        if arena.get(node).parent.is_some() {
            panic!("[VirtualDocument] cannot dispose attached node {node}");
        }
        let mut stack = vec![node.index];
        while let Some(index) = stack.pop() {
            stack.extend(arena.children(index));
            let slot = &mut arena.nodes[index as usize];
            slot.alive = false;
            slot.generation += 1;
            arena.free_list.push(index);
        }
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        arena.get(node);
        let mut out = String::new();
        write_node(&arena, node.index, &mut out);
        out
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        arena.get(node);
        let mut out = String::new();
        for child in arena.children(node.index) {
            write_node(&arena, child, &mut out);
        }
        out
    }

    fn bump(&self, update: impl FnOnce(&mut DocumentStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

impl Default for VirtualDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn write_node(arena: &Arena, index: u32, out: &mut String) {
    let node = &arena.nodes[index as usize];
    match &node.kind {
        Kind::Text(text) => escape_into(text, false, out),
        Kind::Document | Kind::Fragment => {
            for child in arena.children(index) {
                write_node(arena, child, out);
            }
        }
        Kind::Element {
            tag, attributes, ..
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                let _ = write!(out, " {name}=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            for child in arena.children(index) {
                write_node(arena, child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl Dom for VirtualDocument {
    fn create_element(&self, tag: &str, namespace: Namespace) -> NodeId {
        self.bump(|stats| stats.elements_created += 1);
        self.arena.borrow_mut().alloc(Kind::Element {
            tag: tag.to_owned(),
            namespace,
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
        })
    }

    fn create_text(&self, content: &str) -> NodeId {
        self.bump(|stats| stats.texts_created += 1);
        self.arena.borrow_mut().alloc(Kind::Text(content.to_owned()))
    }

    fn create_fragment(&self) -> NodeId {
        self.arena.borrow_mut().alloc(Kind::Fragment)
    }

    fn set_text(&self, node: NodeId, content: &str) {
        self.bump(|stats| stats.text_writes += 1);
        if let Kind::Text(text) = &mut self.arena.borrow_mut().get_mut(node).kind {
            content.clone_into(text);
        }
    }

    fn text(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().get(node).kind {
            Kind::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &Scalar) {
        self.bump(|stats| stats.attribute_writes += 1);
        if let Kind::Element { attributes, .. } = &mut self.arena.borrow_mut().get_mut(node).kind {
            match value.attribute_text(name) {
                Some(text) => {
                    attributes.insert(name.to_owned(), text);
                }
                None => {
                    attributes.shift_remove(name);
                }
            }
        }
    }

    fn has_property(&self, node: NodeId, name: &str) -> bool {
        matches!(self.arena.borrow().get(node).kind, Kind::Element { .. })
            && PROPERTIES.contains(&name)
    }

    fn set_property(&self, node: NodeId, name: &str, value: &Scalar) {
        self.bump(|stats| stats.property_writes += 1);
        if let Kind::Element { properties, .. } = &mut self.arena.borrow_mut().get_mut(node).kind {
            properties.insert(name.to_owned(), value.clone());
        }
    }

    fn insert_child(&self, node: NodeId, parent: NodeId, before: Option<NodeId>) {
        self.bump(|stats| stats.insertions += 1);
        let mut arena = self.arena.borrow_mut();
        arena.get(node);
        arena.get(parent);
        if let Some(before) = before {
            arena.get(before);
        }
        arena.insert(node.index, parent.index, before.map(|before| before.index));
    }

    fn insert_sibling_run(&self, first: NodeId, last: NodeId, parent: NodeId, before: Option<NodeId>) {
        let mut arena = self.arena.borrow_mut();
        let run = arena.run(first, last);
        arena.get(parent);
        self.bump(|stats| stats.insertions += run.len());
        for index in run {
            arena.insert(index, parent.index, before.map(|before| before.index));
        }
    }

    fn remove_sibling_run(&self, first: NodeId, last: NodeId) {
        let mut arena = self.arena.borrow_mut();
        let run = arena.run(first, last);
        self.bump(|stats| stats.removals += run.len());
        for index in run {
            arena.detach(index);
        }
    }

    fn clear_children(&self, node: NodeId) {
        let mut arena = self.arena.borrow_mut();
        arena.get(node);
        let children = arena.children(node.index);
        self.bump(|stats| stats.removals += children.len());
        for child in children {
            arena.detach(child);
        }
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        let arena = self.arena.borrow();
        arena.get(node).parent.map(|index| arena.id_of(index))
    }

    fn first_child_of(&self, node: NodeId) -> Option<NodeId> {
        let arena = self.arena.borrow();
        arena.get(node).first_child.map(|index| arena.id_of(index))
    }

    fn next_sibling_of(&self, node: NodeId) -> Option<NodeId> {
        let arena = self.arena.borrow();
        arena.get(node).next.map(|index| arena.id_of(index))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().get(node).kind {
            Kind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn namespace_of(&self, node: NodeId) -> Namespace {
        match &self.arena.borrow().get(node).kind {
            Kind::Element { namespace, .. } => *namespace,
            _ => Namespace::Html,
        }
    }

    fn can_have_children(&self, node: NodeId) -> bool {
        !matches!(self.arena.borrow().get(node).kind, Kind::Text(_))
    }

    fn release(&self, node: NodeId) {
        self.dispose(node);
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let arena = self.arena.borrow();
        let mut current = arena.get(node);
        loop {
            if matches!(current.kind, Kind::Document) {
                return true;
            }
            match current.parent {
                Some(parent) => current = &arena.nodes[parent as usize],
                None => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(doc: &VirtualDocument, tag: &str) -> NodeId {
        doc.create_element(tag, Namespace::Html)
    }

    #[test]
    fn builds_and_serializes_tree() {
        let doc = VirtualDocument::new();
        let div = element(&doc, "div");
        let text = doc.create_text("a < b");
        doc.insert_child(div, doc.body(), None);
        doc.insert_child(text, div, None);
        doc.set_attribute(div, "title", &Scalar::Text("\"quoted\"".into()));

        assert_eq!(
            doc.inner_html(doc.body()),
            "<div title=\"&quot;quoted&quot;\">a &lt; b</div>"
        );
        assert!(doc.is_connected(text));
    }

    #[test]
    fn insert_before_and_move_runs() {
        let doc = VirtualDocument::new();
        let list = element(&doc, "ul");
        let [a, b, c] = ["a", "b", "c"].map(|t| doc.create_text(t));
        for node in [a, b, c] {
            doc.insert_child(node, list, None);
        }

        doc.insert_sibling_run(b, c, list, Some(a));
        assert_eq!(doc.inner_html(list), "bca");
        assert_eq!(doc.children(list), vec![b, c, a]);

        doc.remove_sibling_run(c, a);
        assert_eq!(doc.children(list), vec![b]);
        assert_eq!(doc.parent_of(c), None);
        assert_eq!(doc.stats().removals, 2);
    }

    #[test]
    fn boolean_attributes_fold_into_removal() {
        let doc = VirtualDocument::new();
        let input = element(&doc, "input");
        doc.set_attribute(input, "disabled", &Scalar::Bool(true));
        assert_eq!(doc.attribute(input, "disabled").as_deref(), Some("disabled"));
        doc.set_attribute(input, "disabled", &Scalar::Bool(false));
        assert_eq!(doc.attribute(input, "disabled"), None);
        assert_eq!(doc.stats().attribute_writes, 2);
    }

    #[test]
    fn properties_are_not_serialized() {
        let doc = VirtualDocument::new();
        let input = element(&doc, "input");
        assert!(doc.has_property(input, "value"));
        assert!(!doc.has_property(input, "title"));
        doc.set_property(input, "value", &Scalar::Text("typed".into()));
        assert_eq!(doc.property(input, "value"), Some(Scalar::Text("typed".into())));
        assert_eq!(doc.outer_html(input), "<input></input>");
    }

    #[test]
    fn fragments_are_not_connected() {
        let doc = VirtualDocument::new();
        let fragment = doc.create_fragment();
        let span = element(&doc, "span");
        doc.insert_child(span, fragment, None);
        assert!(!doc.is_connected(span));
        doc.insert_sibling_run(span, span, doc.body(), None);
        assert!(doc.is_connected(span));
        assert_eq!(doc.first_child_of(fragment), None);
    }

    #[test]
    fn disposed_ids_become_stale() {
        let doc = VirtualDocument::new();
        let div = element(&doc, "div");
        let text = doc.create_text("x");
        doc.insert_child(text, div, None);
        doc.dispose(div);
        assert!(!doc.contains(div));
        assert!(!doc.contains(text));

        let reused = element(&doc, "p");
        assert!(doc.contains(reused));
        assert_ne!(reused, div);
        assert_ne!(reused, text);
    }

    #[test]
    fn released_runs_free_their_slots() {
        let doc = VirtualDocument::new();
        let baseline = doc.node_count();
        let list = element(&doc, "ul");
        doc.insert_child(list, doc.body(), None);
        let items: Vec<_> = (0..3).map(|_| element(&doc, "li")).collect();
        for item in &items {
            doc.insert_child(*item, list, None);
            doc.insert_child(doc.create_text("x"), *item, None);
        }
        assert_eq!(doc.node_count(), baseline + 7);

        crate::dom::discard_children(&doc, list);
        assert_eq!(doc.node_count(), baseline + 1);
        assert!(items.iter().all(|item| !doc.contains(*item)));
    }
}
