//! Per-position updaters.
//!
//! The builder creates exactly one [`Updater`] per dynamic position, in
//! pre-order. Updaters receive resolved values only; async sources are
//! unwrapped by the resolution layer before they get here.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use smallvec::SmallVec;

use crate::context::RenderContext;
use crate::dom::{Dom, Namespace, NodeId, Scalar};
use crate::error::RenderError;
use crate::recycle::KeyedElement;
use crate::slot::Slot;
use crate::slot::list::ListSlot;
use crate::value::Value;

pub(crate) enum Updater {
    Tag(TagUpdater),
    Attribute(AttributeUpdater),
    AttributePart(AttributePartUpdater),
    AttributeMap(AttributeMapUpdater),
    /// Null slot or null attribute; accepts and ignores anything.
    Comment,
    Child(ChildUpdater),
}

impl Updater {
    pub(crate) fn update(&mut self, ctx: &Rc<RenderContext>, value: Value) -> Result<(), RenderError> {
        match self {
            Updater::Tag(updater) => updater.update(value),
            Updater::Attribute(updater) => updater.update(ctx.dom(), value),
            Updater::AttributePart(updater) => updater.update(ctx.dom(), value),
            Updater::AttributeMap(updater) => updater.update(ctx.dom(), value),
            Updater::Comment => Ok(()),
            Updater::Child(updater) => updater.update(ctx, value),
        }
    }

    pub(crate) fn cancel_updates(&mut self) {
        if let Updater::Child(updater) = self {
            updater.cancel_updates();
        }
    }

    /// Keyed elements owned by the child content below this position.
    pub(crate) fn collect_keyed(&self, out: &mut Vec<KeyedElement>) {
        if let Updater::Child(ChildUpdater {
            slot: Some(slot), ..
        }) = self
        {
            slot.collect_keyed(out);
        }
    }
}

/// Writes through a property when the node has one, as an attribute otherwise.
pub(crate) fn write_attribute(dom: &dyn Dom, node: NodeId, name: &str, value: &Scalar) {
    if dom.has_property(node, name) {
        dom.set_property(node, name, value);
    } else {
        dom.set_attribute(node, name, value);
    }
}

fn attribute_scalar(name: &str, value: &Value) -> Result<Scalar, RenderError> {
    value
        .as_scalar()
        .ok_or_else(|| RenderError::InvalidAttributeValue {
            name: name.to_owned(),
            found: value.kind_name(),
        })
}

// --- Tag ---

/// Dynamic tag position. The tag is fixed once built.
pub(crate) struct TagUpdater {
    name: Rc<str>,
}

impl TagUpdater {
    pub(crate) fn new(name: Rc<str>) -> Self {
        Self { name }
    }

    fn update(&mut self, value: Value) -> Result<(), RenderError> {
        match value.as_text() {
            Some(name) if *name == *self.name => Ok(()),
            Some(name) => Err(RenderError::StructuralChange {
                from: self.name.to_string(),
                to: name.to_owned(),
            }),
            None => Err(RenderError::InvalidTag {
                found: value.kind_name(),
            }),
        }
    }
}

// --- Attribute ---

pub(crate) struct AttributeUpdater {
    node: NodeId,
    name: Rc<str>,
    last: Option<Scalar>,
}

impl AttributeUpdater {
    pub(crate) fn new(node: NodeId, name: &str) -> Self {
        Self {
            node,
            name: name.into(),
            last: None,
        }
    }

    fn update(&mut self, dom: &dyn Dom, value: Value) -> Result<(), RenderError> {
        let scalar = attribute_scalar(&self.name, &value)?;
        if self.last.as_ref() == Some(&scalar) {
            return Ok(());
        }
        write_attribute(dom, self.node, &self.name, &scalar);
        self.last = Some(scalar);
        Ok(())
    }
}

// --- Attribute parts ---

/// Shared state of one attribute interpolated from several values.
pub(crate) struct AttributeParts {
    node: NodeId,
    name: Rc<str>,
    strings: Vec<String>,
    fragments: SmallVec<[Option<String>; 4]>,
    pending: usize,
}

impl AttributeParts {
    pub(crate) fn new(node: NodeId, name: &str, strings: &[String]) -> Rc<RefCell<Self>> {
        let parts = strings.len().saturating_sub(1);
        Rc::new(RefCell::new(Self {
            node,
            name: name.into(),
            strings: strings.to_vec(),
            fragments: SmallVec::from_elem(None, parts),
            pending: parts,
        }))
    }

    fn joined(&self) -> String {
        let mut out = String::new();
        for (index, string) in self.strings.iter().enumerate() {
            out.push_str(string);
            if let Some(Some(fragment)) = self.fragments.get(index) {
                out.push_str(fragment);
            }
        }
        out
    }
}

/// One hole of an interpolated attribute.
pub(crate) struct AttributePartUpdater {
    parts: Rc<RefCell<AttributeParts>>,
    index: usize,
}

impl AttributePartUpdater {
    pub(crate) fn new(parts: Rc<RefCell<AttributeParts>>, index: usize) -> Self {
        Self { parts, index }
    }

    fn update(&mut self, dom: &dyn Dom, value: Value) -> Result<(), RenderError> {
        let mut parts = self.parts.borrow_mut();
        let fragment = attribute_scalar(&parts.name, &value)?.to_string();
        if parts.fragments[self.index].replace(fragment).is_none() {
            parts.pending -= 1;
        }
        // Nothing is written until every hole has a value
        if parts.pending == 0 {
            let joined = parts.joined();
            write_attribute(dom, parts.node, &parts.name, &Scalar::Text(joined.into()));
        }
        Ok(())
    }
}

// --- Attribute map ---

/// Spread position writing every entry of an attribute bag.
///
/// Names absent from a later bag are left as they are.
pub(crate) struct AttributeMapUpdater {
    node: NodeId,
}

impl AttributeMapUpdater {
    pub(crate) fn new(node: NodeId) -> Self {
        Self { node }
    }

    fn update(&mut self, dom: &dyn Dom, value: Value) -> Result<(), RenderError> {
        match value {
            Value::Null => Ok(()),
            Value::Attributes(map) => {
                for (name, value) in map.iter() {
                    let scalar = attribute_scalar(name, value)?;
                    write_attribute(dom, self.node, name, &scalar);
                }
                Ok(())
            }
            other => Err(RenderError::InvalidAttributeMap {
                found: other.kind_name(),
            }),
        }
    }
}

// --- Child ---

/// Child-content position, anchored by a marker node.
pub(crate) struct ChildUpdater {
    marker: NodeId,
    namespace: Namespace,
    slot: Option<Slot>,
}

impl ChildUpdater {
    pub(crate) fn new(marker: NodeId, namespace: Namespace) -> Self {
        Self {
            marker,
            namespace,
            slot: None,
        }
    }

    fn update(&mut self, ctx: &Rc<RenderContext>, value: Value) -> Result<(), RenderError> {
        let dom = ctx.dom();
        if value.is_null() {
            if let Some(slot) = self.slot.take() {
                slot.destroy(ctx);
            }
            return Ok(());
        }
        let parent = dom
            .parent_of(self.marker)
            .ok_or(RenderError::Detached(self.marker))?;

        match self.slot.take() {
            Some(mut slot) if slot.matches(&value) => {
                let result = slot.update(ctx, value);
                self.slot = Some(slot);
                result
            }
            Some(slot) if value.is_collection() => {
                // Existing content becomes the first item of the new list
                let mut list = ListSlot::adopt(ctx, slot, parent, self.namespace);
                let result = list.update(ctx, value);
                self.slot = Some(Slot::List(list));
                result
            }
            previous => {
                if let Some(slot) = previous {
                    debug!("[trellis] replacing {} slot with {}", slot.kind_name(), value.kind_name());
                    slot.destroy(ctx);
                }
                self.slot = Slot::create(ctx, value, parent, Some(self.marker), self.namespace)?;
                Ok(())
            }
        }
    }

    fn cancel_updates(&mut self) {
        if let Some(slot) = &mut self.slot {
            slot.cancel_updates();
        }
    }
}
