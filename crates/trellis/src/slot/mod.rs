//! Child slots.
//!
//! A slot owns one contiguous run of sibling nodes, `start..=end`. The run is
//! bracketed by marker nodes for templates and lists, or is a single text node.
//! Slots are updated in place when the next value matches, and destroyed and
//! recreated otherwise. A destroyed slot releases its nodes to the document,
//! except keyed elements, which go to the recycle pool.

use std::any::Any;
use std::rc::Rc;

use log::trace;

use crate::context::RenderContext;
use crate::dom::{Namespace, NodeId, discard_run};
use crate::error::RenderError;
use crate::recycle::KeyedElement;
use crate::value::Value;

pub(crate) mod list;
pub(crate) mod template;
pub(crate) mod text;

use list::ListSlot;
use template::TemplateSlot;
use text::TextSlot;

// --- Extensible slots ---

/// Value that supplies its own slot implementation.
///
/// Wrap it with [`Value::slot`]. The engine calls [`SlotProvider::create_slot`]
/// when the value is bound to a position that has no matching slot yet.
pub trait SlotProvider {
    fn create_slot(
        &self,
        ctx: &Rc<RenderContext>,
        parent: NodeId,
        before: Option<NodeId>,
    ) -> Result<Box<dyn CustomSlot>, RenderError>;

    /// Lets a [`CustomSlot`] inspect the provider it is updated with.
    fn as_any(&self) -> &dyn Any;
}

/// Host-defined slot.
///
/// Must keep its nodes between `start` and `end` inclusive; the engine moves
/// and removes them as one run.
pub trait CustomSlot {
    fn start(&self) -> NodeId;
    fn end(&self) -> NodeId;
    /// Whether `value` can be applied in place. Consulted for every value,
    /// not only for [`Value::Slot`].
    fn matches(&self, value: &Value) -> bool;
    fn update(&mut self, ctx: &Rc<RenderContext>, value: Value) -> Result<(), RenderError>;
    /// Stops pending async work before the slot is replaced or removed.
    fn cancel_updates(&mut self) {}
}

// --- Slot ---

pub(crate) enum Slot {
    Text(TextSlot),
    Template(TemplateSlot),
    List(ListSlot),
    Custom(Box<dyn CustomSlot>),
}

impl Slot {
    /// Builds the slot for `value` before `before`. `Null` builds nothing.
    ///
    /// `namespace` is the one new elements inherit; `parent` may be a detached
    /// fragment that does not carry it.
    pub(crate) fn create(
        ctx: &Rc<RenderContext>,
        value: Value,
        parent: NodeId,
        before: Option<NodeId>,
        namespace: Namespace,
    ) -> Result<Option<Slot>, RenderError> {
        let slot = match value {
            Value::Null => return Ok(None),
            Value::Slot(provider) => Slot::Custom(provider.create_slot(ctx, parent, before)?),
            Value::Template(result) => {
                Slot::Template(TemplateSlot::create(ctx, &result, parent, before, namespace)?)
            }
            value @ (Value::List(_) | Value::Keyed(_)) => {
                let mut list = ListSlot::create(ctx, parent, before, namespace);
                if let Err(error) = list.update(ctx, value) {
                    Slot::List(list).destroy(ctx);
                    return Err(error);
                }
                Slot::List(list)
            }
            Value::Attributes(_) => {
                return Err(RenderError::InvalidChildValue {
                    found: "attributes",
                });
            }
            value if value.is_async() => {
                return Err(RenderError::NestedSource {
                    found: value.kind_name(),
                });
            }
            scalar => Slot::Text(TextSlot::create(ctx.dom(), &scalar, parent, before)?),
        };
        trace!("[trellis] created {} slot in {parent}", slot.kind_name());
        Ok(Some(slot))
    }

    /// Builds a collection item; `Null` items hold an empty text node.
    pub(crate) fn create_item(
        ctx: &Rc<RenderContext>,
        value: Value,
        parent: NodeId,
        before: Option<NodeId>,
        namespace: Namespace,
    ) -> Result<Slot, RenderError> {
        match Slot::create(ctx, value, parent, before, namespace)? {
            Some(slot) => Ok(slot),
            None => Ok(Slot::Text(TextSlot::create(ctx.dom(), &Value::text(""), parent, before)?)),
        }
    }

    pub(crate) fn start(&self) -> NodeId {
        match self {
            Slot::Text(slot) => slot.node(),
            Slot::Template(slot) => slot.start(),
            Slot::List(slot) => slot.start(),
            Slot::Custom(slot) => slot.start(),
        }
    }

    pub(crate) fn end(&self) -> NodeId {
        match self {
            Slot::Text(slot) => slot.node(),
            Slot::Template(slot) => slot.end(),
            Slot::List(slot) => slot.end(),
            Slot::Custom(slot) => slot.end(),
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Slot::Text(_) => "text",
            Slot::Template(_) => "template",
            Slot::List(_) => "list",
            Slot::Custom(_) => "custom",
        }
    }

    pub(crate) fn matches(&self, value: &Value) -> bool {
        match self {
            Slot::Text(_) => TextSlot::matches(value),
            Slot::Template(slot) => slot.matches(value),
            Slot::List(_) => ListSlot::matches(value),
            Slot::Custom(slot) => slot.matches(value),
        }
    }

    pub(crate) fn update(&mut self, ctx: &Rc<RenderContext>, value: Value) -> Result<(), RenderError> {
        match self {
            Slot::Text(slot) => slot.update(ctx.dom(), value),
            Slot::Template(slot) => slot.update(ctx, value),
            Slot::List(slot) => slot.update(ctx, value),
            Slot::Custom(slot) => slot.update(ctx, value),
        }
    }

    pub(crate) fn cancel_updates(&mut self) {
        match self {
            Slot::Text(_) => {}
            Slot::Template(slot) => slot.cancel_updates(),
            Slot::List(slot) => slot.cancel_updates(),
            Slot::Custom(slot) => slot.cancel_updates(),
        }
    }

    pub(crate) fn collect_keyed(&self, out: &mut Vec<KeyedElement>) {
        match self {
            Slot::Text(_) | Slot::Custom(_) => {}
            Slot::Template(slot) => slot.collect_keyed(out),
            Slot::List(slot) => slot.collect_keyed(out),
        }
    }

    /// Cancels nested async work, then removes and releases the slot's nodes.
    pub(crate) fn destroy(mut self, ctx: &Rc<RenderContext>) {
        self.cancel_updates();
        let dom = ctx.dom();
        let mut keyed = Vec::new();
        self.collect_keyed(&mut keyed);
        // Pooled elements have to outlive the run they sit in
        for element in &keyed {
            if dom.parent_of(element.node).is_some() {
                dom.remove_sibling_run(element.node, element.node);
            }
        }
        discard_run(dom, self.start(), self.end());
        let mut pool = ctx.pool();
        for element in keyed {
            pool.release(dom, element);
        }
    }
}
