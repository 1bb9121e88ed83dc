use std::rc::Rc;
use std::sync::Arc;

use trellis_template::Template;

use crate::builder::{BuiltTags, build};
use crate::context::RenderContext;
use crate::dom::{Namespace, NodeId};
use crate::error::RenderError;
use crate::pending::{Position, resolve};
use crate::recycle::KeyedElement;
use crate::value::{TemplateResult, Value};

/// Instantiated template, bracketed by two markers.
pub(crate) struct TemplateSlot {
    template: Arc<Template>,
    tags: BuiltTags,
    positions: Vec<Rc<Position>>,
    keyed: Vec<KeyedElement>,
    start: NodeId,
    end: NodeId,
}

impl TemplateSlot {
    /// Builds and fills the template in a detached fragment, then inserts it
    /// with a single run insertion. On error nothing is inserted and the
    /// partial content is released.
    pub(crate) fn create(
        ctx: &Rc<RenderContext>,
        result: &TemplateResult,
        parent: NodeId,
        before: Option<NodeId>,
        namespace: Namespace,
    ) -> Result<Self, RenderError> {
        let dom = ctx.dom();
        let fragment = dom.create_fragment();
        let start = dom.insert_marker(fragment, None);
        let built = match build(ctx, result.template(), result.values(), fragment, namespace) {
            Ok(built) => built,
            Err(error) => {
                dom.release(fragment);
                return Err(error);
            }
        };
        let end = dom.insert_marker(fragment, None);

        let mut slot = Self {
            template: result.template().clone(),
            tags: built.tags,
            positions: built.positions,
            keyed: built.keyed,
            start,
            end,
        };
        if let Err(error) = slot.apply(ctx, result.values()) {
            slot.cancel_updates();
            dom.release(fragment);
            return Err(error);
        }
        dom.insert_sibling_run(start, end, parent, before);
        dom.release(fragment);
        Ok(slot)
    }

    pub(crate) fn start(&self) -> NodeId {
        self.start
    }

    pub(crate) fn end(&self) -> NodeId {
        self.end
    }

    /// Same description, and every dynamic tag resolves to the name it was built with.
    pub(crate) fn matches(&self, value: &Value) -> bool {
        let Value::Template(result) = value else {
            return false;
        };
        Template::same(&self.template, result.template())
            && self.tags.iter().all(|(position, name)| {
                result.values().get(*position).and_then(Value::as_text) == Some(&**name)
            })
    }

    pub(crate) fn update(&mut self, ctx: &Rc<RenderContext>, value: Value) -> Result<(), RenderError> {
        match value {
            Value::Template(result) if Template::same(&self.template, result.template()) => {
                self.apply(ctx, result.values())
            }
            other => Err(RenderError::Mismatch {
                expected: "template",
                found: other.kind_name(),
            }),
        }
    }

    pub(crate) fn cancel_updates(&mut self) {
        for position in &self.positions {
            position.cancel_updates();
        }
    }

    pub(crate) fn collect_keyed(&self, out: &mut Vec<KeyedElement>) {
        out.extend(self.keyed.iter().cloned());
        for position in &self.positions {
            position.collect_keyed(out);
        }
    }

    /// Binds every value; a failing position does not stop the others.
    /// The first error is returned, later ones are reported.
    fn apply(&mut self, ctx: &Rc<RenderContext>, values: &[Value]) -> Result<(), RenderError> {
        let mut first_error = None;
        for (position, value) in self.positions.iter().zip(values) {
            if let Err(error) = resolve(ctx, position, value.clone()) {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    ctx.report(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
