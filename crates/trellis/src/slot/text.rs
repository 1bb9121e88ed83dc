use crate::dom::{Dom, NodeId};
use crate::error::RenderError;
use crate::value::Value;

/// A single text node.
pub(crate) struct TextSlot {
    node: NodeId,
    text: String,
}

impl TextSlot {
    pub(crate) fn create(
        dom: &dyn Dom,
        value: &Value,
        parent: NodeId,
        before: Option<NodeId>,
    ) -> Result<Self, RenderError> {
        let text = Self::text_of(value)?;
        let node = dom.create_text(&text);
        dom.insert_child(node, parent, before);
        Ok(Self { node, text })
    }

    pub(crate) fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn matches(value: &Value) -> bool {
        value.as_scalar().is_some()
    }

    pub(crate) fn update(&mut self, dom: &dyn Dom, value: Value) -> Result<(), RenderError> {
        let text = Self::text_of(&value)?;
        if text != self.text {
            dom.set_text(self.node, &text);
            self.text = text;
        }
        Ok(())
    }

    fn text_of(value: &Value) -> Result<String, RenderError> {
        value
            .as_scalar()
            .map(|scalar| scalar.to_string())
            .ok_or(RenderError::Mismatch {
                expected: "text",
                found: value.kind_name(),
            })
    }
}
