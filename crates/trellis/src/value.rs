//! Values substituted into template holes.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use trellis_template::Template;

use crate::dom::{Scalar, format_number};
use crate::error::RenderError;
use crate::slot::SlotProvider;
use crate::source::{Deferred, Observable, Sequence};

/// Identity of an item inside a keyed collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Position in an unkeyed list.
    Index(usize),
    Text(Rc<str>),
    Number(OrderedFloat<f64>),
}

impl Key {
    pub fn text(s: impl Into<Rc<str>>) -> Self {
        Key::Text(s.into())
    }

    pub fn number(n: f64) -> Self {
        Key::Number(OrderedFloat(n))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.into())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s.into())
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(OrderedFloat(n as f64))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "#{index}"),
            Key::Text(text) => write!(f, "{text:?}"),
            Key::Number(n) => f.write_str(&format_number(n.0)),
        }
    }
}

/// A template description paired with one render's values.
#[derive(Clone, Debug)]
pub struct TemplateResult {
    template: Arc<Template>,
    values: Rc<[Value]>,
}

impl TemplateResult {
    pub fn new(
        template: Arc<Template>,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self, RenderError> {
        let values: Rc<[Value]> = values.into_iter().collect();
        if values.len() != template.dynamic_count() {
            return Err(RenderError::ValueCountMismatch {
                expected: template.dynamic_count(),
                found: values.len(),
            });
        }
        Ok(Self { template, values })
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Shorthand for `Value::Template(TemplateResult::new(..)?)`.
pub fn html(
    template: &Arc<Template>,
    values: impl IntoIterator<Item = Value>,
) -> Result<Value, RenderError> {
    TemplateResult::new(template.clone(), values).map(Value::Template)
}

/// Dynamic value for one template position.
///
/// Cheap to clone: every non-scalar variant is reference counted. The async
/// variants compare by identity, which is what lets the resolution layer skip
/// re-binding a source that is already being awaited.
#[derive(Clone)]
pub enum Value {
    /// Renders nothing; removes an attribute.
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    Template(TemplateResult),
    /// Ordered collection keyed by position.
    List(Rc<[Value]>),
    /// Ordered collection with explicit keys.
    Keyed(Rc<[(Key, Value)]>),
    /// Attribute bag for a spread position.
    Attributes(Rc<IndexMap<Rc<str>, Value>>),
    Deferred(Deferred),
    Stream(Observable),
    Sequence(Sequence),
    /// Value that builds its own slot.
    Slot(Rc<dyn SlotProvider>),
}

impl Value {
    pub fn text(s: impl Into<Rc<str>>) -> Self {
        Value::Text(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn keyed(
        items: impl IntoIterator<Item = (impl Into<Key>, impl Into<Value>)>,
    ) -> Self {
        Value::Keyed(
            items
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn attributes(
        entries: impl IntoIterator<Item = (impl Into<Rc<str>>, impl Into<Value>)>,
    ) -> Self {
        Value::Attributes(Rc::new(
            entries
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        ))
    }

    pub fn slot(provider: impl SlotProvider + 'static) -> Self {
        Value::Slot(Rc::new(provider))
    }

    /// Variant name used in error messages and logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Template(_) => "template",
            Value::List(_) => "list",
            Value::Keyed(_) => "keyed list",
            Value::Attributes(_) => "attributes",
            Value::Deferred(_) => "deferred value",
            Value::Stream(_) => "stream",
            Value::Sequence(_) => "sequence",
            Value::Slot(_) => "custom slot",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Value::List(_) | Value::Keyed(_))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Value::Deferred(_) | Value::Stream(_) | Value::Sequence(_))
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(Scalar::Number(*n)),
            Value::Text(text) => Some(Scalar::Text(text.clone())),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Items as `(key, value)` pairs; anything else is a single-item view.
    pub(crate) fn entries(&self) -> Vec<(Key, Value)> {
        match self {
            Value::Null => Vec::new(),
            Value::List(items) => items
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, value)| (Key::Index(index), value))
                .collect(),
            Value::Keyed(items) => items.to_vec(),
            other => vec![(Key::Index(0), other.clone())],
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Value::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Value::Template(result) => f
                .debug_struct("Template")
                .field("id", &result.template().id())
                .field("values", &result.values())
                .finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Keyed(items) => f.debug_tuple("Keyed").field(items).finish(),
            Value::Attributes(map) => f.debug_tuple("Attributes").field(map).finish(),
            Value::Deferred(deferred) => fmt::Debug::fmt(deferred, f),
            Value::Stream(stream) => fmt::Debug::fmt(stream, f),
            Value::Sequence(sequence) => fmt::Debug::fmt(sequence, f),
            Value::Slot(_) => f.write_str("Slot(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<TemplateResult> for Value {
    fn from(result: TemplateResult) -> Self {
        Value::Template(result)
    }
}

impl From<Deferred> for Value {
    fn from(deferred: Deferred) -> Self {
        Value::Deferred(deferred)
    }
}

impl From<Observable> for Value {
    fn from(stream: Observable) -> Self {
        Value::Stream(stream)
    }
}

impl From<Sequence> for Value {
    fn from(sequence: Sequence) -> Self {
        Value::Sequence(sequence)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_template::Node;

    #[test]
    fn template_result_checks_value_count() {
        let template = Template::new(Node::element("p").with_child(Node::child_slot())).unwrap();
        assert!(TemplateResult::new(template.clone(), [Value::from("x")]).is_ok());
        assert_eq!(
            TemplateResult::new(template, []).unwrap_err(),
            RenderError::ValueCountMismatch {
                expected: 1,
                found: 0
            }
        );
    }

    #[test]
    fn entries_synthesize_position_keys() {
        let entries = Value::list(["a", "b"]).entries();
        assert_eq!(entries[0].0, Key::Index(0));
        assert_eq!(entries[1].0, Key::Index(1));

        let keyed = Value::keyed([("x", 1), ("y", 2)]).entries();
        assert_eq!(keyed[1].0, Key::text("y"));

        let single = Value::from("solo").entries();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].0, Key::Index(0));
        assert!(Value::Null.entries().is_empty());
    }

    #[test]
    fn scalars_convert() {
        assert_eq!(Value::from(3).as_scalar(), Some(Scalar::Number(3.0)));
        assert_eq!(Value::from(Option::<&str>::None).as_scalar(), Some(Scalar::Null));
        assert!(Value::list(Vec::<Value>::new()).as_scalar().is_none());
    }
}
