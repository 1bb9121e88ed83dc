use std::fmt;
use std::rc::Rc;

use crate::dom::NodeId;

// --- SourceError ---

/// Failure reported by an asynchronous value source: a rejected deferred value,
/// an error notification of a stream, or a failing sequence item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceError(Rc<str>);

impl SourceError {
    pub fn new(message: impl Into<Rc<str>>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SourceError {}

// --- RenderError ---

/// Error raised while building or updating live content.
///
/// Usage errors and invariant violations are returned synchronously to the
/// caller of [`Renderer::render`](crate::Renderer::render). Errors that happen
/// inside asynchronous callbacks go to the renderer's error handler instead.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderError {
    /// The top-level value passed to the renderer is not a template.
    NotATemplate { found: &'static str },
    /// The render target cannot hold children.
    InvalidTarget(NodeId),
    /// A dynamic tag name did not resolve to text.
    InvalidTag { found: &'static str },
    /// The values array does not match the template's dynamic positions.
    ValueCountMismatch { expected: usize, found: usize },
    /// A value that cannot be written to an attribute.
    InvalidAttributeValue { name: String, found: &'static str },
    /// A spread position was given something other than an attribute map.
    InvalidAttributeMap { found: &'static str },
    /// A value that cannot be rendered as child content.
    InvalidChildValue { found: &'static str },
    /// An asynchronous source where only resolved values are accepted
    /// (collection items, values pushed by another source).
    NestedSource { found: &'static str },
    /// A sequence that was already bound elsewhere and consumed.
    SequenceConsumed,
    /// A slot was asked to update with a value it does not match.
    Mismatch { expected: &'static str, found: &'static str },
    /// A dynamic tag name changed without rebuilding the template.
    StructuralChange { from: String, to: String },
    /// A marker node lost its parent.
    Detached(NodeId),
    /// A dynamic position was updated from inside its own update.
    Reentrant { position: usize },
    /// An asynchronous source failed.
    Source(SourceError),
    /// The host executor refused a task.
    Spawn(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotATemplate { found } => {
                write!(f, "render expects a template, found {found}")
            }
            RenderError::InvalidTarget(node) => {
                write!(f, "render target {node} cannot hold children")
            }
            RenderError::InvalidTag { found } => {
                write!(f, "dynamic tag name must be text, found {found}")
            }
            RenderError::ValueCountMismatch { expected, found } => {
                write!(f, "template expects {expected} values, found {found}")
            }
            RenderError::InvalidAttributeValue { name, found } => {
                write!(f, "attribute `{name}` cannot be set to {found}")
            }
            RenderError::InvalidAttributeMap { found } => {
                write!(f, "attribute spread expects an attribute map, found {found}")
            }
            RenderError::InvalidChildValue { found } => {
                write!(f, "{found} cannot be rendered as child content")
            }
            RenderError::NestedSource { found } => {
                write!(f, "unexpected nested {found}, only resolved values are accepted here")
            }
            RenderError::SequenceConsumed => write!(f, "sequence already consumed"),
            RenderError::Mismatch { expected, found } => {
                write!(f, "{expected} slot cannot be updated with {found}")
            }
            RenderError::StructuralChange { from, to } => {
                write!(f, "tag changed from `{from}` to `{to}` without a rebuild")
            }
            RenderError::Detached(node) => write!(f, "marker {node} is not attached"),
            RenderError::Reentrant { position } => {
                write!(f, "dynamic position {position} updated re-entrantly")
            }
            RenderError::Source(error) => write!(f, "async source failed: {error}"),
            RenderError::Spawn(reason) => write!(f, "failed to spawn task: {reason}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Source(error) => Some(error),
            _ => None,
        }
    }
}

impl From<SourceError> for RenderError {
    fn from(error: SourceError) -> Self {
        RenderError::Source(error)
    }
}
