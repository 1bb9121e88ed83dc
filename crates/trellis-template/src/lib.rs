//! Template descriptions for Trellis.
//!
//! A template description is the parsed, static shape of one template literal:
//! a tree of elements, literal text and dynamic holes. It carries no values.
//! All dynamism comes from the per-render values array, which is aligned with
//! the pre-order encounter order of the dynamic positions in the tree.
//!
//! Parsing template source text is not part of this crate. Descriptions are
//! built with the [`Node`] constructors or deserialized with serde.

mod node;
mod registry;
mod template;

pub use node::{Attribute, Node, Tag};
pub use registry::TemplateRegistry;
pub use template::{Template, TemplateError, TemplateId};
