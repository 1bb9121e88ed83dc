//! Template instantiation.
//!
//! Walks a template description depth-first, creating live nodes and one
//! updater per dynamic position in pre-order: an element's tag, then its
//! attributes, then its children.

use std::rc::Rc;

use log::trace;
use smallvec::SmallVec;
use trellis_template::{Attribute, Node, Tag, Template};

use crate::context::RenderContext;
use crate::dom::{Namespace, NodeId, Scalar, discard_children};
use crate::error::RenderError;
use crate::pending::Position;
use crate::recycle::KeyedElement;
use crate::updater::{
    AttributeMapUpdater, AttributePartUpdater, AttributeParts, AttributeUpdater, ChildUpdater,
    TagUpdater, Updater, write_attribute,
};
use crate::value::Value;

/// Dynamic tag names fixed at build time, by position.
pub(crate) type BuiltTags = SmallVec<[(usize, Rc<str>); 2]>;

pub(crate) struct Built {
    pub(crate) positions: Vec<Rc<Position>>,
    pub(crate) tags: BuiltTags,
    /// Keyed elements of this instance, released to the pool on teardown.
    pub(crate) keyed: Vec<KeyedElement>,
}

/// Builds `template` into `parent` and returns its positions, still unapplied.
///
/// `values` are only read for dynamic tag names.
pub(crate) fn build(
    ctx: &Rc<RenderContext>,
    template: &Template,
    values: &[Value],
    parent: NodeId,
    namespace: Namespace,
) -> Result<Built, RenderError> {
    let mut builder = Builder {
        ctx,
        values,
        updaters: Vec::with_capacity(template.dynamic_count()),
        tags: SmallVec::new(),
        keyed: Vec::new(),
    };
    builder.node(template.root(), parent, namespace)?;

    if builder.updaters.len() != template.dynamic_count() {
        panic!(
            "[trellis] template {} built {} positions, expected {}",
            template.id(),
            builder.updaters.len(),
            template.dynamic_count()
        );
    }
    let positions = builder
        .updaters
        .into_iter()
        .enumerate()
        .map(|(index, updater)| Position::new(index, updater))
        .collect();
    Ok(Built {
        positions,
        tags: builder.tags,
        keyed: builder.keyed,
    })
}

struct Builder<'a> {
    ctx: &'a Rc<RenderContext>,
    values: &'a [Value],
    updaters: Vec<Updater>,
    tags: BuiltTags,
    keyed: Vec<KeyedElement>,
}

impl Builder<'_> {
    fn node(&mut self, node: &Node, parent: NodeId, namespace: Namespace) -> Result<(), RenderError> {
        let ctx = self.ctx;
        let dom = ctx.dom();
        match node {
            Node::Root { children } => {
                for child in children {
                    self.node(child, parent, namespace)?;
                }
            }
            Node::Text { text } => {
                let text = dom.create_text(text);
                dom.insert_child(text, parent, None);
            }
            Node::ChildSlot => {
                let marker = dom.insert_marker(parent, None);
                self.updaters
                    .push(Updater::Child(ChildUpdater::new(marker, namespace)));
            }
            Node::NullSlot => self.updaters.push(Updater::Comment),
            Node::Element {
                tag,
                attributes,
                children,
            } => self.element(tag, attributes, children, parent, namespace)?,
        }
        Ok(())
    }

    fn element(
        &mut self,
        tag: &Tag,
        attributes: &[Attribute],
        children: &[Node],
        parent: NodeId,
        namespace: Namespace,
    ) -> Result<(), RenderError> {
        let ctx = self.ctx;
        let dom = ctx.dom();
        let name: Rc<str> = match tag {
            Tag::Static(name) => name.as_str().into(),
            Tag::Dynamic => {
                let position = self.updaters.len();
                let name = match self.values.get(position) {
                    Some(Value::Text(name)) => name.clone(),
                    other => {
                        return Err(RenderError::InvalidTag {
                            found: other.map_or("nothing", Value::kind_name),
                        });
                    }
                };
                self.tags.push((position, name.clone()));
                self.updaters.push(Updater::Tag(TagUpdater::new(name.clone())));
                name
            }
        };

        let key_attribute = ctx.config().key_attribute.as_str();
        let key = attributes.iter().find_map(|attribute| match attribute {
            Attribute::Static { name, value } if name == key_attribute => Some(value.as_str()),
            _ => None,
        });
        let recycled = key.and_then(|key| ctx.pool().take(dom, key, &name));
        let element = match recycled {
            Some(element) => {
                trace!("[trellis] reusing keyed <{name}> {element}");
                discard_children(dom, element);
                element
            }
            None => dom.create_element(&name, namespace.for_element(&name)),
        };
        if let Some(key) = key {
            self.keyed.push(KeyedElement {
                key: key.into(),
                tag: name.clone(),
                node: element,
            });
        }

        for attribute in attributes {
            self.attribute(attribute, element, key_attribute)?;
        }
        let child_namespace = namespace.for_children_of(&name);
        for child in children {
            self.node(child, element, child_namespace)?;
        }
        dom.insert_child(element, parent, None);
        Ok(())
    }

    fn attribute(
        &mut self,
        attribute: &Attribute,
        element: NodeId,
        key_attribute: &str,
    ) -> Result<(), RenderError> {
        let ctx = self.ctx;
        let dom = ctx.dom();
        match attribute {
            Attribute::Static { name, .. } if name == key_attribute => {}
            Attribute::Static { name, value } => {
                write_attribute(dom, element, name, &Scalar::Text(value.as_str().into()));
            }
            Attribute::Value { name } => self
                .updaters
                .push(Updater::Attribute(AttributeUpdater::new(element, name))),
            Attribute::Map => self
                .updaters
                .push(Updater::AttributeMap(AttributeMapUpdater::new(element))),
            Attribute::Parts { name, strings } if strings.len() < 2 => {
                let value = strings.concat();
                write_attribute(dom, element, name, &Scalar::Text(value.into()));
            }
            Attribute::Parts { name, strings } => {
                let parts = AttributeParts::new(element, name, strings);
                for index in 0..strings.len() - 1 {
                    self.updaters.push(Updater::AttributePart(AttributePartUpdater::new(
                        parts.clone(),
                        index,
                    )));
                }
            }
            Attribute::Null => self.updaters.push(Updater::Comment),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use crate::test_support::context;

    fn template(root: Node) -> std::sync::Arc<Template> {
        Template::new(root).unwrap()
    }

    #[test]
    fn positions_follow_pre_order() {
        let (ctx, doc) = context();
        let template = template(
            Node::dynamic_element()
                .with_attribute(Attribute::value("title"))
                .with_child(Node::child_slot())
                .with_child(Node::element("b").with_attribute(Attribute::Null)),
        );
        let values = [Value::text("section"), Value::Null, Value::Null, Value::Null];
        let fragment = doc.create_fragment();
        let built = build(&ctx, &template, &values, fragment, Namespace::Html).unwrap();

        assert_eq!(built.positions.len(), 4);
        assert_eq!(built.tags.as_slice(), &[(0, Rc::from("section"))]);
        assert_eq!(doc.inner_html(fragment), "<section><b></b></section>");
    }

    #[test]
    fn dynamic_tag_must_be_text() {
        let (ctx, doc) = context();
        let template = template(Node::dynamic_element());
        let fragment = doc.create_fragment();
        let error = build(&ctx, &template, &[Value::from(1)], fragment, Namespace::Html)
            .err()
            .unwrap();
        assert_eq!(error, RenderError::InvalidTag { found: "number" });
    }

    #[test]
    fn static_attributes_skip_key() {
        let (ctx, doc) = context();
        let template = template(
            Node::element("li")
                .with_attribute(Attribute::static_value("key", "a"))
                .with_attribute(Attribute::static_value("class", "row"))
                .with_attribute(Attribute::static_value("value", "7")),
        );
        let fragment = doc.create_fragment();
        let built = build(&ctx, &template, &[], fragment, Namespace::Html).unwrap();

        let item = doc.first_child_of(fragment).unwrap();
        assert_eq!(built.keyed.len(), 1);
        assert_eq!(built.keyed[0].node, item);
        assert_eq!(&*built.keyed[0].key, "a");
        assert_eq!(doc.attribute(item, "key"), None);
        assert_eq!(doc.attribute(item, "class").as_deref(), Some("row"));
        assert_eq!(doc.property(item, "value"), Some(Scalar::Text("7".into())));
    }

    #[test]
    fn svg_children_get_svg_namespace() {
        let (ctx, doc) = context();
        let template = template(
            Node::element("svg").with_child(
                Node::element("foreignObject").with_child(Node::element("div")),
            ),
        );
        let fragment = doc.create_fragment();
        build(&ctx, &template, &[], fragment, Namespace::Html).unwrap();

        let svg = doc.first_child_of(fragment).unwrap();
        let foreign = doc.first_child_of(svg).unwrap();
        let div = doc.first_child_of(foreign).unwrap();
        assert_eq!(doc.namespace_of(svg), Namespace::Svg);
        assert_eq!(doc.namespace_of(foreign), Namespace::Svg);
        assert_eq!(doc.namespace_of(div), Namespace::Html);
    }
}
