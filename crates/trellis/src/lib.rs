//! Incremental template rendering onto live document trees.
//!
//! A [`Template`] describes static structure with holes. Pairing it with one
//! value per hole gives a [`TemplateResult`]; the [`Renderer`] builds it into a
//! target node once and afterwards only touches the positions whose values
//! changed. Any position may also take an async source ([`Deferred`],
//! [`Observable`], [`Sequence`]); only the latest binding of a position ever
//! applies.
//!
//! The live tree is reached through the [`Dom`] trait. [`VirtualDocument`] is
//! the in-memory implementation.

mod builder;
mod cancel;
mod config;
mod context;
mod dom;
mod error;
mod pending;
mod recycle;
mod render;
mod slot;
mod source;
mod updater;
mod value;
mod vdom;

pub use config::RenderConfig;
pub use context::RenderContext;
pub use dom::{Dom, Namespace, NodeId, Scalar, format_number};
pub use error::{RenderError, SourceError};
pub use render::{Renderer, RendererBuilder};
pub use slot::{CustomSlot, SlotProvider};
pub use source::{
    Deferred, Notification, Observable, Observer, Resolver, Sequence, SequenceSender, Subject,
    Subscribe, Subscription,
};
pub use value::{Key, TemplateResult, Value, html};
pub use vdom::{DocumentStats, VirtualDocument};

pub use trellis_template::{
    Attribute, Node, Tag, Template, TemplateError, TemplateId, TemplateRegistry,
};

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures::executor::LocalPool;

    use crate::config::RenderConfig;
    use crate::context::{RenderContext, log_error};
    use crate::error::RenderError;
    use crate::vdom::VirtualDocument;

    /// Context over a fresh document. Its executor is already shut down, so
    /// only synchronous paths can be exercised with it.
    pub(crate) fn context() -> (Rc<RenderContext>, Rc<VirtualDocument>) {
        let doc = Rc::new(VirtualDocument::new());
        let spawner = LocalPool::new().spawner();
        let ctx = RenderContext::new(
            doc.clone(),
            Rc::new(spawner),
            RenderConfig::default(),
            Rc::new(log_error),
        );
        (Rc::new(ctx), doc)
    }

    pub(crate) struct Harness {
        pub(crate) ctx: Rc<RenderContext>,
        pub(crate) doc: Rc<VirtualDocument>,
        pub(crate) pool: LocalPool,
        pub(crate) errors: Rc<RefCell<Vec<RenderError>>>,
    }

    /// Context with a live executor and a collecting error handler.
    pub(crate) fn harness() -> Harness {
        let doc = Rc::new(VirtualDocument::new());
        let pool = LocalPool::new();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        let ctx = RenderContext::new(
            doc.clone(),
            Rc::new(pool.spawner()),
            RenderConfig::default(),
            Rc::new(move |error: &RenderError| sink.borrow_mut().push(error.clone())),
        );
        Harness {
            ctx: Rc::new(ctx),
            doc,
            pool,
            errors,
        }
    }
}
