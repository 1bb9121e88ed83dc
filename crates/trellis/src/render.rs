//! Top-level renderer and its instance cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_util::task::LocalSpawn;
use log::debug;

use crate::config::RenderConfig;
use crate::context::{RenderContext, log_error};
use crate::dom::{Dom, NodeId, child_namespace};
use crate::error::RenderError;
use crate::slot::Slot;
use crate::slot::template::TemplateSlot;
use crate::value::Value;

/// Renders template values into container nodes.
///
/// Each target keeps the instance built by its last render. Rendering a value
/// built from the same template again only updates the positions that changed;
/// a different template replaces the instance.
///
/// ```ignore
/// let renderer = Renderer::new(doc.clone(), Rc::new(pool.spawner()));
/// renderer.render(doc.body(), html(&greeting, [Value::from("world")])?)?;
/// ```
pub struct Renderer {
    ctx: Rc<RenderContext>,
    instances: RefCell<HashMap<NodeId, Slot>>,
}

impl Renderer {
    pub fn new(dom: Rc<dyn Dom>, spawner: Rc<dyn LocalSpawn>) -> Self {
        Self::builder(dom, spawner).build()
    }

    pub fn builder(dom: Rc<dyn Dom>, spawner: Rc<dyn LocalSpawn>) -> RendererBuilder {
        RendererBuilder {
            dom,
            spawner,
            config: RenderConfig::default(),
            on_error: Rc::new(log_error),
        }
    }

    pub fn context(&self) -> &Rc<RenderContext> {
        &self.ctx
    }

    /// Renders `value` into `target`.
    ///
    /// Errors from values that are already resolved are returned here. Errors
    /// raised later by async sources go to the renderer's error handler.
    pub fn render(&self, target: NodeId, value: impl Into<Value>) -> Result<(), RenderError> {
        let value = value.into();
        let result = match &value {
            Value::Template(result) => result.clone(),
            other => {
                return Err(RenderError::NotATemplate {
                    found: other.kind_name(),
                });
            }
        };
        let dom = self.ctx.dom();
        if !dom.can_have_children(target) {
            return Err(RenderError::InvalidTarget(target));
        }

        // Taken out of the cache so nested callbacks never see it borrowed
        let existing = self.instances.borrow_mut().remove(&target);
        match existing {
            Some(mut instance) if instance.matches(&value) => {
                let outcome = instance.update(&self.ctx, value);
                self.instances.borrow_mut().insert(target, instance);
                outcome
            }
            existing => {
                match existing {
                    Some(instance) => {
                        debug!("[trellis] template changed on {target}, rebuilding");
                        instance.destroy(&self.ctx);
                    }
                    None if self.ctx.config().clear_target => dom.clear_children(target),
                    None => {}
                }
                let namespace = child_namespace(dom, target);
                let instance = TemplateSlot::create(&self.ctx, &result, target, None, namespace)?;
                self.instances
                    .borrow_mut()
                    .insert(target, Slot::Template(instance));
                Ok(())
            }
        }
    }

    /// Cancels and removes whatever was rendered into `target`.
    pub fn unmount(&self, target: NodeId) -> bool {
        let instance = self.instances.borrow_mut().remove(&target);
        match instance {
            Some(instance) => {
                instance.destroy(&self.ctx);
                true
            }
            None => false,
        }
    }

    pub fn is_mounted(&self, target: NodeId) -> bool {
        self.instances.borrow().contains_key(&target)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        for instance in self.instances.get_mut().values_mut() {
            instance.cancel_updates();
        }
    }
}

/// Configures a [`Renderer`].
pub struct RendererBuilder {
    dom: Rc<dyn Dom>,
    spawner: Rc<dyn LocalSpawn>,
    config: RenderConfig,
    on_error: Rc<dyn Fn(&RenderError)>,
}

impl RendererBuilder {
    pub fn config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Handler for errors raised by async sources. Defaults to `log::error!`.
    pub fn on_error(mut self, handler: impl Fn(&RenderError) + 'static) -> Self {
        self.on_error = Rc::new(handler);
        self
    }

    pub fn build(self) -> Renderer {
        Renderer {
            ctx: Rc::new(RenderContext::new(
                self.dom,
                self.spawner,
                self.config,
                self.on_error,
            )),
            instances: RefCell::new(HashMap::new()),
        }
    }
}
