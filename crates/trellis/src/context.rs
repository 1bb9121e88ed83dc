use std::cell::{RefCell, RefMut};
use std::future::Future;
use std::rc::Rc;

use futures_util::task::{LocalFutureObj, LocalSpawn};

use crate::config::RenderConfig;
use crate::dom::Dom;
use crate::error::RenderError;
use crate::recycle::RecyclePool;

/// State shared by every slot and updater of one [`Renderer`](crate::Renderer).
pub struct RenderContext {
    dom: Rc<dyn Dom>,
    spawner: Rc<dyn LocalSpawn>,
    config: RenderConfig,
    pool: RefCell<RecyclePool>,
    on_error: Rc<dyn Fn(&RenderError)>,
}

impl RenderContext {
    pub(crate) fn new(
        dom: Rc<dyn Dom>,
        spawner: Rc<dyn LocalSpawn>,
        config: RenderConfig,
        on_error: Rc<dyn Fn(&RenderError)>,
    ) -> Self {
        let pool = RefCell::new(RecyclePool::new(config.recycle_capacity));
        Self {
            dom,
            spawner,
            config,
            pool,
            on_error,
        }
    }

    pub fn dom(&self) -> &dyn Dom {
        &*self.dom
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Routes an error raised outside any caller's stack to the error handler.
    pub fn report(&self, error: RenderError) {
        (self.on_error)(&error)
    }

    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) -> Result<(), RenderError> {
        self.spawner
            .spawn_local_obj(LocalFutureObj::new(Box::new(task)))
            .map_err(|error| RenderError::Spawn(error.to_string()))
    }

    pub(crate) fn pool(&self) -> RefMut<'_, RecyclePool> {
        self.pool.borrow_mut()
    }
}

/// Default error handler.
pub(crate) fn log_error(error: &RenderError) {
    log::error!("[trellis] {error}");
}
