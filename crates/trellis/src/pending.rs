//! Async resolution layer.
//!
//! Every dynamic position is a [`Position`]: one updater plus at most one
//! pending subscription. Binding a new value cancels whatever the position
//! was waiting on, so only the latest binding can ever apply. Re-binding the
//! source that is already pending is a no-op.

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::stream::StreamExt;

use crate::cancel::{CancelToken, Cancellable};
use crate::context::RenderContext;
use crate::error::RenderError;
use crate::recycle::KeyedElement;
use crate::source::{Deferred, Notification, Observable, Observer, Sequence, Subscription};
use crate::updater::Updater;
use crate::value::Value;

/// How a bound value reaches its updater.
pub(crate) enum Resolution {
    Ready(Value),
    Deferred(Deferred),
    Stream(Observable),
    Sequence(Sequence),
}

pub(crate) fn classify(value: Value) -> Resolution {
    match value {
        Value::Deferred(deferred) => Resolution::Deferred(deferred),
        Value::Stream(stream) => Resolution::Stream(stream),
        Value::Sequence(sequence) => Resolution::Sequence(sequence),
        ready => Resolution::Ready(ready),
    }
}

enum Source {
    Deferred(Deferred),
    Stream(Observable),
    Sequence(Sequence),
}

impl Source {
    fn is(&self, value: &Value) -> bool {
        match (self, value) {
            (Source::Deferred(a), Value::Deferred(b)) => a.ptr_eq(b),
            (Source::Stream(a), Value::Stream(b)) => a.ptr_eq(b),
            (Source::Sequence(a), Value::Sequence(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

struct Pending {
    source: Source,
    token: CancelToken,
    subscription: Option<Subscription>,
}

/// One dynamic position of a built template.
pub(crate) struct Position {
    index: usize,
    updater: RefCell<Updater>,
    pending: RefCell<Option<Pending>>,
}

impl Position {
    pub(crate) fn new(index: usize, updater: Updater) -> Rc<Self> {
        Rc::new(Self {
            index,
            updater: RefCell::new(updater),
            pending: RefCell::new(None),
        })
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Cancels the pending subscription and everything nested below.
    pub(crate) fn cancel_updates(&self) {
        self.cancel_pending();
        // An updater that is mid-update is cancelled by whoever holds it
        if let Ok(mut updater) = self.updater.try_borrow_mut() {
            updater.cancel_updates();
        }
    }

    pub(crate) fn collect_keyed(&self, out: &mut Vec<KeyedElement>) {
        if let Ok(updater) = self.updater.try_borrow() {
            updater.collect_keyed(out);
        }
    }

    fn apply(&self, ctx: &Rc<RenderContext>, value: Value) -> Result<(), RenderError> {
        if value.is_async() {
            return Err(RenderError::NestedSource {
                found: value.kind_name(),
            });
        }
        let mut updater = self
            .updater
            .try_borrow_mut()
            .map_err(|_| RenderError::Reentrant {
                position: self.index,
            })?;
        updater.update(ctx, value)
    }

    fn bind(&self, source: Source, token: &CancelToken) {
        self.pending.replace(Some(Pending {
            source,
            token: token.clone(),
            subscription: None,
        }));
    }

    /// Clears the pending entry if it still belongs to `token`.
    fn settle(&self, token: &CancelToken) {
        let finished = {
            let mut pending = self.pending.borrow_mut();
            let owned = pending
                .as_ref()
                .is_some_and(|current| current.token.ptr_eq(token));
            if owned { pending.take() } else { None }
        };
        drop(finished);
    }

    fn cancel_pending(&self) {
        let pending = self.pending.borrow_mut().take();
        if let Some(pending) = pending {
            pending.token.cancel();
        }
    }
}

/// Binds `value` to `position`, replacing whatever it was waiting on.
///
/// Ready values apply synchronously and their errors are returned. Async
/// sources apply later; their failures go to the context's error handler.
pub(crate) fn resolve(
    ctx: &Rc<RenderContext>,
    position: &Rc<Position>,
    value: Value,
) -> Result<(), RenderError> {
    let unchanged = position
        .pending
        .borrow()
        .as_ref()
        .is_some_and(|pending| pending.source.is(&value));
    if unchanged {
        return Ok(());
    }
    position.cancel_pending();

    match classify(value) {
        Resolution::Ready(value) => position.apply(ctx, value),
        Resolution::Deferred(deferred) => resolve_deferred(ctx, position, deferred),
        Resolution::Stream(stream) => resolve_stream(ctx, position, stream),
        Resolution::Sequence(sequence) => resolve_sequence(ctx, position, sequence),
    }
}

fn resolve_deferred(
    ctx: &Rc<RenderContext>,
    position: &Rc<Position>,
    deferred: Deferred,
) -> Result<(), RenderError> {
    let token = CancelToken::new();
    let settled = Cancellable::new(deferred.future(), token.clone());
    position.bind(Source::Deferred(deferred), &token);

    let task_ctx = ctx.clone();
    let weak = Rc::downgrade(position);
    let task_token = token.clone();
    let spawned = ctx.spawn(async move {
        let Some(outcome) = settled.await else { return };
        let Some(position) = weak.upgrade() else { return };
        position.settle(&task_token);
        // A deferred value resolving to another source is bound in turn
        let result = outcome
            .map_err(RenderError::Source)
            .and_then(|value| resolve(&task_ctx, &position, value));
        if let Err(error) = result {
            task_ctx.report(error);
        }
    });
    if spawned.is_err() {
        position.settle(&token);
    }
    spawned
}

fn resolve_stream(
    ctx: &Rc<RenderContext>,
    position: &Rc<Position>,
    stream: Observable,
) -> Result<(), RenderError> {
    let token = CancelToken::new();
    position.bind(Source::Stream(stream.clone()), &token);

    let observer = {
        let ctx = ctx.clone();
        let weak = Rc::downgrade(position);
        let token = token.clone();
        Observer::new(move |notification| {
            if token.is_cancelled() {
                return;
            }
            let Some(position) = weak.upgrade() else { return };
            match notification {
                Notification::Next(value) => {
                    if let Err(error) = position.apply(&ctx, value) {
                        ctx.report(error);
                    }
                }
                Notification::Error(error) => {
                    position.settle(&token);
                    ctx.report(RenderError::Source(error));
                }
                Notification::Complete => position.settle(&token),
            }
        })
    };

    // The source may notify, complete, or even trigger a re-bind synchronously
    let subscription = stream.subscribe(observer);
    let orphaned = {
        let mut pending = position.pending.borrow_mut();
        match pending.as_mut() {
            Some(current) if current.token.ptr_eq(&token) => {
                current.subscription = Some(subscription);
                None
            }
            _ => Some(subscription),
        }
    };
    drop(orphaned);
    Ok(())
}

fn resolve_sequence(
    ctx: &Rc<RenderContext>,
    position: &Rc<Position>,
    sequence: Sequence,
) -> Result<(), RenderError> {
    let Some(items) = sequence.take() else {
        return Err(RenderError::SequenceConsumed);
    };
    let token = CancelToken::new();
    let mut items = Cancellable::new(items, token.clone());
    position.bind(Source::Sequence(sequence), &token);

    let task_ctx = ctx.clone();
    let weak = Rc::downgrade(position);
    let task_token = token.clone();
    let spawned = ctx.spawn(async move {
        while let Some(item) = items.next().await {
            let Some(position) = weak.upgrade() else { return };
            match item {
                Ok(value) => {
                    if let Err(error) = position.apply(&task_ctx, value) {
                        task_ctx.report(error);
                    }
                }
                Err(error) => {
                    position.settle(&task_token);
                    task_ctx.report(RenderError::Source(error));
                    return;
                }
            }
        }
        if let Some(position) = weak.upgrade() {
            position.settle(&task_token);
        }
    });
    if spawned.is_err() {
        position.settle(&token);
    }
    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Dom, Namespace, NodeId};
    use crate::error::SourceError;
    use crate::source::Subject;
    use crate::test_support::{Harness, harness};
    use crate::updater::AttributeUpdater;

    fn title_position(h: &Harness) -> (Rc<Position>, NodeId) {
        let element = h.doc.create_element("div", Namespace::Html);
        let updater = Updater::Attribute(AttributeUpdater::new(element, "title"));
        (Position::new(0, updater), element)
    }

    #[test]
    fn deferred_applies_once_settled() {
        let mut h = harness();
        let (position, element) = title_position(&h);
        let (deferred, resolver) = Deferred::channel();

        resolve(&h.ctx, &position, deferred.into()).unwrap();
        h.pool.run_until_stalled();
        assert_eq!(h.doc.attribute(element, "title"), None);
        assert!(position.is_pending());

        resolver.resolve("ready");
        h.pool.run_until_stalled();
        assert_eq!(h.doc.attribute(element, "title").as_deref(), Some("ready"));
        assert!(!position.is_pending());
    }

    #[test]
    fn superseded_deferred_is_discarded() {
        let mut h = harness();
        let (position, element) = title_position(&h);
        let (deferred, resolver) = Deferred::channel();

        resolve(&h.ctx, &position, deferred.into()).unwrap();
        resolve(&h.ctx, &position, Value::from("latest")).unwrap();
        resolver.resolve("stale");
        h.pool.run_until_stalled();

        assert_eq!(h.doc.attribute(element, "title").as_deref(), Some("latest"));
        assert!(h.errors.borrow().is_empty());
    }

    #[test]
    fn rebinding_pending_source_keeps_subscription() {
        let h = harness();
        let (position, element) = title_position(&h);
        let subject = Subject::new();

        resolve(&h.ctx, &position, subject.observable().into()).unwrap();
        resolve(&h.ctx, &position, subject.observable().into()).unwrap();
        assert_eq!(subject.observer_count(), 1);

        subject.next("one");
        subject.next("two");
        assert_eq!(h.doc.attribute(element, "title").as_deref(), Some("two"));

        resolve(&h.ctx, &position, Value::Null).unwrap();
        assert_eq!(subject.observer_count(), 0);
        subject.next("three");
        assert_eq!(h.doc.attribute(element, "title"), None);
    }

    #[test]
    fn deferred_stream_is_flattened() {
        let mut h = harness();
        let (position, element) = title_position(&h);
        let subject = Subject::new();

        let deferred = Deferred::resolved(subject.observable());
        resolve(&h.ctx, &position, deferred.into()).unwrap();
        h.pool.run_until_stalled();
        assert_eq!(subject.observer_count(), 1);

        subject.next("pushed");
        assert_eq!(h.doc.attribute(element, "title").as_deref(), Some("pushed"));
    }

    #[test]
    fn pushed_sources_are_rejected() {
        let h = harness();
        let (position, _) = title_position(&h);
        let subject = Subject::new();

        resolve(&h.ctx, &position, subject.observable().into()).unwrap();
        subject.next(Deferred::resolved("nested"));
        assert_eq!(
            *h.errors.borrow(),
            vec![RenderError::NestedSource {
                found: "deferred value"
            }]
        );
    }

    #[test]
    fn failures_reach_the_error_handler() {
        let mut h = harness();
        let (position, _) = title_position(&h);

        resolve(&h.ctx, &position, Deferred::rejected(SourceError::new("offline")).into())
            .unwrap();
        h.pool.run_until_stalled();
        assert_eq!(
            *h.errors.borrow(),
            vec![RenderError::Source(SourceError::new("offline"))]
        );
        assert!(!position.is_pending());
    }

    #[test]
    fn sequence_binds_once() {
        let mut h = harness();
        let (position, element) = title_position(&h);
        let sequence = Sequence::from_values([Value::from("a"), Value::from("b")]);

        resolve(&h.ctx, &position, sequence.clone().into()).unwrap();
        h.pool.run_until_stalled();
        assert_eq!(h.doc.attribute(element, "title").as_deref(), Some("b"));

        let (other, _) = title_position(&h);
        assert_eq!(
            resolve(&h.ctx, &other, sequence.into()),
            Err(RenderError::SequenceConsumed)
        );
    }
}
