//! Cooperative cancellation.
//!
//! Nothing is interrupted. A cancelled token is checked before every apply,
//! and [`Cancellable`] ends the wrapped future or stream at its next poll, which
//! drops the inner source and so requests its early termination.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures_util::stream::Stream;

#[derive(Default)]
struct TokenState {
    cancelled: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

/// Shared flag marking one pending subscription as superseded.
#[derive(Clone, Default)]
pub(crate) struct CancelToken(Rc<TokenState>);

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancel(&self) {
        self.0.cancelled.set(true);
        // Wake the owning task so it observes the flag and drops its source
        let waker = self.0.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.cancelled.get()
    }

    pub(crate) fn ptr_eq(&self, other: &CancelToken) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn register(&self, waker: &Waker) {
        let mut slot = self.0.waker.borrow_mut();
        if !slot.as_ref().is_some_and(|current| current.will_wake(waker)) {
            *slot = Some(waker.clone());
        }
    }
}

/// Future or stream that finishes as soon as its token is cancelled.
///
/// Values that complete after cancellation are discarded on arrival.
#[pin_project::pin_project]
pub(crate) struct Cancellable<T> {
    #[pin]
    inner: T,
    token: CancelToken,
}

impl<T> Cancellable<T> {
    pub(crate) fn new(inner: T, token: CancelToken) -> Self {
        Self { inner, token }
    }
}

impl<F: Future> Future for Cancellable<F> {
    type Output = Option<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        this.token.register(cx.waker());
        match this.inner.poll(cx) {
            Poll::Ready(_) if this.token.is_cancelled() => Poll::Ready(None),
            Poll::Ready(output) => Poll::Ready(Some(output)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: Stream> Stream for Cancellable<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        this.token.register(cx.waker());
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(_)) if this.token.is_cancelled() => Poll::Ready(None),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::channel::{mpsc, oneshot};
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;

    #[test]
    fn cancelled_future_resolves_to_none() {
        let mut pool = LocalPool::new();
        let (tx, rx) = oneshot::channel::<u32>();
        let token = CancelToken::new();
        let outcome = Rc::new(Cell::new(Some(0)));

        let task_outcome = outcome.clone();
        let future = Cancellable::new(rx, token.clone());
        pool.spawner()
            .spawn_local(async move { task_outcome.set(future.await.map(|r| r.unwrap_or(0))) })
            .unwrap();
        pool.run_until_stalled();

        token.cancel();
        let _ = tx.send(7);
        pool.run_until_stalled();
        assert_eq!(outcome.get(), None);
    }

    #[test]
    fn cancel_drops_inner_stream() {
        let mut pool = LocalPool::new();
        let (tx, rx) = mpsc::unbounded::<u32>();
        let token = CancelToken::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let task_seen = seen.clone();
        let mut stream = Cancellable::new(rx, token.clone());
        pool.spawner()
            .spawn_local(async move {
                while let Some(item) = stream.next().await {
                    task_seen.borrow_mut().push(item);
                }
            })
            .unwrap();

        tx.unbounded_send(1).unwrap();
        pool.run_until_stalled();
        token.cancel();
        pool.run_until_stalled();

        assert_eq!(*seen.borrow(), vec![1]);
        // Receiver was dropped with the finished task
        assert!(tx.is_closed());
    }
}
