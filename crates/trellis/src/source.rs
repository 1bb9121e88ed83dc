//! Asynchronous value sources.
//!
//! Three shapes can stand in for a value at any dynamic position:
//!
//! - [`Deferred`]: settles once, to a value or an error.
//! - [`Observable`]: push stream; emits until it errors, completes, or the
//!   subscription is dropped.
//! - [`Sequence`]: pull stream; consumed by exactly one binding.
//!
//! All three are reference counted handles compared by identity.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures_channel::{mpsc, oneshot};
use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use futures_util::stream::{self, LocalBoxStream, Stream, StreamExt};

use crate::error::SourceError;
use crate::value::Value;

type Settled = Result<Value, SourceError>;

// --- Deferred ---

/// Value that becomes available once.
#[derive(Clone)]
pub struct Deferred(Rc<Shared<LocalBoxFuture<'static, Settled>>>);

impl Deferred {
    pub fn new(future: impl Future<Output = Settled> + 'static) -> Self {
        Self(Rc::new(future.boxed_local().shared()))
    }

    pub fn resolved(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(async move { Ok(value) })
    }

    pub fn rejected(error: SourceError) -> Self {
        Self::new(async move { Err(error) })
    }

    /// Deferred value settled through the returned [`Resolver`].
    ///
    /// Dropping the resolver without settling rejects the value.
    pub fn channel() -> (Deferred, Resolver) {
        let (tx, rx) = oneshot::channel();
        let deferred = Self::new(async move {
            rx.await
                .unwrap_or_else(|_| Err(SourceError::new("resolver dropped before settling")))
        });
        (deferred, Resolver(tx))
    }

    pub fn ptr_eq(&self, other: &Deferred) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn future(&self) -> Shared<LocalBoxFuture<'static, Settled>> {
        (*self.0).clone()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").field(&Rc::as_ptr(&self.0)).finish()
    }
}

/// Settling half of [`Deferred::channel`].
pub struct Resolver(oneshot::Sender<Settled>);

impl Resolver {
    pub fn resolve(self, value: impl Into<Value>) {
        // Nobody awaiting is fine, the value is simply dropped
        let _ = self.0.send(Ok(value.into()));
    }

    pub fn reject(self, error: SourceError) {
        let _ = self.0.send(Err(error));
    }
}

// --- Observable ---

/// One signal delivered to an [`Observer`].
#[derive(Clone, Debug)]
pub enum Notification {
    Next(Value),
    Error(SourceError),
    Complete,
}

/// Callback receiving notifications from a push stream.
#[derive(Clone)]
pub struct Observer(Rc<dyn Fn(Notification)>);

impl Observer {
    pub fn new(callback: impl Fn(Notification) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn notify(&self, notification: Notification) {
        (self.0)(notification)
    }
}

/// Push source. Implementors deliver notifications to `observer` until the
/// returned [`Subscription`] is dropped.
///
/// Notifications may be delivered synchronously from inside `subscribe`.
pub trait Subscribe {
    fn subscribe(&self, observer: Observer) -> Subscription;
}

/// Handle of a live subscription; unsubscribes when dropped.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription(Option<Box<dyn FnOnce()>>);

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(unsubscribe)))
    }

    /// Subscription with nothing to release.
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.0.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.0.is_some())
            .finish()
    }
}

/// Shared handle to a push source.
#[derive(Clone)]
pub struct Observable(Rc<dyn Subscribe>);

impl Observable {
    pub fn new(source: impl Subscribe + 'static) -> Self {
        Self(Rc::new(source))
    }

    pub fn subscribe(&self, observer: Observer) -> Subscription {
        self.0.subscribe(observer)
    }

    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stream")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

#[derive(Default)]
struct SubjectState {
    observers: Vec<(u64, Observer)>,
    next_id: u64,
    closed: bool,
}

struct SubjectSource(Rc<RefCell<SubjectState>>);

impl Subscribe for SubjectSource {
    fn subscribe(&self, observer: Observer) -> Subscription {
        let id = {
            let mut state = self.0.borrow_mut();
            if state.closed {
                None
            } else {
                let id = state.next_id;
                state.next_id += 1;
                state.observers.push((id, observer.clone()));
                Some(id)
            }
        };
        let Some(id) = id else {
            observer.notify(Notification::Complete);
            return Subscription::empty();
        };
        let state: Weak<RefCell<SubjectState>> = Rc::downgrade(&self.0);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().observers.retain(|(other, _)| *other != id);
            }
        })
    }
}

/// Multicast push source driven by hand.
///
/// Every call to [`Subject::observable`] returns the same source identity.
#[derive(Clone)]
pub struct Subject {
    state: Rc<RefCell<SubjectState>>,
    observable: Observable,
}

impl Subject {
    pub fn new() -> Self {
        let state = Rc::new(RefCell::new(SubjectState::default()));
        let observable = Observable::new(SubjectSource(state.clone()));
        Self { state, observable }
    }

    pub fn observable(&self) -> Observable {
        self.observable.clone()
    }

    pub fn next(&self, value: impl Into<Value>) {
        let value = value.into();
        for observer in self.snapshot() {
            observer.notify(Notification::Next(value.clone()));
        }
    }

    pub fn error(&self, error: SourceError) {
        for observer in self.close() {
            observer.notify(Notification::Error(error.clone()));
        }
    }

    pub fn complete(&self) {
        for observer in self.close() {
            observer.notify(Notification::Complete);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    // Observers may subscribe or unsubscribe while being notified
    fn snapshot(&self) -> Vec<Observer> {
        let state = self.state.borrow();
        if state.closed {
            return Vec::new();
        }
        state.observers.iter().map(|(_, observer)| observer.clone()).collect()
    }

    fn close(&self) -> Vec<Observer> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Vec::new();
        }
        state.closed = true;
        std::mem::take(&mut state.observers)
            .into_iter()
            .map(|(_, observer)| observer)
            .collect()
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

// --- Sequence ---

type Items = LocalBoxStream<'static, Settled>;

/// Pull source consumed by the first binding that receives it.
///
/// Dropping the consumer drops the stream, which is how early termination
/// reaches the producer.
#[derive(Clone)]
pub struct Sequence(Rc<RefCell<Option<Items>>>);

impl Sequence {
    pub fn new(items: impl Stream<Item = Settled> + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(items.boxed_local()))))
    }

    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        Self::new(stream::iter(values.into_iter().map(Ok)))
    }

    /// Sequence fed through the returned [`SequenceSender`]; it ends when the
    /// sender is dropped.
    pub fn channel() -> (Sequence, SequenceSender) {
        let (tx, rx) = mpsc::unbounded();
        (Self::new(rx), SequenceSender(tx))
    }

    pub fn is_consumed(&self) -> bool {
        self.0.borrow().is_none()
    }

    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn take(&self) -> Option<Items> {
        self.0.borrow_mut().take()
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// Producing half of [`Sequence::channel`].
pub struct SequenceSender(mpsc::UnboundedSender<Settled>);

impl SequenceSender {
    /// Returns `false` once the consumer is gone.
    pub fn send(&self, value: impl Into<Value>) -> bool {
        self.0.unbounded_send(Ok(value.into())).is_ok()
    }

    pub fn fail(&self, error: SourceError) -> bool {
        self.0.unbounded_send(Err(error)).is_ok()
    }

    /// Whether the consumer stopped pulling.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::Cell;

    #[test]
    fn deferred_channel_settles_every_clone() {
        let (deferred, resolver) = Deferred::channel();
        let other = deferred.clone();
        assert!(deferred.ptr_eq(&other));
        resolver.resolve("done");
        let first = block_on(deferred.future()).unwrap();
        let second = block_on(other.future()).unwrap();
        assert_eq!(first.as_text(), Some("done"));
        assert_eq!(second.as_text(), Some("done"));
    }

    #[test]
    fn dropped_resolver_rejects() {
        let (deferred, resolver) = Deferred::channel();
        drop(resolver);
        assert!(block_on(deferred.future()).is_err());
    }

    #[test]
    fn subject_multicasts_until_unsubscribed() {
        let subject = Subject::new();
        let seen = Rc::new(Cell::new(0));

        let counter = seen.clone();
        let first = subject.observable().subscribe(Observer::new(move |n| {
            if let Notification::Next(_) = n {
                counter.set(counter.get() + 1);
            }
        }));
        let counter = seen.clone();
        let second = subject.observable().subscribe(Observer::new(move |n| {
            if let Notification::Next(_) = n {
                counter.set(counter.get() + 10);
            }
        }));
        assert_eq!(subject.observer_count(), 2);

        subject.next(1);
        assert_eq!(seen.get(), 11);

        drop(second);
        subject.next(2);
        assert_eq!(seen.get(), 12);
        first.unsubscribe();
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn closed_subject_completes_late_subscribers() {
        let subject = Subject::new();
        subject.complete();
        let completed = Rc::new(Cell::new(false));
        let flag = completed.clone();
        let _subscription = subject.observable().subscribe(Observer::new(move |n| {
            flag.set(matches!(n, Notification::Complete));
        }));
        assert!(completed.get());
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn sequence_is_taken_once() {
        let sequence = Sequence::from_values([Value::from(1), Value::from(2)]);
        let alias = sequence.clone();
        assert!(sequence.take().is_some());
        assert!(alias.is_consumed());
        assert!(alias.take().is_none());
    }
}
