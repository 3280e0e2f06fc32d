//! Cold, cancellable push streams.
//!
//! An [`Observable<T>`] performs no external work at construction. Each
//! [`subscribe`](Observable::subscribe) call runs the subscribe function
//! independently (registering its own external listener) and returns a
//! [`Subscription`] whose `cancel()` runs the teardown exactly once.
//!
//! # Threading model
//!
//! Handlers are `Arc<dyn Fn(..) + Send + Sync>`; observers carry a shared
//! termination flag so that `error`/`complete` fire at most once and nothing
//! is delivered afterwards. The subscription's teardown sits behind a
//! `parking_lot::Mutex<Option<..>>` — repeat `cancel()` calls take nothing
//! and do nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SourceError;

/// An owned one-shot closure that tears a subscription down when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

// ============================================================================
// Observer
// ============================================================================

/// The consumer side of a subscription: next/error/complete callbacks plus a
/// shared termination flag.
pub struct Observer<T> {
    on_next: Arc<dyn Fn(T) + Send + Sync>,
    on_error: Arc<dyn Fn(SourceError) + Send + Sync>,
    on_complete: Arc<dyn Fn() + Send + Sync>,
    done: Arc<AtomicBool>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            on_next: Arc::clone(&self.on_next),
            on_error: Arc::clone(&self.on_error),
            on_complete: Arc::clone(&self.on_complete),
            done: Arc::clone(&self.done),
        }
    }
}

impl<T> Observer<T> {
    pub fn new(
        on_next: Arc<dyn Fn(T) + Send + Sync>,
        on_error: Arc<dyn Fn(SourceError) + Send + Sync>,
        on_complete: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            on_next,
            on_error,
            on_complete,
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver an item. Dropped silently after termination.
    pub fn next(&self, item: T) {
        if !self.done.load(Ordering::Acquire) {
            (self.on_next)(item);
        }
    }

    /// Terminate with `err`. Only the first terminal signal is delivered.
    pub fn error(&self, err: SourceError) {
        if !self.done.swap(true, Ordering::AcqRel) {
            (self.on_error)(err);
        }
    }

    /// Terminate normally. Only the first terminal signal is delivered.
    pub fn complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            (self.on_complete)();
        }
    }

    /// Whether a terminal signal has been delivered.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle returned by [`Observable::subscribe`].
///
/// `cancel()` runs the teardown closure at most once; repeat calls are
/// no-ops. Dropping the handle without cancelling leaves the external
/// listener registered — the caller owns the subscription lifecycle, as in
/// the callback contract this crate adapts.
pub struct Subscription {
    teardown: Mutex<Option<Unsubscribe>>,
}

impl Subscription {
    fn new(teardown: Unsubscribe) -> Self {
        Self {
            teardown: Mutex::new(Some(teardown)),
        }
    }

    /// Run the teardown if it has not run yet.
    pub fn cancel(&self) {
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.teardown.lock().is_none()
    }
}

// ============================================================================
// Observable
// ============================================================================

/// A cold stream of `T`.
///
/// Constructing one performs no side effect; each `subscribe` call invokes
/// the subscribe function with a fresh observer and wraps the returned
/// teardown in a [`Subscription`].
pub struct Observable<T> {
    on_subscribe: Arc<dyn Fn(Observer<T>) -> Unsubscribe + Send + Sync>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            on_subscribe: Arc::clone(&self.on_subscribe),
        }
    }
}

impl<T: 'static> Observable<T> {
    pub fn new(on_subscribe: impl Fn(Observer<T>) -> Unsubscribe + Send + Sync + 'static) -> Self {
        Self {
            on_subscribe: Arc::new(on_subscribe),
        }
    }

    /// Subscribe with next/error/complete callbacks.
    pub fn subscribe_with(
        &self,
        on_next: impl Fn(T) + Send + Sync + 'static,
        on_error: impl Fn(SourceError) + Send + Sync + 'static,
        on_complete: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let observer = Observer::new(Arc::new(on_next), Arc::new(on_error), Arc::new(on_complete));
        let teardown = (self.on_subscribe)(observer);
        Subscription::new(teardown)
    }

    /// Subscribe with a next callback only. Terminal errors are logged.
    pub fn subscribe(&self, on_next: impl Fn(T) + Send + Sync + 'static) -> Subscription {
        self.subscribe_with(
            on_next,
            |err| {
                tracing::warn!(
                    code = %err.code,
                    path = %err.path,
                    "unhandled stream error: {}",
                    err.message
                );
            },
            || {},
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn nothing_runs_until_subscribe() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let obs: Observable<i32> = Observable::new(move |_observer| {
            ran_clone.store(true, Ordering::SeqCst);
            Box::new(|| {})
        });

        assert!(!ran.load(Ordering::SeqCst));
        let sub = obs.subscribe(|_| {});
        assert!(ran.load(Ordering::SeqCst));
        sub.cancel();
    }

    #[test]
    fn cancel_is_idempotent() {
        let teardowns = Arc::new(AtomicBool::new(false));
        let teardowns_clone = Arc::clone(&teardowns);

        let obs: Observable<i32> = Observable::new(move |_observer| {
            let flag = Arc::clone(&teardowns_clone);
            Box::new(move || {
                assert!(!flag.swap(true, Ordering::SeqCst), "teardown ran twice");
            })
        });

        let sub = obs.subscribe(|_| {});
        sub.cancel();
        sub.cancel();
        assert!(sub.is_cancelled());
    }

    #[test]
    fn no_next_after_error() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let errors = Arc::new(StdMutex::new(Vec::new()));

        let obs: Observable<i32> = Observable::new(|observer| {
            observer.next(1);
            observer.error(SourceError::new("cancelled", "gone", "items"));
            observer.next(2);
            observer.error(SourceError::new("cancelled", "gone again", "items"));
            Box::new(|| {})
        });

        let seen_clone = Arc::clone(&seen);
        let errors_clone = Arc::clone(&errors);
        let sub = obs.subscribe_with(
            move |n| seen_clone.lock().unwrap().push(n),
            move |e| errors_clone.lock().unwrap().push(e),
            || {},
        );

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(errors.lock().unwrap().len(), 1);
        sub.cancel();
    }

    #[test]
    fn each_subscription_runs_the_subscribe_fn_independently() {
        let runs = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let runs_clone = Arc::clone(&runs);

        let obs: Observable<i32> = Observable::new(move |_observer| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Box::new(|| {})
        });

        let first = obs.subscribe(|_| {});
        let second = obs.subscribe(|_| {});

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        first.cancel();
        second.cancel();
    }
}
