//! The adapter factories: callback registration turned into cold streams.
//!
//! - [`observe`] — one reference + one event kind → a stream of normalized
//!   [`ChildRecord`]s. Each subscription registers exactly one external
//!   listener and deregisters it exactly once on cancel or error.
//! - [`observe_children`] — one reference → a stream of ordered
//!   [`SyncList`] snapshots, folding the four child-event streams in arrival
//!   order. Emits an empty snapshot synchronously at subscribe time.
//! - [`observe_auth`] — auth status stream; the first emission is the
//!   currently-known status, read synchronously at subscribe time.
//!
//! None of these mutate the external client: the source is an explicit `Arc`
//! parameter, and [`RxRef`] is just a convenience bundle of source + policy.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::observable::{Observable, Subscription};
use crate::record::{ChildRecord, Unpack};
use crate::source::traits::{
    AuthHandler, AuthSource, EventSource, SnapshotHandler, SourceErrorHandler,
};
use crate::sync_list::SyncList;
use crate::types::{AuthState, EventKind, ListenerId};

// ============================================================================
// observe
// ============================================================================

/// Cold stream of normalized records for one (reference, event kind) pair.
///
/// Subscribing performs the external `on`; cancelling performs the matching
/// `off`. A source error deregisters the listener first, then terminates the
/// stream with the error. Every subscription is independent.
pub fn observe<S>(source: &Arc<S>, kind: EventKind, policy: Unpack) -> Observable<ChildRecord>
where
    S: EventSource + ?Sized + 'static,
{
    let source = Arc::clone(source);

    Observable::new(move |observer| {
        // Shared registration slot: whichever of {teardown, error handler}
        // runs first takes the ID and performs the single `off`.
        let registration: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let handler: SnapshotHandler = {
            let observer = observer.clone();
            Arc::new(move |snapshot, prev| {
                observer.next(ChildRecord::from_snapshot(
                    snapshot,
                    prev.map(str::to_string),
                    kind,
                    policy,
                ));
            })
        };

        let on_error: SourceErrorHandler = {
            let source = Arc::clone(&source);
            let registration = Arc::clone(&registration);
            let observer = observer.clone();
            Arc::new(move |err| {
                tracing::warn!(
                    path = %err.path,
                    event = %kind,
                    code = %err.code,
                    "source cancelled listener, terminating stream"
                );
                if let Some(id) = registration.lock().take() {
                    source.off(kind, id);
                }
                observer.error(err);
            })
        };

        let id = source.on(kind, handler, on_error);
        {
            let mut slot = registration.lock();
            *slot = Some(id);
            // The source may have errored during registration; if so the
            // handler could not deregister (no ID yet) — do it here.
            if observer.is_done() {
                if let Some(id) = slot.take() {
                    source.off(kind, id);
                }
            }
        }

        let source = Arc::clone(&source);
        Box::new(move || {
            if let Some(id) = registration.lock().take() {
                source.off(kind, id);
            }
        })
    })
}

// ============================================================================
// observe_children
// ============================================================================

/// Cold stream of ordered child-list snapshots for one reference.
///
/// Subscribing emits an empty [`SyncList`] immediately, then subscribes to
/// the four child-event streams; each incoming record is folded into the
/// running list and a cloned snapshot is emitted. Cancelling cascades to all
/// four underlying listeners; a source error on any of them cancels the
/// others and terminates the combined stream.
pub fn observe_children<S>(source: &Arc<S>, policy: Unpack) -> Observable<SyncList>
where
    S: EventSource + ?Sized + 'static,
{
    let source = Arc::clone(source);

    Observable::new(move |observer| {
        let list = Arc::new(Mutex::new(SyncList::new()));

        // Defined starting state before any event.
        observer.next(SyncList::new());

        let subscriptions: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        for kind in EventKind::CHILD_EVENTS {
            let stream = observe(&source, kind, policy);

            let on_next = {
                let list = Arc::clone(&list);
                let observer = observer.clone();
                move |record: ChildRecord| {
                    let snapshot = {
                        let mut guard = list.lock();
                        guard.apply(record);
                        guard.clone()
                    };
                    observer.next(snapshot);
                }
            };

            let on_error = {
                let subscriptions = Arc::clone(&subscriptions);
                let observer = observer.clone();
                move |err| {
                    // The erroring stream already deregistered itself; the
                    // other three still need tearing down.
                    for subscription in subscriptions.lock().iter() {
                        subscription.cancel();
                    }
                    observer.error(err);
                }
            };

            let subscription = stream.subscribe_with(on_next, on_error, || {});
            subscriptions.lock().push(subscription);
        }

        // A synchronous error during registration may have terminated the
        // observer before all four subscriptions were recorded.
        if observer.is_done() {
            for subscription in subscriptions.lock().iter() {
                subscription.cancel();
            }
        }

        let subscriptions = Arc::clone(&subscriptions);
        Box::new(move || {
            for subscription in subscriptions.lock().iter() {
                subscription.cancel();
            }
        })
    })
}

// ============================================================================
// observe_auth
// ============================================================================

/// Cold stream of auth status changes.
///
/// The first emission is the currently-known status, read synchronously at
/// subscribe time — a subscriber never waits for the next sign-in/out to
/// learn where it stands.
pub fn observe_auth<A>(auth: &Arc<A>) -> Observable<AuthState>
where
    A: AuthSource + ?Sized + 'static,
{
    let auth = Arc::clone(auth);

    Observable::new(move |observer| {
        observer.next(auth.current_auth());

        let handler: AuthHandler = {
            let observer = observer.clone();
            Arc::new(move |state: &AuthState| observer.next(state.clone()))
        };
        let id = auth.on_auth_state_changed(handler);

        let auth = Arc::clone(&auth);
        Box::new(move || auth.off_auth_state_changed(id))
    })
}

// ============================================================================
// RxRef
// ============================================================================

/// A reference bundled with an unpacking policy: the per-reference factory
/// surface.
pub struct RxRef<S: EventSource + ?Sized> {
    source: Arc<S>,
    policy: Unpack,
}

impl<S: EventSource + ?Sized> Clone for RxRef<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            policy: self.policy,
        }
    }
}

impl<S: EventSource + ?Sized + 'static> RxRef<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            policy: Unpack::default(),
        }
    }

    pub fn with_policy(source: Arc<S>, policy: Unpack) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Stream of normalized records for `kind`.
    pub fn observe(&self, kind: EventKind) -> Observable<ChildRecord> {
        observe(&self.source, kind, self.policy)
    }

    /// Stream of ordered child-list snapshots.
    pub fn observe_children(&self) -> Observable<SyncList> {
        observe_children(&self.source, self.policy)
    }
}
