//! rx-realtime — push-based reactive streams over a callback-based
//! realtime-database client, plus an ordered, locally synchronized view of a
//! reference's children.
//!
//! The external client is modelled by the [`source::traits`] contracts; an
//! in-memory realtime database ([`source::memory::MemoryDb`]) implements them
//! so the crate works end to end without a network client.
//!
//! # Modules
//!
//! - [`error`] — error taxonomy and crate [`Result`](error::Result).
//! - [`types`] — [`EventKind`](types::EventKind), auth state types.
//! - [`record`] — normalized [`ChildRecord`](record::ChildRecord) and the
//!   snapshot unpacking policy.
//! - [`observable`] — cold cancellable push streams.
//! - [`sync_list`] — the ordered child-list container.
//! - [`observe`] — the adapter factories (`observe`, `observe_children`,
//!   `observe_auth`).
//! - [`source`] — external collaborator contracts + in-memory database.

pub mod error;
pub mod types;

pub mod observable;
pub mod observe;
pub mod record;
pub mod source;
pub mod sync_list;

pub use error::{Error, PathError, Result, SourceError};
pub use observable::{Observable, Observer, Subscription, Unsubscribe};
pub use observe::{observe, observe_auth, observe_children, RxRef};
pub use record::{ChildRecord, ChildValue, Unpack};
pub use sync_list::SyncList;
pub use types::{AuthState, AuthUser, EventKind, ListenerId};
