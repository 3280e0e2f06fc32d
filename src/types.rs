use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// The five event categories a realtime-database reference can be watched
/// for. The external client's string literals map 1:1 onto these variants, so
/// an unrecognized category is unrepresentable past the source boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The whole value at the reference changed.
    Value,
    /// A child appeared under the reference.
    ChildAdded,
    /// A child was deleted.
    ChildRemoved,
    /// A child's value changed in place.
    ChildChanged,
    /// A child's sort position changed.
    ChildMoved,
}

impl EventKind {
    /// The wire literal used by callback-based clients.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::ChildAdded => "child_added",
            Self::ChildRemoved => "child_removed",
            Self::ChildChanged => "child_changed",
            Self::ChildMoved => "child_moved",
        }
    }

    /// The four child events, in the order `observe_children` subscribes to
    /// them.
    pub const CHILD_EVENTS: [EventKind; 4] = [
        Self::ChildAdded,
        Self::ChildRemoved,
        Self::ChildChanged,
        Self::ChildMoved,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Listener identity
// ---------------------------------------------------------------------------

/// Token returned by `EventSource::on` / `AuthSource::on_auth_state_changed`
/// and passed back to the matching `off` call. Replaces the JS-style removal
/// by function identity.
pub type ListenerId = u64;

// ---------------------------------------------------------------------------
// Auth state
// ---------------------------------------------------------------------------

/// The authenticated principal, as reported by the external auth client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    /// Identity provider, e.g. `"password"` or `"anonymous"`.
    pub provider: String,
}

/// Current authentication status. `SignedOut` is a real emitted state, not an
/// absence of emission — subscribers always learn the status at subscribe
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    SignedOut,
    SignedIn(AuthUser),
}

impl AuthState {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::SignedOut => None,
            Self::SignedIn(user) => Some(user),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }
}
