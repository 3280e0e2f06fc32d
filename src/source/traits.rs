//! The contract required from the external data/auth client.
//!
//! The adapter never talks to a concrete client type; anything exposing these
//! two traits can be observed. Listener deregistration uses [`ListenerId`]
//! tokens — the Rust stand-in for the callback-identity matching of the
//! `on(event, cb)` / `off(event, cb)` convention this crate adapts.

use std::sync::Arc;

use serde_json::Value;

use crate::error::SourceError;
use crate::types::{AuthState, EventKind, ListenerId};

// ============================================================================
// SourceSnapshot
// ============================================================================

/// What the external client hands a registered listener: a point-in-time
/// representation of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot {
    /// The node's key (last path segment).
    pub key: String,
    /// Full path of the node.
    pub path: String,
    /// The node's value.
    pub value: Value,
    /// Sort priority, if one was set.
    pub priority: Option<f64>,
}

impl SourceSnapshot {
    /// The export format: the raw value, or a `.value`/`.priority` wrapper
    /// when a priority is attached.
    pub fn export(&self) -> Value {
        match self.priority {
            None => self.value.clone(),
            Some(priority) => {
                let mut map = serde_json::Map::new();
                map.insert(".value".to_string(), self.value.clone());
                map.insert(".priority".to_string(), priority.into());
                Value::Object(map)
            }
        }
    }
}

// ============================================================================
// Handler types
// ============================================================================

/// Listener callback: receives the snapshot and the previous sibling key
/// (`None` for the first position, and always `None` for removals).
pub type SnapshotHandler = Arc<dyn Fn(&SourceSnapshot, Option<&str>) + Send + Sync>;

/// Error callback: the backend cancelled the listener.
pub type SourceErrorHandler = Arc<dyn Fn(SourceError) + Send + Sync>;

/// Auth listener callback.
pub type AuthHandler = Arc<dyn Fn(&AuthState) + Send + Sync>;

// ============================================================================
// Collaborator traits
// ============================================================================

/// A reference/query that can be watched for the five event categories.
///
/// Contract: `on` registers exactly one listener and returns its token; `off`
/// with that token deregisters it, and is a no-op for unknown tokens (safe to
/// call more than once). When the backend cancels a listener it calls
/// `on_error` once and drops the registration itself.
pub trait EventSource: Send + Sync {
    /// The path this source points at.
    fn path(&self) -> &str;

    fn on(
        &self,
        kind: EventKind,
        handler: SnapshotHandler,
        on_error: SourceErrorHandler,
    ) -> ListenerId;

    fn off(&self, kind: EventKind, listener: ListenerId);
}

/// An auth client whose status changes can be watched.
pub trait AuthSource: Send + Sync {
    fn on_auth_state_changed(&self, handler: AuthHandler) -> ListenerId;

    /// No-op for unknown tokens.
    fn off_auth_state_changed(&self, listener: ListenerId);

    /// The currently-known status, readable synchronously.
    fn current_auth(&self) -> AuthState;
}
