//! MemoryDb — an in-memory realtime database implementing the collaborator
//! contracts.
//!
//! Children under a path are kept ordered by (priority, key); writes fan out
//! `child_added` / `child_changed` / `child_moved` / `child_removed` /
//! `value` events to registered listeners, with the previous-sibling key
//! computed from the post-write order. Registering a `child_added` listener
//! replays the existing children in order; a `value` listener immediately
//! receives the current value.
//!
//! # Threading model
//!
//! Two independent locks (`parking_lot::Mutex`): `nodes` for data, and
//! `listeners` for registrations. Events are computed under the `nodes` lock,
//! but handlers are always called with no lock held — the listener list is
//! snapshotted first, so a handler may re-enter `on`/`off` or write back to
//! the database without deadlocking.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{PathError, Result, SourceError};
use crate::types::{AuthState, AuthUser, EventKind, ListenerId};

use super::traits::{
    AuthHandler, AuthSource, EventSource, SnapshotHandler, SourceErrorHandler, SourceSnapshot,
};

const FORBIDDEN_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

// ============================================================================
// Internal node and listener state
// ============================================================================

#[derive(Debug, Clone)]
struct ChildEntry {
    key: String,
    value: Value,
    priority: Option<f64>,
}

/// Realtime-database child order: no-priority children first (by key), then
/// ascending priority, ties broken by key.
fn child_order(a: &ChildEntry, b: &ChildEntry) -> CmpOrdering {
    match (a.priority, b.priority) {
        (None, None) => a.key.cmp(&b.key),
        (None, Some(_)) => CmpOrdering::Less,
        (Some(_), None) => CmpOrdering::Greater,
        (Some(pa), Some(pb)) => pa
            .partial_cmp(&pb)
            .unwrap_or(CmpOrdering::Equal)
            .then_with(|| a.key.cmp(&b.key)),
    }
}

struct Listener {
    id: ListenerId,
    handler: SnapshotHandler,
    on_error: SourceErrorHandler,
}

/// A child event computed under the data lock, delivered after it is
/// released.
struct PendingEvent {
    kind: EventKind,
    snapshot: SourceSnapshot,
    prev_key: Option<String>,
}

// ============================================================================
// MemoryDb
// ============================================================================

/// In-memory realtime database. Create one, hand out [`MemoryRef`]s via
/// [`reference`](MemoryDb::reference), write through the refs.
pub struct MemoryDb {
    /// path → ordered children.
    nodes: Mutex<HashMap<String, Vec<ChildEntry>>>,
    /// (path, event kind) → listeners.
    listeners: Mutex<HashMap<(String, EventKind), Vec<Listener>>>,
    next_listener_id: AtomicU64,

    auth: Mutex<AuthState>,
    auth_listeners: Mutex<Vec<(ListenerId, AuthHandler)>>,
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
            auth: Mutex::new(AuthState::SignedOut),
            auth_listeners: Mutex::new(Vec::new()),
        }
    }

    /// Build a reference to `path`.
    ///
    /// Validation happens here, synchronously — never inside a stream. The
    /// path is normalized (leading/trailing slashes stripped); each segment
    /// must be non-empty and free of `. # $ [ ]`.
    pub fn reference(self: &Arc<Self>, path: &str) -> Result<MemoryRef> {
        let normalized = path.trim_matches('/');

        if !normalized.is_empty() {
            for segment in normalized.split('/') {
                if segment.is_empty() {
                    return Err(PathError::EmptySegment(path.to_string()).into());
                }
                if let Some(forbidden) = segment.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
                    return Err(PathError::ForbiddenCharacter {
                        segment: segment.to_string(),
                        forbidden,
                    }
                    .into());
                }
            }
        }

        Ok(MemoryRef {
            db: Arc::clone(self),
            path: normalized.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Listener registry
    // -----------------------------------------------------------------------

    fn register(
        &self,
        path: &str,
        kind: EventKind,
        handler: SnapshotHandler,
        on_error: SourceErrorHandler,
    ) -> ListenerId {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .entry((path.to_string(), kind))
            .or_default()
            .push(Listener {
                id,
                handler: Arc::clone(&handler),
                on_error,
            });
        tracing::debug!(path, event = %kind, listener = id, "listener registered");

        // Replay semantics: a child_added listener sees the existing children
        // in order; a value listener sees the current value. Replays run with
        // no lock held.
        match kind {
            EventKind::ChildAdded => {
                for event in self.replay_children(path) {
                    handler(&event.snapshot, event.prev_key.as_deref());
                }
            }
            EventKind::Value => {
                let snapshot = self.value_snapshot(path);
                handler(&snapshot, None);
            }
            _ => {}
        }

        id
    }

    fn deregister(&self, path: &str, kind: EventKind, listener: ListenerId) {
        let mut listeners = self.listeners.lock();
        if let Some(registered) = listeners.get_mut(&(path.to_string(), kind)) {
            registered.retain(|l| l.id != listener);
            if registered.is_empty() {
                listeners.remove(&(path.to_string(), kind));
            }
            tracing::debug!(path, event = %kind, listener, "listener deregistered");
        }
    }

    /// Number of live listeners for (path, kind). Used by tests to verify the
    /// one-registration / one-deregistration contract.
    pub fn listener_count(&self, path: &str, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .get(&(path.to_string(), kind))
            .map_or(0, Vec::len)
    }

    /// Simulate the backend cancelling every listener at `path` (permission
    /// change, node deleted upstream). Each listener's error callback fires
    /// once and the registration is dropped.
    pub fn cancel_listeners(&self, path: &str, error: SourceError) {
        let cancelled: Vec<Listener> = {
            let mut listeners = self.listeners.lock();
            let keys: Vec<(String, EventKind)> = listeners
                .keys()
                .filter(|(p, _)| p == path)
                .cloned()
                .collect();
            keys.into_iter()
                .flat_map(|key| listeners.remove(&key).unwrap_or_default())
                .collect()
        };

        for listener in cancelled {
            (listener.on_error)(error.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Event delivery
    // -----------------------------------------------------------------------

    fn emit(&self, path: &str, event: PendingEvent) {
        // Snapshot handlers under the lock, call outside it.
        let handlers: Vec<SnapshotHandler> = {
            let listeners = self.listeners.lock();
            listeners
                .get(&(path.to_string(), event.kind))
                .map(|registered| registered.iter().map(|l| Arc::clone(&l.handler)).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            handler(&event.snapshot, event.prev_key.as_deref());
        }
    }

    fn emit_value(&self, path: &str) {
        let snapshot = self.value_snapshot(path);
        self.emit(
            path,
            PendingEvent {
                kind: EventKind::Value,
                snapshot,
                prev_key: None,
            },
        );
    }

    fn value_snapshot(&self, path: &str) -> SourceSnapshot {
        let nodes = self.nodes.lock();
        let value = match nodes.get(path) {
            None => Value::Null,
            Some(children) if children.is_empty() => Value::Null,
            Some(children) => {
                let mut map = serde_json::Map::new();
                for child in children {
                    map.insert(child.key.clone(), child.value.clone());
                }
                Value::Object(map)
            }
        };

        SourceSnapshot {
            key: path.rsplit('/').next().unwrap_or("").to_string(),
            path: path.to_string(),
            value,
            priority: None,
        }
    }

    fn replay_children(&self, path: &str) -> Vec<PendingEvent> {
        let nodes = self.nodes.lock();
        let Some(children) = nodes.get(path) else {
            return Vec::new();
        };

        let mut prev: Option<String> = None;
        children
            .iter()
            .map(|child| {
                let event = PendingEvent {
                    kind: EventKind::ChildAdded,
                    snapshot: child_snapshot(path, child),
                    prev_key: prev.clone(),
                };
                prev = Some(child.key.clone());
                event
            })
            .collect()
    }
}

fn child_snapshot(path: &str, child: &ChildEntry) -> SourceSnapshot {
    SourceSnapshot {
        key: child.key.clone(),
        path: if path.is_empty() {
            child.key.clone()
        } else {
            format!("{path}/{}", child.key)
        },
        value: child.value.clone(),
        priority: child.priority,
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PathError::EmptySegment(key.to_string()).into());
    }
    if let Some(forbidden) = key.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(PathError::ForbiddenCharacter {
            segment: key.to_string(),
            forbidden,
        }
        .into());
    }
    Ok(())
}

// ============================================================================
// MemoryRef
// ============================================================================

/// A reference into a [`MemoryDb`]. Cheap to clone; writes go through here.
#[derive(Clone)]
pub struct MemoryRef {
    db: Arc<MemoryDb>,
    path: String,
}

impl MemoryRef {
    pub fn db(&self) -> &Arc<MemoryDb> {
        &self.db
    }

    /// Write a child with an explicit sort priority.
    ///
    /// Fires `child_added` for a new key; for an existing key,
    /// `child_moved` if the position changed and `child_changed` if the value
    /// changed (both when both changed). A `value` event follows every write.
    pub fn set_with_priority(
        &self,
        key: &str,
        value: Value,
        priority: Option<f64>,
    ) -> Result<()> {
        validate_key(key)?;

        let events = {
            let mut nodes = self.db.nodes.lock();
            let children = nodes.entry(self.path.clone()).or_default();

            match children.iter().position(|c| c.key == key) {
                None => {
                    children.push(ChildEntry {
                        key: key.to_string(),
                        value,
                        priority,
                    });
                    children.sort_by(child_order);

                    let index = children.iter().position(|c| c.key == key).unwrap_or(0);
                    let prev_key = index.checked_sub(1).map(|i| children[i].key.clone());
                    vec![PendingEvent {
                        kind: EventKind::ChildAdded,
                        snapshot: child_snapshot(&self.path, &children[index]),
                        prev_key,
                    }]
                }
                Some(old_index) => {
                    let value_changed = children[old_index].value != value;
                    children[old_index].value = value;
                    children[old_index].priority = priority;
                    children.sort_by(child_order);

                    let new_index = children.iter().position(|c| c.key == key).unwrap_or(0);
                    let prev_key = new_index.checked_sub(1).map(|i| children[i].key.clone());
                    let snapshot = child_snapshot(&self.path, &children[new_index]);

                    let mut events = Vec::with_capacity(2);
                    if new_index != old_index {
                        events.push(PendingEvent {
                            kind: EventKind::ChildMoved,
                            snapshot: snapshot.clone(),
                            prev_key: prev_key.clone(),
                        });
                    }
                    if value_changed {
                        events.push(PendingEvent {
                            kind: EventKind::ChildChanged,
                            snapshot,
                            prev_key,
                        });
                    }
                    events
                }
            }
        };

        for event in events {
            self.db.emit(&self.path, event);
        }
        self.db.emit_value(&self.path);
        Ok(())
    }

    /// Write a child without a priority (orders by key among the unprioritized).
    pub fn set_child(&self, key: &str, value: Value) -> Result<()> {
        self.set_with_priority(key, value, None)
    }

    /// Change a child's value, keeping its current priority. Inserts if the
    /// key does not exist yet.
    pub fn update_child(&self, key: &str, value: Value) -> Result<()> {
        let priority = {
            let nodes = self.db.nodes.lock();
            nodes
                .get(&self.path)
                .and_then(|children| children.iter().find(|c| c.key == key))
                .and_then(|c| c.priority)
        };
        self.set_with_priority(key, value, priority)
    }

    /// Delete a child. Unknown keys are a no-op.
    pub fn remove_child(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let removed = {
            let mut nodes = self.db.nodes.lock();
            let Some(children) = nodes.get_mut(&self.path) else {
                return Ok(());
            };
            match children.iter().position(|c| c.key == key) {
                None => None,
                Some(index) => Some(children.remove(index)),
            }
        };

        if let Some(child) = removed {
            self.db.emit(
                &self.path,
                PendingEvent {
                    kind: EventKind::ChildRemoved,
                    snapshot: child_snapshot(&self.path, &child),
                    prev_key: None,
                },
            );
            self.db.emit_value(&self.path);
        }
        Ok(())
    }
}

impl EventSource for MemoryRef {
    fn path(&self) -> &str {
        &self.path
    }

    fn on(
        &self,
        kind: EventKind,
        handler: SnapshotHandler,
        on_error: SourceErrorHandler,
    ) -> ListenerId {
        self.db.register(&self.path, kind, handler, on_error)
    }

    fn off(&self, kind: EventKind, listener: ListenerId) {
        self.db.deregister(&self.path, kind, listener);
    }
}

// ============================================================================
// Auth
// ============================================================================

impl MemoryDb {
    /// Sign a user in, notifying auth listeners.
    pub fn sign_in(&self, user: AuthUser) {
        self.set_auth(AuthState::SignedIn(user));
    }

    /// Sign out, notifying auth listeners.
    pub fn sign_out(&self) {
        self.set_auth(AuthState::SignedOut);
    }

    fn set_auth(&self, state: AuthState) {
        *self.auth.lock() = state.clone();

        let handlers: Vec<AuthHandler> = {
            let listeners = self.auth_listeners.lock();
            listeners.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        for handler in handlers {
            handler(&state);
        }
    }

    /// Live auth listener count, for tests.
    pub fn auth_listener_count(&self) -> usize {
        self.auth_listeners.lock().len()
    }
}

impl AuthSource for MemoryDb {
    fn on_auth_state_changed(&self, handler: AuthHandler) -> ListenerId {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.auth_listeners.lock().push((id, handler));
        id
    }

    fn off_auth_state_changed(&self, listener: ListenerId) {
        self.auth_listeners.lock().retain(|(id, _)| *id != listener);
    }

    fn current_auth(&self) -> AuthState {
        self.auth.lock().clone()
    }
}
