//! Tests for `MemoryDb` — path validation, child ordering, and event fan-out.

use std::sync::{Arc, Mutex};

use rx_realtime::error::{Error, PathError};
use rx_realtime::source::memory::MemoryDb;
use rx_realtime::source::traits::{EventSource, SnapshotHandler, SourceErrorHandler};
use rx_realtime::types::EventKind;
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn noop_error_handler() -> SourceErrorHandler {
    Arc::new(|_| {})
}

/// Register a raw listener that logs (key, prev) pairs.
fn logging_handler(log: &Arc<Mutex<Vec<(String, Option<String>)>>>) -> SnapshotHandler {
    let log = Arc::clone(log);
    Arc::new(move |snapshot, prev| {
        log.lock()
            .unwrap()
            .push((snapshot.key.clone(), prev.map(str::to_string)));
    })
}

// ============================================================================
// Path validation — synchronous, at factory-call time
// ============================================================================

#[test]
fn reference_accepts_valid_paths() {
    let db = Arc::new(MemoryDb::new());
    assert!(db.reference("recipes").is_ok());
    assert!(db.reference("/recipes/weekday/").is_ok());
    assert!(db.reference("").is_ok(), "root reference is valid");
}

#[test]
fn reference_normalizes_surrounding_slashes() {
    let db = Arc::new(MemoryDb::new());
    let reference = db.reference("/recipes/weekday/").unwrap();
    assert_eq!(reference.path(), "recipes/weekday");
}

#[test]
fn reference_rejects_forbidden_characters() {
    let db = Arc::new(MemoryDb::new());

    for bad in ["recipes/$priority", "a#b", "x/[0]", "dotted.path"] {
        let err = db.reference(bad).map(|_| ()).unwrap_err();
        assert!(
            matches!(err, Error::Path(PathError::ForbiddenCharacter { .. })),
            "expected ForbiddenCharacter for {bad:?}, got {err:?}"
        );
    }
}

#[test]
fn reference_rejects_empty_segments() {
    let db = Arc::new(MemoryDb::new());
    let err = db.reference("recipes//weekday").map(|_| ()).unwrap_err();
    assert!(
        matches!(err, Error::Path(PathError::EmptySegment(_))),
        "expected EmptySegment, got {err:?}"
    );
}

#[test]
fn writes_reject_forbidden_keys() {
    let db = Arc::new(MemoryDb::new());
    let reference = db.reference("recipes").unwrap();
    assert!(matches!(
        reference.set_child("bad.key", json!(1)),
        Err(Error::Path(PathError::ForbiddenCharacter { .. }))
    ));
}

// ============================================================================
// Child ordering
// ============================================================================

#[test]
fn children_order_by_priority_then_key() {
    let db = Arc::new(MemoryDb::new());
    let reference = Arc::new(db.reference("items").unwrap());

    reference.set_with_priority("c", json!(3), Some(2.0)).unwrap();
    reference.set_with_priority("a", json!(1), Some(1.0)).unwrap();
    // No priority sorts before any priority; ties break by key.
    reference.set_child("z", json!(26)).unwrap();
    reference.set_child("m", json!(13)).unwrap();
    reference.set_with_priority("b", json!(2), Some(1.0)).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let id = reference.on(
        EventKind::ChildAdded,
        logging_handler(&log),
        noop_error_handler(),
    );

    // Replay order reveals the stored order.
    let replayed: Vec<String> = log.lock().unwrap().iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(replayed, vec!["m", "z", "a", "b", "c"]);
    reference.off(EventKind::ChildAdded, id);
}

#[test]
fn priority_change_fires_child_moved_with_new_predecessor() {
    let db = Arc::new(MemoryDb::new());
    let reference = Arc::new(db.reference("items").unwrap());
    reference.set_with_priority("a", json!(1), Some(1.0)).unwrap();
    reference.set_with_priority("b", json!(2), Some(2.0)).unwrap();
    reference.set_with_priority("c", json!(3), Some(3.0)).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let id = reference.on(
        EventKind::ChildMoved,
        logging_handler(&log),
        noop_error_handler(),
    );

    reference.set_with_priority("a", json!(1), Some(9.0)).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![("a".to_string(), Some("c".to_string()))]
    );
    reference.off(EventKind::ChildMoved, id);
}

#[test]
fn value_change_fires_child_changed_not_child_moved() {
    let db = Arc::new(MemoryDb::new());
    let reference = Arc::new(db.reference("items").unwrap());
    reference.set_with_priority("a", json!(1), Some(1.0)).unwrap();
    reference.set_with_priority("b", json!(2), Some(2.0)).unwrap();

    let moved_log = Arc::new(Mutex::new(Vec::new()));
    let changed_log = Arc::new(Mutex::new(Vec::new()));
    let moved_id = reference.on(
        EventKind::ChildMoved,
        logging_handler(&moved_log),
        noop_error_handler(),
    );
    let changed_id = reference.on(
        EventKind::ChildChanged,
        logging_handler(&changed_log),
        noop_error_handler(),
    );

    reference.set_with_priority("a", json!(100), Some(1.0)).unwrap();

    assert!(moved_log.lock().unwrap().is_empty());
    assert_eq!(
        *changed_log.lock().unwrap(),
        vec![("a".to_string(), None)]
    );
    reference.off(EventKind::ChildMoved, moved_id);
    reference.off(EventKind::ChildChanged, changed_id);
}

#[test]
fn remove_fires_child_removed_and_updates_value() {
    let db = Arc::new(MemoryDb::new());
    let reference = Arc::new(db.reference("items").unwrap());
    reference.set_child("a", json!(1)).unwrap();
    reference.set_child("b", json!(2)).unwrap();

    let removed_log = Arc::new(Mutex::new(Vec::new()));
    let value_log: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));

    let removed_id = reference.on(
        EventKind::ChildRemoved,
        logging_handler(&removed_log),
        noop_error_handler(),
    );
    let value_id = {
        let value_log = Arc::clone(&value_log);
        reference.on(
            EventKind::Value,
            Arc::new(move |snapshot, _| value_log.lock().unwrap().push(snapshot.value.clone())),
            noop_error_handler(),
        )
    };

    reference.remove_child("a").unwrap();
    reference.remove_child("a").unwrap(); // unknown key: no event

    assert_eq!(*removed_log.lock().unwrap(), vec![("a".to_string(), None)]);
    // Registration replay, then the post-remove value.
    assert_eq!(
        *value_log.lock().unwrap(),
        vec![json!({"a": 1, "b": 2}), json!({"b": 2})]
    );
    reference.off(EventKind::ChildRemoved, removed_id);
    reference.off(EventKind::Value, value_id);
}

#[test]
fn value_snapshot_of_empty_node_is_null() {
    let db = Arc::new(MemoryDb::new());
    let reference = Arc::new(db.reference("nothing-here").unwrap());

    let value_log: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let id = {
        let value_log = Arc::clone(&value_log);
        reference.on(
            EventKind::Value,
            Arc::new(move |snapshot, _| value_log.lock().unwrap().push(snapshot.value.clone())),
            noop_error_handler(),
        )
    };

    assert_eq!(*value_log.lock().unwrap(), vec![serde_json::Value::Null]);
    reference.off(EventKind::Value, id);
}

// ============================================================================
// Deregistration bookkeeping
// ============================================================================

#[test]
fn off_is_a_no_op_for_unknown_tokens() {
    let db = Arc::new(MemoryDb::new());
    let reference = Arc::new(db.reference("items").unwrap());

    let id = reference.on(
        EventKind::ChildAdded,
        Arc::new(|_, _| {}),
        noop_error_handler(),
    );
    reference.off(EventKind::ChildAdded, id);
    reference.off(EventKind::ChildAdded, id);
    reference.off(EventKind::ChildAdded, 9999);

    assert_eq!(db.listener_count("items", EventKind::ChildAdded), 0);
}
