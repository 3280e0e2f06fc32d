//! SyncList — the ordered, key-unique child list reconstructed from events.
//!
//! Every incoming record carries the key of its new *predecessor* rather than
//! an absolute index, so each operation resolves positions against the
//! current list state. All mutation goes through the four operations below
//! ([`push`](SyncList::push), [`remove`](SyncList::remove),
//! [`update`](SyncList::update), [`move_to`](SyncList::move_to)); everything
//! else is read-only or works on a copy.
//!
//! Lookup misses are never fatal:
//!   - inserting after an unseen predecessor falls back to the head of the
//!     list (documented behavior — it keeps the list converging when events
//!     arrive out of causal order, at the cost of a temporarily surprising
//!     position);
//!   - removing an unseen key is a no-op.

use std::ops::Deref;

use serde::{Serialize, Serializer};

use crate::record::ChildRecord;
use crate::types::EventKind;

/// Ordered sequence of unique-keyed records.
///
/// Order is fully determined by the chain of `prev_key` relations: the record
/// whose `prev_key` is `None` is first, and every other record immediately
/// follows the record bearing its `prev_key`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncList {
    items: Vec<ChildRecord>,
}

impl SyncList {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Position lookup
    // -----------------------------------------------------------------------

    /// Current position of the record with `key`, if present.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.items.iter().position(|record| record.key == key)
    }

    /// Where a record with this `prev_key` belongs right now.
    ///
    /// `None` (the sentinel) and a missing predecessor both resolve to the
    /// head. The miss is logged; it usually means the events arrived out of
    /// causal order and a later event will reposition the item.
    fn insertion_point(&self, prev_key: Option<&str>) -> usize {
        let Some(prev) = prev_key else {
            return 0;
        };

        match self.position(prev) {
            Some(index) => index + 1,
            None => {
                tracing::debug!(prev_key = %prev, "predecessor not in list, inserting at head");
                0
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutating operations
    // -----------------------------------------------------------------------

    /// Insert `record` immediately after its predecessor (or at the head for
    /// the sentinel / an unseen predecessor).
    ///
    /// Callers must not push a key that is already present — [`update`] is
    /// the operation for that case.
    ///
    /// [`update`]: SyncList::update
    pub fn push(&mut self, record: ChildRecord) {
        let index = self.insertion_point(record.prev_key.as_deref());
        self.items.insert(index, record);
    }

    /// Delete the record with `record.key`. Unseen keys are a no-op —
    /// deletion is best-effort and idempotent.
    pub fn remove(&mut self, record: &ChildRecord) {
        if let Some(index) = self.position(&record.key) {
            self.items.remove(index);
        }
    }

    /// Replace the record with `record.key`.
    ///
    /// - Key not present: degrade to [`push`](SyncList::push) — an update for
    ///   an unseen key is a logical add.
    /// - Present with a changed `prev_key`: the stored position is stale;
    ///   remove and re-insert at the new position.
    /// - Present with the same `prev_key`: replace in place, order untouched.
    pub fn update(&mut self, record: ChildRecord) {
        let Some(index) = self.position(&record.key) else {
            self.push(record);
            return;
        };

        if self.items[index].prev_key != record.prev_key {
            self.items.remove(index);
            self.push(record);
        } else {
            self.items[index] = record;
        }
    }

    /// Relocate `record` after its new predecessor: unconditional remove then
    /// insert. Correct even when the position did not actually change,
    /// because removal is idempotent and insertion recomputes the position
    /// from `prev_key`.
    pub fn move_to(&mut self, record: ChildRecord) {
        self.remove(&record);
        self.push(record);
    }

    /// Fold one event into the list: each child event maps to exactly one of
    /// the four operations. `Value` events describe the whole reference, not
    /// a child, and leave the list untouched.
    pub fn apply(&mut self, record: ChildRecord) {
        match record.event {
            EventKind::ChildAdded => self.push(record),
            EventKind::ChildRemoved => self.remove(&record),
            EventKind::ChildChanged => self.update(record),
            EventKind::ChildMoved => self.move_to(record),
            EventKind::Value => {
                tracing::debug!(key = %record.key, "value event ignored by sync list");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Derived, non-mutating operations — always work on a copy
    // -----------------------------------------------------------------------

    /// The keys in current order.
    pub fn keys(&self) -> Vec<&str> {
        self.items.iter().map(|record| record.key.as_str()).collect()
    }

    /// A fresh copy of the records, sorted by `compare`. The live list keeps
    /// its event order.
    pub fn sorted_by(
        &self,
        compare: impl FnMut(&ChildRecord, &ChildRecord) -> std::cmp::Ordering,
    ) -> Vec<ChildRecord> {
        let mut copy = self.items.clone();
        copy.sort_by(compare);
        copy
    }

    /// A fresh reversed copy.
    pub fn reversed(&self) -> Vec<ChildRecord> {
        let mut copy = self.items.clone();
        copy.reverse();
        copy
    }

    /// A fresh copy of the records in `range`, clamped to the list length.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Vec<ChildRecord> {
        let start = range.start.min(self.items.len());
        let end = range.end.min(self.items.len());
        self.items[start..end].to_vec()
    }

    /// A plain owned copy of the whole list.
    pub fn to_vec(&self) -> Vec<ChildRecord> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Read-only access to the underlying slice. Mutation stays behind the four
/// named operations.
impl Deref for SyncList {
    type Target = [ChildRecord];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<'a> IntoIterator for &'a SyncList {
    type Item = &'a ChildRecord;
    type IntoIter = std::slice::Iter<'a, ChildRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Serializes as a JSON array of the record values (metadata stays hidden,
/// see [`ChildRecord`]'s `Serialize`).
impl Serialize for SyncList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}
