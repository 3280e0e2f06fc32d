//! ChildRecord — a snapshot normalized into a value plus explicit provenance.
//!
//! The original client hands listeners an opaque snapshot object; consumers
//! want the underlying value, but the sync machinery needs to know the item's
//! key, its previous sibling, which event produced it, and where it came
//! from. Rather than injecting hidden fields into the value, the metadata
//! lives alongside it in a record struct, and `Serialize` passes through to
//! the value alone so the metadata never leaks into consumer output.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::source::traits::SourceSnapshot;
use crate::types::EventKind;

/// Reserved field a wrapped primitive is exposed under.
pub const VALUE_FIELD: &str = "$value";

// ============================================================================
// Unpack policy
// ============================================================================

/// How a source snapshot is turned into a record value.
///
/// The default unwraps the snapshot to its underlying value and wraps
/// primitives in a `$value` carrier. The two `defers` flags independently
/// make the carrier's textual and JSON renderings pass through to the
/// primitive instead of showing the carrier shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unpack {
    /// Unwrap the snapshot to its value. Off means the record carries the
    /// snapshot's raw export (value + priority) untouched.
    pub unwrap: bool,
    /// `Display` of a primitive carrier renders the primitive itself.
    pub display_defers: bool,
    /// `Serialize` of a primitive carrier emits the primitive itself.
    pub json_defers: bool,
}

impl Default for Unpack {
    fn default() -> Self {
        Self {
            unwrap: true,
            display_defers: false,
            json_defers: false,
        }
    }
}

impl Unpack {
    /// The default policy: unwrap, carrier shape visible in both renderings.
    pub fn value() -> Self {
        Self::default()
    }

    /// No unwrapping: records carry the snapshot export untouched.
    pub fn raw() -> Self {
        Self {
            unwrap: false,
            display_defers: false,
            json_defers: false,
        }
    }

    pub fn display_defers(mut self, defers: bool) -> Self {
        self.display_defers = defers;
        self
    }

    pub fn json_defers(mut self, defers: bool) -> Self {
        self.json_defers = defers;
        self
    }
}

// ============================================================================
// ChildValue
// ============================================================================

/// A record's payload: either a structured value passed through untouched, or
/// a primitive wrapped in a `$value` carrier.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildValue {
    /// Non-object, non-array value wrapped in a carrier.
    Primitive {
        value: Value,
        display_defers: bool,
        json_defers: bool,
    },
    /// Object or array (or raw export), passed through as-is.
    Structured(Value),
}

impl ChildValue {
    /// Classify `value` under `policy`: objects and arrays pass through,
    /// everything else is wrapped.
    pub fn from_value(value: Value, policy: Unpack) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => Self::Structured(value),
            primitive => Self::Primitive {
                value: primitive,
                display_defers: policy.display_defers,
                json_defers: policy.json_defers,
            },
        }
    }

    /// The underlying raw value, carrier stripped.
    pub fn raw(&self) -> &Value {
        match self {
            Self::Primitive { value, .. } => value,
            Self::Structured(value) => value,
        }
    }

    /// The serialized shape as a `serde_json::Value` — what a consumer would
    /// see after JSON round-tripping this value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Primitive {
                value,
                json_defers: true,
                ..
            } => value.clone(),
            Self::Primitive { value, .. } => {
                let mut map = serde_json::Map::new();
                map.insert(VALUE_FIELD.to_string(), value.clone());
                Value::Object(map)
            }
            Self::Structured(value) => value.clone(),
        }
    }
}

impl fmt::Display for ChildValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildValue::Primitive {
                value,
                display_defers: true,
                ..
            } => match value {
                // Bare string, not a JSON-quoted one.
                Value::String(s) => f.write_str(s),
                other => write!(f, "{other}"),
            },
            // Carrier shape, independent of the JSON deferral flag.
            ChildValue::Primitive { value, .. } => {
                write!(f, "{{\"{VALUE_FIELD}\":{value}}}")
            }
            ChildValue::Structured(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for ChildValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChildValue::Primitive {
                value,
                json_defers: true,
                ..
            } => value.serialize(serializer),
            ChildValue::Primitive { value, .. } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(VALUE_FIELD, value)?;
                map.end()
            }
            ChildValue::Structured(value) => value.serialize(serializer),
        }
    }
}

// ============================================================================
// ChildRecord
// ============================================================================

/// One normalized event: a payload plus the provenance the sync list orders
/// by.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildRecord {
    /// Unique stable identifier, stable across moves and updates.
    pub key: String,
    /// Key of the immediately preceding sibling; `None` means first.
    pub prev_key: Option<String>,
    /// Which event produced this record.
    pub event: EventKind,
    /// Originating data location. Shared, read-only; the list never touches it.
    pub path: String,
    /// The payload.
    pub value: ChildValue,
}

impl ChildRecord {
    /// Normalize a source snapshot under `policy`.
    pub fn from_snapshot(
        snapshot: &SourceSnapshot,
        prev_key: Option<String>,
        event: EventKind,
        policy: Unpack,
    ) -> Self {
        let value = if policy.unwrap {
            ChildValue::from_value(snapshot.value.clone(), policy)
        } else {
            ChildValue::Structured(snapshot.export())
        };

        Self {
            key: snapshot.key.clone(),
            prev_key,
            event,
            path: snapshot.path.clone(),
            value,
        }
    }
}

/// Serializing a record serializes its value only — the metadata behaves like
/// the original's non-enumerable fields and never shows up in consumer JSON.
impl Serialize for ChildRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}
