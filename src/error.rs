use thiserror::Error;

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// A terminal error reported by the external event source.
///
/// This is what a stream terminates with when the external listener is
/// cancelled by the backend (permission change, reference deleted, transport
/// failure). It is `Clone` because it crosses `Arc` handler boundaries on its
/// way from the source to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source error at \"{path}\" ({code}): {message}")]
pub struct SourceError {
    /// Stable machine-readable code, e.g. `"permission_denied"`.
    pub code: String,
    /// Human-readable description from the external client.
    pub message: String,
    /// The reference path the listener was attached to.
    pub path: String,
}

impl SourceError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: path.into(),
        }
    }

    /// The code used when a listener is cancelled by a permission change.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::new(
            "permission_denied",
            "listener cancelled: insufficient permissions",
            path,
        )
    }
}

// ---------------------------------------------------------------------------
// PathError
// ---------------------------------------------------------------------------

/// Invalid reference path at construction time.
///
/// Surfaced synchronously from `MemoryDb::reference()`, never from inside a
/// stream. The forbidden characters match the usual realtime-database key
/// rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("reference path contains an empty segment: \"{0}\"")]
    EmptySegment(String),

    #[error("reference path segment \"{segment}\" contains forbidden character '{forbidden}'")]
    ForbiddenCharacter { segment: String, forbidden: char },
}

// ---------------------------------------------------------------------------
// Crate-level error and Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Path(#[from] PathError),
}

pub type Result<T> = std::result::Result<T, Error>;
