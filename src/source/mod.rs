//! External collaborator boundary.
//!
//! - [`traits`] — the minimal event-subscription contract the adapter needs
//!   from a realtime-database/auth client.
//! - [`memory`] — [`MemoryDb`](memory::MemoryDb), an in-memory database
//!   implementing both contracts; the reference collaborator for tests and
//!   embedded use.

pub mod memory;
pub mod traits;

pub use memory::{MemoryDb, MemoryRef};
pub use traits::{AuthHandler, AuthSource, EventSource, SnapshotHandler, SourceErrorHandler, SourceSnapshot};
