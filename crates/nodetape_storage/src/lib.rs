//! nodetape storage
//!
//! Directory-backed artifact store for trace, sequence and serialized-data
//! documents. Opening a store never fails: it degrades from the primary
//! directory to a temporary one, and finally to in-memory-only operation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod store;

// Re-exports
pub use store::{ArtifactStore, Persisted, StoreConfig, StoreError, StoreLocation, StoreStats};
