//! nodetape core types
//!
//! Pure types and logic with no I/O: the error taxonomy shared by every
//! crate, SHA-256 digests, identifier generation, and time encoding.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod id;
pub mod time;

// Re-exports
pub use error::{DecodeStage, TapeError, TapeResult};
pub use hash::{Digest, HashError};
pub use id::{IdGenerator, SequenceId, StepId, TraceId};
pub use time::Timestamp;
