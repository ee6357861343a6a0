//! nodetape session
//!
//! One explicit context object per process or test. A [`Session`] owns the
//! serializer, the tracer, and the replay engine built from a single
//! [`SessionConfig`], and shares the node registry with them read-only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod session;

// Re-exports
pub use config::SessionConfig;
pub use session::{Session, SessionSummary};
