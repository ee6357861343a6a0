//! nodetape nodes
//!
//! The external collaborator the tracer and replay engine work against: an
//! async [`Node`] trait, a read-only [`NodeRegistry`], and [`invoke`], which
//! times a call and turns panics into captured failures.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod invoke;
pub mod node;
pub mod registry;

// Re-exports
pub use invoke::{Invocation, invoke};
pub use node::{FnNode, Node, NodeError};
pub use registry::{NodeRegistry, RegistryError};
