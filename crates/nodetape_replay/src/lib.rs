//! nodetape replay
//!
//! Captures node executions as [`ReplayStep`]s, groups them into ordered
//! [`ReplaySequence`]s that persist as self-contained JSON documents, and
//! re-runs them against the registered nodes, diffing each actual output
//! against the recorded one.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod engine;
pub mod gate;
pub mod persist;
pub mod step;

// Re-exports
pub use diff::{DiffDepth, compare_outputs};
pub use engine::{ReplayBrief, ReplayConfig, ReplayEngine, ReplayMode, ReplaySummary};
pub use gate::{AutoContinue, ChannelGate, GateSignal, StepGate, StepPrompt};
pub use persist::{
    ReplayError, SEQUENCE_SCHEMA_VERSION, SequenceDocument, load_sequence, save_sequence,
};
pub use step::{ReplayResult, ReplaySequence, ReplayStep, SequenceMetadata};
