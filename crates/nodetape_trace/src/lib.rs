//! nodetape tracing
//!
//! Records one [`ExecutionTrace`] per node execution: timing, outcome,
//! field-level state changes, attached log lines, and a performance
//! classification. Traces move exactly once from the tracer's active set to
//! its completed list and are then written to the trace directory.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod changes;
pub mod instrument;
pub mod trace;
pub mod tracer;

// Re-exports
pub use changes::{detect_changes, merge_update};
pub use instrument::{DROPPED, TraceScope, instrumented_call};
pub use trace::{
    ChangeType, ExecutionTrace, LogEntry, LogLevel, PerformanceMetrics, PerformanceScore,
    StateChange, Thresholds,
};
pub use tracer::{ABANDONED, Tracer, TracerConfig, TracerSummary, TraceSummary};
