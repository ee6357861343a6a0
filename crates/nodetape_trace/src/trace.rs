//! Execution trace records.

use nodetape_codec::Value;
use nodetape_core::time::{opt_secs, secs};
use nodetape_core::{Timestamp, TraceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// How a field changed between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Present only after
    Added,
    /// Present in both with different values
    Modified,
    /// Present only before
    Removed,
}

/// One field-level difference between two state snapshots
///
/// An absent side is omitted on disk, so a field that held `null` stays
/// distinct from a field that did not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// When the change was observed
    pub timestamp: Timestamp,
    /// Field name
    pub field: String,
    /// Value before, absent for additions
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub old_value: Option<Value>,
    /// Value after, absent for removals
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub new_value: Option<Value>,
    /// Kind of change
    pub change_type: ChangeType,
}

fn present<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

/// Trace log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug
    Debug,
    /// Info
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Log line attached to a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was added
    pub timestamp: Timestamp,
    /// Level
    pub level: LogLevel,
    /// Message
    pub message: String,
    /// Structured context
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

/// Performance classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceScore {
    /// Within the warning threshold
    Good,
    /// Over the warning threshold
    Fair,
    /// Over the error threshold
    Poor,
}

/// Execution time thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Executions longer than this are `fair`
    #[serde(with = "secs")]
    pub warning: Duration,
    /// Executions longer than this are `poor`
    #[serde(with = "secs")]
    pub error: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: Duration::from_secs(1),
            error: Duration::from_secs(5),
        }
    }
}

/// Performance analysis of a completed trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Measured execution time
    #[serde(with = "secs")]
    pub execution_time: Duration,
    /// Classification
    pub performance_score: PerformanceScore,
    /// Human-readable warnings
    pub performance_warnings: Vec<String>,
}

impl PerformanceMetrics {
    /// Classify an execution time; both comparisons are strict
    #[must_use]
    pub fn analyze(execution_time: Duration, thresholds: &Thresholds) -> Self {
        let secs = execution_time.as_secs_f64();
        let (performance_score, performance_warnings) = if execution_time > thresholds.error {
            (
                PerformanceScore::Poor,
                vec![format!("Execution time exceeded error threshold: {:.2}s", secs)],
            )
        } else if execution_time > thresholds.warning {
            (
                PerformanceScore::Fair,
                vec![format!("Execution time exceeded warning threshold: {:.2}s", secs)],
            )
        } else {
            (PerformanceScore::Good, Vec::new())
        };

        Self {
            execution_time,
            performance_score,
            performance_warnings,
        }
    }
}

/// Record of one node execution
///
/// `end_time` and `execution_time` are set once, when the trace leaves the
/// active set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Node name
    pub node_name: String,
    /// Trace id
    pub trace_id: TraceId,
    /// Start time
    pub start_time: Timestamp,
    /// End time
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    /// Duration between start and end
    #[serde(default, with = "opt_secs")]
    pub execution_time: Option<Duration>,
    /// Structural hash of the input state
    pub input_state_hash: String,
    /// Structural hash of the output, successful traces only
    #[serde(default)]
    pub output_hash: Option<String>,
    /// Whether the node succeeded
    pub success: bool,
    /// Failure message
    #[serde(default)]
    pub error_message: Option<String>,
    /// Failure stack text
    #[serde(default)]
    pub stack_trace: Option<String>,
    /// Performance analysis, when enabled
    #[serde(default)]
    pub performance_metrics: Option<PerformanceMetrics>,
    /// Observed state changes
    #[serde(default)]
    pub state_changes: Vec<StateChange>,
    /// Attached log lines
    #[serde(default)]
    pub log_entries: Vec<LogEntry>,
}

impl ExecutionTrace {
    /// New active trace
    #[must_use]
    pub fn new(
        node_name: impl Into<String>,
        trace_id: TraceId,
        start_time: Timestamp,
        input_state_hash: String,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            trace_id,
            start_time,
            end_time: None,
            execution_time: None,
            input_state_hash,
            output_hash: None,
            success: false,
            error_message: None,
            stack_trace: None,
            performance_metrics: None,
            state_changes: Vec::new(),
            log_entries: Vec::new(),
        }
    }

    /// Check if the trace has been completed
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Artifact file name
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.node_name, self.trace_id)
    }
}
