//! Recorded steps, sequences, and replay results.

use nodetape_codec::{SerializedData, Value};
use nodetape_core::time::secs;
use nodetape_core::{SequenceId, StepId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// One recorded node invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStep {
    /// Step id
    pub step_id: StepId,
    /// Node that was invoked
    pub node_name: String,
    /// Serialized input state
    pub input_data: SerializedData,
    /// Serialized output, absent when the recording failed
    #[serde(default)]
    pub expected_output: Option<SerializedData>,
    /// Recording time
    pub timestamp: Timestamp,
    /// Measured execution time
    #[serde(with = "secs")]
    pub execution_time: Duration,
    /// Whether the recorded execution succeeded
    pub success: bool,
    /// Recorded failure
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Aggregate sequence metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SequenceMetadata {
    /// Number of steps
    pub total_steps: usize,
    /// Distinct node names, sorted
    pub nodes_involved: Vec<String>,
    /// Sum of recorded execution times
    #[serde(with = "secs")]
    pub estimated_duration: Duration,
}

impl SequenceMetadata {
    /// Compute metadata over steps
    #[must_use]
    pub fn from_steps(steps: &[ReplayStep]) -> Self {
        let nodes: BTreeSet<&str> = steps.iter().map(|s| s.node_name.as_str()).collect();
        Self {
            total_steps: steps.len(),
            nodes_involved: nodes.into_iter().map(str::to_string).collect(),
            estimated_duration: steps.iter().map(|s| s.execution_time).sum(),
        }
    }
}

/// Ordered collection of steps; order is replay order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySequence {
    /// Sequence id
    pub sequence_id: SequenceId,
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Creation time
    pub created_at: Timestamp,
    /// Aggregate metadata
    pub metadata: SequenceMetadata,
    /// Steps in recorded order
    pub steps: Vec<ReplayStep>,
}

impl ReplaySequence {
    /// Artifact file name; spaces in the name become underscores
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.name.replace(' ', "_"), self.sequence_id)
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcome of replaying one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Sequence the step was replayed from, if any
    #[serde(default)]
    pub sequence_id: Option<SequenceId>,
    /// Step id
    pub step_id: StepId,
    /// Node name
    pub node_name: String,
    /// Whether the node succeeded on replay
    pub success: bool,
    /// Output on replay, `Null` on failure
    pub actual_output: Value,
    /// Recorded output, if the step has one
    #[serde(default)]
    pub expected_output: Option<Value>,
    /// Measured execution time
    #[serde(with = "secs")]
    pub execution_time: Duration,
    /// Differences between actual and expected output
    pub differences: Vec<String>,
    /// Failure on replay
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ReplayResult {
    /// Succeeded with no differences
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.success && self.differences.is_empty()
    }
}
