//! Replay engine: record node executions, persist sequences, replay them.

use crate::diff::{DiffDepth, compare_outputs};
use crate::gate::{AutoContinue, StepGate, StepPrompt};
use crate::persist::{load_sequence, save_sequence};
use crate::step::{ReplayResult, ReplaySequence, ReplayStep, SequenceMetadata};
use nodetape_codec::{Serializer, State, ToCanonical, Value};
use nodetape_core::time::secs;
use nodetape_core::{IdGenerator, StepId, TapeError, TapeResult};
use nodetape_node::{NodeRegistry, invoke};
use nodetape_storage::{ArtifactStore, Persisted, StoreConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Replay pacing and stopping behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// Bounded sleep approximating recorded pacing before each step
    Exact,
    /// No delay between steps
    #[default]
    Fast,
    /// Wait for the step gate before each step
    Step,
    /// Stop after the first failing step
    Debug,
}

impl ReplayMode {
    /// Mode name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fast => "fast",
            Self::Step => "step",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplayMode {
    type Err = TapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fast" => Ok(Self::Fast),
            "step" => Ok(Self::Step),
            "debug" => Ok(Self::Debug),
            _ => Err(TapeError::configuration(format!("unknown replay mode: {}", s))),
        }
    }
}

/// Replay engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Replay mode
    pub mode: ReplayMode,
    /// Upper bound on the exact-mode sleep before a step
    #[serde(with = "secs")]
    pub exact_delay_cap: Duration,
    /// Sequence artifact directory
    pub sequence_dir: PathBuf,
    /// Fallback directory under the process temp dir
    pub fallback_subdir: PathBuf,
    /// Output comparison depth
    pub diff_depth: DiffDepth,
    /// Maximum replay results kept in memory; oldest are dropped first
    pub history_limit: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            mode: ReplayMode::Fast,
            exact_delay_cap: Duration::from_millis(100),
            sequence_dir: PathBuf::from("logs/replay/sequences"),
            fallback_subdir: PathBuf::from("replay/sequences"),
            diff_depth: DiffDepth::Shallow,
            history_limit: 10_000,
        }
    }
}

impl ReplayConfig {
    /// Store configuration for the sequence directory
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.sequence_dir, &self.fallback_subdir)
    }
}

/// One line of the replay summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayBrief {
    /// Step id
    pub step_id: StepId,
    /// Node name
    pub node_name: String,
    /// Whether the replay succeeded
    pub success: bool,
    /// Execution time
    #[serde(with = "secs")]
    pub execution_time: Duration,
    /// Number of differences
    pub differences: usize,
}

/// Aggregate view over the replay history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Replays recorded
    pub total_replays: usize,
    /// Successful replays
    pub successful: usize,
    /// Failed replays
    pub failed: usize,
    /// Successful share, percent
    pub success_rate: f64,
    /// Mean execution time
    #[serde(with = "secs")]
    pub average_execution_time: Duration,
    /// Distinct nodes replayed, sorted
    pub nodes_replayed: Vec<String>,
    /// Sum of differences across replays
    pub total_differences: usize,
    /// Five most recent replays, oldest first
    pub recent_replays: Vec<ReplayBrief>,
}

/// Record/replay engine
///
/// Consumes the node registry read-only. Steps of one sequence run strictly
/// one after another.
pub struct ReplayEngine {
    config: ReplayConfig,
    serializer: Arc<Serializer>,
    registry: Arc<NodeRegistry>,
    store: ArtifactStore,
    gate: Box<dyn StepGate>,
    ids: IdGenerator,
    history: Mutex<Vec<ReplayResult>>,
}

impl ReplayEngine {
    /// Create an engine, opening its sequence directory
    #[must_use]
    pub fn new(config: ReplayConfig, serializer: Arc<Serializer>, registry: Arc<NodeRegistry>) -> Self {
        let store = ArtifactStore::open(&config.store_config());
        Self::with_store(config, serializer, registry, store)
    }

    /// Create an engine over an already-opened sequence store
    #[must_use]
    pub fn with_store(
        config: ReplayConfig,
        serializer: Arc<Serializer>,
        registry: Arc<NodeRegistry>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            config,
            serializer,
            registry,
            store,
            gate: Box::new(AutoContinue),
            ids: IdGenerator::new(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Set the step-mode gate
    #[must_use]
    pub fn with_gate(mut self, gate: impl StepGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Get configuration
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Current mode
    #[must_use]
    pub fn mode(&self) -> ReplayMode {
        self.config.mode
    }

    /// Change the mode
    pub fn set_mode(&mut self, mode: ReplayMode) {
        self.config.mode = mode;
    }

    /// Sequence artifact store
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Build a step from data captured elsewhere, without running the node
    ///
    /// # Errors
    ///
    /// Returns error if the input or output cannot be serialized
    pub fn create_replay_step<T: ToCanonical + ?Sized>(
        &self,
        node_name: &str,
        input_state: &T,
        expected_output: Option<&Value>,
    ) -> TapeResult<ReplayStep> {
        let input_data = self.serializer.encode_input(input_state, node_name)?;
        let expected_output = expected_output
            .map(|output| self.serializer.encode_output(output, node_name))
            .transpose()?;

        let step = ReplayStep {
            step_id: self.ids.step_id(node_name),
            node_name: node_name.to_string(),
            input_data,
            expected_output,
            timestamp: nodetape_core::time::now(),
            execution_time: Duration::ZERO,
            success: true,
            error_message: None,
        };
        tracing::info!(step_id = %step.step_id, node_name, "replay step created");
        Ok(step)
    }

    /// Run a node and record the execution as a replay step
    ///
    /// Node failures are captured into the step; the recorded output
    /// becomes the step's expected output.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNode` before running anything if the node is not
    /// registered, or an encode error if serialization fails
    pub async fn record_node_execution(&self, node_name: &str, input_state: State) -> TapeResult<ReplayStep> {
        let node = self.registry.get(node_name)?;
        tracing::info!(node_name, "recording node execution");

        let input_data = self.serializer.encode_input(&input_state, node_name)?;
        let invocation = invoke(node.as_ref(), input_state).await;

        let (expected_output, error_message) = match &invocation.output {
            Ok(output) => (Some(self.serializer.encode_output(output, node_name)?), None),
            Err(err) => {
                tracing::error!(node_name, error = %err, "node failed during recording");
                (None, Some(err.to_string()))
            }
        };

        let step = ReplayStep {
            step_id: self.ids.step_id(node_name),
            node_name: node_name.to_string(),
            input_data,
            expected_output,
            timestamp: nodetape_core::time::now(),
            execution_time: invocation.elapsed,
            success: invocation.is_success(),
            error_message,
        };
        tracing::info!(
            step_id = %step.step_id,
            success = step.success,
            execution_time = step.execution_time.as_secs_f64(),
            "node execution recorded"
        );
        Ok(step)
    }

    /// Group steps into a sequence, preserving their order
    #[must_use]
    pub fn create_replay_sequence(&self, name: &str, description: &str, steps: Vec<ReplayStep>) -> ReplaySequence {
        let sequence = ReplaySequence {
            sequence_id: self.ids.sequence_id(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: nodetape_core::time::now(),
            metadata: SequenceMetadata::from_steps(&steps),
            steps,
        };
        tracing::info!(
            sequence_id = %sequence.sequence_id,
            steps = sequence.len(),
            "replay sequence created"
        );
        sequence
    }

    /// Save a sequence document
    ///
    /// Returns [`Persisted::Disabled`] when no directory is usable.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the write fails
    pub fn save_replay_sequence(&self, sequence: &ReplaySequence) -> TapeResult<Persisted> {
        let persisted = save_sequence(&self.store, sequence)?;
        match persisted.path() {
            Some(path) => tracing::info!(
                sequence_id = %sequence.sequence_id,
                path = %path.display(),
                "replay sequence saved"
            ),
            None => tracing::warn!(
                sequence_id = %sequence.sequence_id,
                "persistence disabled, replay sequence not saved"
            ),
        }
        Ok(persisted)
    }

    /// Load a sequence document
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated
    pub fn load_replay_sequence(&self, path: &Path) -> TapeResult<ReplaySequence> {
        let sequence = load_sequence(path)?;
        tracing::info!(
            sequence_id = %sequence.sequence_id,
            steps = sequence.len(),
            "replay sequence loaded"
        );
        Ok(sequence)
    }

    /// Replay one step against its recorded input
    ///
    /// # Errors
    ///
    /// Returns `UnknownNode` before any work if the node is not registered,
    /// or a decode error if the recorded data is corrupt
    pub async fn replay_step(&self, step: &ReplayStep) -> TapeResult<ReplayResult> {
        let node = self.registry.get(&step.node_name)?;
        tracing::info!(step_id = %step.step_id, node_name = %step.node_name, "replaying step");

        let input_state = self.serializer.decode_input(&step.input_data)?;
        let expected_output = step
            .expected_output
            .as_ref()
            .map(|data| self.serializer.decode_output(data))
            .transpose()?;

        let invocation = invoke(node.as_ref(), input_state).await;
        let success = invocation.is_success();
        let error_message = invocation.error_message();
        let actual_output = invocation.output.unwrap_or_default();

        let differences = expected_output
            .as_ref()
            .map(|expected| compare_outputs(&actual_output, expected, self.config.diff_depth))
            .unwrap_or_default();

        let result = ReplayResult {
            sequence_id: None,
            step_id: step.step_id.clone(),
            node_name: step.node_name.clone(),
            success,
            actual_output,
            expected_output,
            execution_time: invocation.elapsed,
            differences,
            error_message,
        };

        if let Some(error) = &result.error_message {
            tracing::error!(step_id = %step.step_id, error = %error, "node failed during replay");
        }
        tracing::info!(
            step_id = %result.step_id,
            success = result.success,
            execution_time = result.execution_time.as_secs_f64(),
            differences = result.differences.len(),
            "step replayed"
        );
        Ok(result)
    }

    /// Replay every step of a sequence in recorded order
    ///
    /// Returns results only for steps that ran: debug mode stops after the
    /// first failing step, and a declining gate in step mode cancels the rest.
    ///
    /// # Errors
    ///
    /// Returns the first step-level error (unknown node, corrupt data)
    pub async fn replay_sequence(&self, sequence: &ReplaySequence) -> TapeResult<Vec<ReplayResult>> {
        tracing::info!(
            sequence_id = %sequence.sequence_id,
            name = %sequence.name,
            mode = %self.config.mode,
            "replaying sequence"
        );
        let total = sequence.len();
        let mut results = Vec::with_capacity(total);

        for (index, step) in sequence.steps.iter().enumerate() {
            let position = index + 1;
            tracing::debug!(position, total, node_name = %step.node_name, "next step");

            match self.config.mode {
                ReplayMode::Exact => {
                    tokio::time::sleep(step.execution_time.min(self.config.exact_delay_cap)).await;
                }
                ReplayMode::Step => {
                    let prompt = StepPrompt {
                        position,
                        total,
                        step_id: step.step_id.clone(),
                        node_name: step.node_name.clone(),
                    };
                    if !self.gate.proceed(&prompt).await {
                        tracing::warn!(position, total, "replay cancelled at step gate");
                        break;
                    }
                }
                ReplayMode::Fast | ReplayMode::Debug => {}
            }

            let mut result = self.replay_step(step).await?;
            result.sequence_id = Some(sequence.sequence_id.clone());
            self.record(result.clone());
            let failed = !result.success;
            results.push(result);

            if self.config.mode == ReplayMode::Debug && failed {
                tracing::warn!(step_id = %step.step_id, "stopping replay at failed step");
                break;
            }
        }

        tracing::info!(
            sequence_id = %sequence.sequence_id,
            executed = results.len(),
            "sequence replay completed"
        );
        Ok(results)
    }

    /// Replay one step outside any sequence and keep it in the history
    ///
    /// # Errors
    ///
    /// See [`replay_step`](Self::replay_step)
    pub async fn replay_single(&self, step: &ReplayStep) -> TapeResult<ReplayResult> {
        let result = self.replay_step(step).await?;
        self.record(result.clone());
        Ok(result)
    }

    /// Replay history, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<ReplayResult> {
        self.lock_history().clone()
    }

    /// Summarize the retained replay history
    #[must_use]
    pub fn summary(&self) -> ReplaySummary {
        let history = self.lock_history();
        let total = history.len();
        let successful = history.iter().filter(|r| r.success).count();
        let total_time: Duration = history.iter().map(|r| r.execution_time).sum();
        let nodes: BTreeSet<&str> = history.iter().map(|r| r.node_name.as_str()).collect();

        ReplaySummary {
            total_replays: total,
            successful,
            failed: total - successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64 * 100.0
            },
            average_execution_time: if total == 0 {
                Duration::ZERO
            } else {
                total_time / u32::try_from(total).unwrap_or(u32::MAX)
            },
            nodes_replayed: nodes.into_iter().map(str::to_string).collect(),
            total_differences: history.iter().map(|r| r.differences.len()).sum(),
            recent_replays: history
                .iter()
                .rev()
                .take(5)
                .rev()
                .map(|r| ReplayBrief {
                    step_id: r.step_id.clone(),
                    node_name: r.node_name.clone(),
                    success: r.success,
                    execution_time: r.execution_time,
                    differences: r.differences.len(),
                })
                .collect(),
        }
    }

    fn record(&self, result: ReplayResult) {
        let mut history = self.lock_history();
        history.push(result);
        let limit = self.config.history_limit.max(1);
        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
        }
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<ReplayResult>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ReplayEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{ChannelGate, GateSignal};
    use nodetape_codec::SerializerConfig;
    use nodetape_node::{FnNode, NodeError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Arc<NodeRegistry> {
        let registry = NodeRegistry::new()
            .with_node(FnNode::sync("start_review", |_| {
                Ok(Value::map([("step", Value::from("next"))]))
            }))
            .unwrap()
            .with_node(FnNode::sync("analyze_code", |state| {
                let files = state.get("files").cloned().unwrap_or(Value::List(Vec::new()));
                Ok(Value::map([("analyzed", files)]))
            }))
            .unwrap()
            .with_node(FnNode::sync("error_handler", |_| {
                Err(NodeError::failed("unrecoverable"))
            }))
            .unwrap();
        Arc::new(registry)
    }

    fn engine(mode: ReplayMode, dir: &Path) -> ReplayEngine {
        let serializer = Arc::new(Serializer::with_store(
            SerializerConfig::default(),
            ArtifactStore::disabled(),
        ));
        ReplayEngine::new(
            ReplayConfig {
                mode,
                sequence_dir: dir.to_path_buf(),
                ..ReplayConfig::default()
            },
            serializer,
            registry(),
        )
    }

    fn input() -> State {
        [(
            "files".to_string(),
            Value::List(vec!["a.py".into(), "b.py".into()]),
        )]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_record_replay_roundtrip_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Fast, tmp.path());

        let step = engine
            .record_node_execution("start_review", State::new())
            .await
            .unwrap();
        assert!(step.success);
        assert!(step.expected_output.is_some());

        let sequence = engine.create_replay_sequence("Test Workflow", "single step", vec![step]);
        let persisted = engine.save_replay_sequence(&sequence).unwrap();
        let loaded = engine
            .load_replay_sequence(persisted.path().unwrap())
            .unwrap();

        let results = engine.replay_sequence(&loaded).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].differences.is_empty());
        assert_eq!(
            results[0].actual_output,
            Value::map([("step", Value::from("next"))])
        );
        assert_eq!(results[0].sequence_id.as_ref(), Some(&sequence.sequence_id));
        assert!(results[0].is_match());
    }

    #[tokio::test]
    async fn test_unknown_node_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Fast, tmp.path());
        let err = engine
            .record_node_execution("deploy", State::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TapeError::UnknownNode {
                name: "deploy".to_string()
            }
        );

        let step = engine
            .create_replay_step("deploy", &State::new(), None)
            .unwrap();
        assert!(matches!(
            engine.replay_step(&step).await.unwrap_err(),
            TapeError::UnknownNode { .. }
        ));
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_failed_recording_is_captured() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Fast, tmp.path());
        let step = engine
            .record_node_execution("error_handler", input())
            .await
            .unwrap();
        assert!(!step.success);
        assert_eq!(step.error_message.as_deref(), Some("unrecoverable"));
        assert!(step.expected_output.is_none());

        let result = engine.replay_step(&step).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.actual_output, Value::Null);
        assert!(result.differences.is_empty());
    }

    #[tokio::test]
    async fn test_drift_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Fast, tmp.path());
        let stale = Value::map([("analyzed", Value::List(vec!["a.py".into()]))]);
        let step = engine
            .create_replay_step("analyze_code", &input(), Some(&stale))
            .unwrap();

        let result = engine.replay_single(&step).await.unwrap();
        assert!(result.success);
        assert_eq!(
            result.differences,
            vec![r#"Value mismatch for 'analyzed': ["a.py","b.py"] vs ["a.py"]"#.to_string()]
        );
        assert_eq!(engine.summary().total_differences, 1);
    }

    #[tokio::test]
    async fn test_replay_preserves_order() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Fast, tmp.path());
        let names = ["analyze_code", "start_review", "analyze_code", "start_review"];
        let mut steps = Vec::new();
        for name in names {
            steps.push(engine.record_node_execution(name, input()).await.unwrap());
        }
        let sequence = engine.create_replay_sequence("order", "", steps);
        assert_eq!(sequence.metadata.total_steps, 4);
        assert_eq!(
            sequence.metadata.nodes_involved,
            vec!["analyze_code".to_string(), "start_review".to_string()]
        );

        let results = engine.replay_sequence(&sequence).await.unwrap();
        assert_eq!(results.len(), sequence.steps.len());
        for (result, step) in results.iter().zip(&sequence.steps) {
            assert_eq!(result.node_name, step.node_name);
            assert_eq!(result.step_id, step.step_id);
        }
    }

    #[tokio::test]
    async fn test_debug_mode_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Debug, tmp.path());
        let mut steps = Vec::new();
        for name in ["start_review", "analyze_code", "error_handler", "start_review"] {
            steps.push(engine.record_node_execution(name, input()).await.unwrap());
        }
        let sequence = engine.create_replay_sequence("debug", "", steps);

        let results = engine.replay_sequence(&sequence).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(!results[2].success);

        let summary = engine.summary();
        assert_eq!(summary.total_replays, 3);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_fast_mode_runs_past_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Fast, tmp.path());
        let mut steps = Vec::new();
        for name in ["error_handler", "start_review"] {
            steps.push(engine.record_node_execution(name, input()).await.unwrap());
        }
        let sequence = engine.create_replay_sequence("fast", "", steps);
        assert_eq!(engine.replay_sequence(&sequence).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_mode_caps_delay() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Exact, tmp.path());
        let mut step = engine
            .record_node_execution("start_review", State::new())
            .await
            .unwrap();
        step.execution_time = Duration::from_secs(30);
        let sequence = engine.create_replay_sequence("exact", "", vec![step.clone(), step]);

        let started = tokio::time::Instant::now();
        let results = engine.replay_sequence(&sequence).await.unwrap();
        assert_eq!(results.len(), 2);
        // two capped sleeps, not two 30s sleeps
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_step_mode_gate_declines() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, gate) = ChannelGate::channel(4);
        let engine = engine(ReplayMode::Step, tmp.path()).with_gate(gate);
        let mut steps = Vec::new();
        for name in ["start_review", "analyze_code", "start_review"] {
            steps.push(engine.record_node_execution(name, input()).await.unwrap());
        }
        let sequence = engine.create_replay_sequence("step", "", steps);

        tx.send(GateSignal::Continue).await.unwrap();
        tx.send(GateSignal::Continue).await.unwrap();
        tx.send(GateSignal::Decline).await.unwrap();

        let results = engine.replay_sequence(&sequence).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_step_mode_counts_prompts() {
        struct Counting(AtomicUsize);

        #[async_trait::async_trait]
        impl StepGate for Counting {
            async fn proceed(&self, prompt: &StepPrompt) -> bool {
                let seen = self.0.fetch_add(1, Ordering::SeqCst) + 1;
                assert_eq!(prompt.position, seen);
                true
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Step, tmp.path()).with_gate(Counting(AtomicUsize::new(0)));
        let step = engine
            .record_node_execution("start_review", State::new())
            .await
            .unwrap();
        let sequence = engine.create_replay_sequence("prompts", "", vec![step.clone(), step]);
        assert_eq!(engine.replay_sequence(&sequence).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tampered_step_is_integrity_error() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(ReplayMode::Fast, tmp.path());
        let mut step = engine
            .record_node_execution("analyze_code", input())
            .await
            .unwrap();
        step.input_data.data = step.input_data.data.replace("a.py", "z.py");
        assert!(matches!(
            engine.replay_step(&step).await.unwrap_err(),
            TapeError::Integrity { .. }
        ));
    }

    #[tokio::test]
    async fn test_history_limit() {
        let serializer = Arc::new(Serializer::with_store(
            SerializerConfig::default(),
            ArtifactStore::disabled(),
        ));
        let engine = ReplayEngine::with_store(
            ReplayConfig {
                history_limit: 2,
                ..ReplayConfig::default()
            },
            serializer,
            registry(),
            ArtifactStore::disabled(),
        );
        let mut steps = Vec::new();
        for name in ["start_review", "analyze_code", "error_handler", "start_review"] {
            steps.push(engine.record_node_execution(name, input()).await.unwrap());
        }
        let sequence = engine.create_replay_sequence("capped", "", steps);

        assert_eq!(engine.replay_sequence(&sequence).await.unwrap().len(), 4);
        let history = engine.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].step_id, sequence.steps[2].step_id);
        assert_eq!(history[1].step_id, sequence.steps[3].step_id);

        let summary = engine.summary();
        assert_eq!(summary.total_replays, 2);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_summary_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = engine(ReplayMode::Fast, tmp.path()).summary();
        assert_eq!(summary.total_replays, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.recent_replays.is_empty());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("EXACT".parse::<ReplayMode>().unwrap(), ReplayMode::Exact);
        assert_eq!(ReplayMode::Debug.to_string(), "debug");
        assert!(matches!(
            "slow".parse::<ReplayMode>().unwrap_err(),
            TapeError::Configuration { .. }
        ));
        let config: ReplayConfig =
            serde_json::from_str(r#"{"mode": "step", "exact_delay_cap": 0.05}"#).unwrap();
        assert_eq!(config.mode, ReplayMode::Step);
        assert_eq!(config.exact_delay_cap, Duration::from_millis(50));
        assert_eq!(config.diff_depth, DiffDepth::Shallow);
        assert_eq!(config.history_limit, 10_000);
    }
}
