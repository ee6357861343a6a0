//! Tracer: active/completed trace table with persistence.

use crate::changes::detect_changes;
use crate::trace::{ExecutionTrace, LogEntry, LogLevel, PerformanceMetrics, Thresholds};
use indexmap::IndexMap;
use nodetape_codec::{State, ToCanonical, Value, structural_hash};
use nodetape_core::time::{self, opt_secs, secs};
use nodetape_core::{IdGenerator, Timestamp, TraceId};
use nodetape_node::NodeError;
use nodetape_storage::{ArtifactStore, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Error message for traces completed by the abandonment policy
pub const ABANDONED: &str = "abandoned";

/// Tracer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Record state changes
    pub enable_state_tracking: bool,
    /// Classify execution times
    pub enable_performance_tracking: bool,
    /// Trace artifact directory
    pub trace_dir: PathBuf,
    /// Fallback directory under the process temp dir
    pub fallback_subdir: PathBuf,
    /// Performance thresholds
    pub thresholds: Thresholds,
    /// Active traces older than this are completed as abandoned on the next start
    #[serde(with = "opt_secs")]
    pub active_ttl: Option<Duration>,
    /// Maximum completed traces kept in memory; oldest are dropped first
    pub completed_limit: usize,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enable_state_tracking: true,
            enable_performance_tracking: true,
            trace_dir: PathBuf::from("logs/traces"),
            fallback_subdir: PathBuf::from("traces"),
            thresholds: Thresholds::default(),
            active_ttl: None,
            completed_limit: 1_000,
        }
    }
}

impl TracerConfig {
    /// Store configuration for the trace directory
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.trace_dir, &self.fallback_subdir)
    }
}

/// Point-in-time view of one trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TraceSummary {
    /// Still running
    Active {
        /// Trace id
        trace_id: TraceId,
        /// Node name
        node_name: String,
        /// Start time
        start_time: Timestamp,
        /// Time since start
        #[serde(with = "secs")]
        running_for: Duration,
    },
    /// Completed
    Completed {
        /// Trace id
        trace_id: TraceId,
        /// Node name
        node_name: String,
        /// Whether the node succeeded
        success: bool,
        /// Execution time
        #[serde(with = "opt_secs")]
        execution_time: Option<Duration>,
        /// Number of state changes
        state_changes: usize,
        /// Number of log entries
        log_entries: usize,
    },
}

impl TraceSummary {
    fn completed(trace: &ExecutionTrace) -> Self {
        Self::Completed {
            trace_id: trace.trace_id.clone(),
            node_name: trace.node_name.clone(),
            success: trace.success,
            execution_time: trace.execution_time,
            state_changes: trace.state_changes.len(),
            log_entries: trace.log_entries.len(),
        }
    }
}

/// Aggregate view over the tracer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerSummary {
    /// Active trace count
    pub active_traces: usize,
    /// Completed trace count
    pub completed_traces: usize,
    /// Sum of both
    pub total_traces: usize,
    /// Active trace ids, oldest first
    pub active_trace_ids: Vec<TraceId>,
    /// Last five completed traces, oldest first
    pub recent_completed: Vec<TraceSummary>,
}

struct ActiveTrace {
    trace: ExecutionTrace,
    started: Instant,
}

#[derive(Default)]
struct TraceTable {
    active: IndexMap<TraceId, ActiveTrace>,
    completed: Vec<ExecutionTrace>,
}

/// Node execution tracer
///
/// A trace is in exactly one of the active and completed collections until
/// the completed list evicts it past `completed_limit`. The transition
/// happens under the table lock; persistence runs after the lock is released
/// and cannot undo it.
pub struct Tracer {
    config: TracerConfig,
    store: ArtifactStore,
    ids: IdGenerator,
    table: Mutex<TraceTable>,
}

impl Tracer {
    /// Create a tracer with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TracerConfig::default())
    }

    /// Create a tracer, opening its trace directory
    #[must_use]
    pub fn with_config(config: TracerConfig) -> Self {
        let store = ArtifactStore::open(&config.store_config());
        Self::with_store(config, store)
    }

    /// Create a tracer over an already-opened store
    #[must_use]
    pub fn with_store(config: TracerConfig, store: ArtifactStore) -> Self {
        Self {
            config,
            store,
            ids: IdGenerator::new(),
            table: Mutex::new(TraceTable::default()),
        }
    }

    /// Get configuration
    #[must_use]
    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Trace artifact store
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Start tracing a node execution
    pub fn start_trace<T: ToCanonical + ?Sized>(&self, node_name: &str, input_state: &T) -> TraceId {
        let input_state_hash = structural_hash(&input_state.to_canonical());
        let trace_id = self.ids.trace_id(node_name);
        let trace = ExecutionTrace::new(
            node_name,
            trace_id.clone(),
            time::now(),
            input_state_hash,
        );

        let expired = {
            let mut table = self.lock();
            let expired = self.sweep_expired(&mut table);
            table.active.insert(
                trace_id.clone(),
                ActiveTrace {
                    trace,
                    started: Instant::now(),
                },
            );
            expired
        };
        self.persist_all(&expired);

        tracing::info!(node_name, trace_id = %trace_id, "trace started");
        trace_id
    }

    /// Complete an active trace
    ///
    /// Unknown or already-completed ids are a logged no-op returning `None`.
    pub fn end_trace(
        &self,
        trace_id: &TraceId,
        outcome: Result<&Value, &NodeError>,
    ) -> Option<ExecutionTrace> {
        let trace = {
            let mut table = self.lock();
            self.complete(&mut table, trace_id, outcome)
        };
        let Some(trace) = trace else {
            tracing::warn!(trace_id = %trace_id, "end_trace for unknown or completed trace");
            return None;
        };

        self.persist(&trace);
        match &trace.error_message {
            None => tracing::info!(
                node_name = %trace.node_name,
                trace_id = %trace.trace_id,
                execution_time = trace.execution_time.unwrap_or_default().as_secs_f64(),
                "trace completed"
            ),
            Some(error) => tracing::error!(
                node_name = %trace.node_name,
                trace_id = %trace.trace_id,
                error = %error,
                "trace failed"
            ),
        }
        Some(trace)
    }

    /// Record the field-level difference between two snapshots
    pub fn add_state_change(&self, trace_id: &TraceId, before: &State, after: &State) {
        if !self.config.enable_state_tracking {
            return;
        }
        let mut table = self.lock();
        let Some(active) = table.active.get_mut(trace_id) else {
            tracing::debug!(trace_id = %trace_id, "state change for inactive trace ignored");
            return;
        };
        let changes = detect_changes(before, after, time::now());
        tracing::debug!(trace_id = %trace_id, changes = changes.len(), "state changes recorded");
        active.trace.state_changes.extend(changes);
    }

    /// Attach a log entry to an active trace
    pub fn add_log_entry(
        &self,
        trace_id: &TraceId,
        level: LogLevel,
        message: &str,
        extra: Option<State>,
    ) {
        let mut table = self.lock();
        let Some(active) = table.active.get_mut(trace_id) else {
            tracing::debug!(trace_id = %trace_id, "log entry for inactive trace ignored");
            return;
        };
        active.trace.log_entries.push(LogEntry {
            timestamp: time::now(),
            level,
            message: message.to_string(),
            extra: extra.unwrap_or_default(),
        });
    }

    /// Log at debug level, in the trace and as an event
    pub fn log_debug(&self, trace_id: &TraceId, message: &str, extra: Option<State>) {
        tracing::debug!(trace_id = %trace_id, "{}", message);
        self.add_log_entry(trace_id, LogLevel::Debug, message, extra);
    }

    /// Log at info level, in the trace and as an event
    pub fn log_info(&self, trace_id: &TraceId, message: &str, extra: Option<State>) {
        tracing::info!(trace_id = %trace_id, "{}", message);
        self.add_log_entry(trace_id, LogLevel::Info, message, extra);
    }

    /// Log at warning level, in the trace and as an event
    pub fn log_warning(&self, trace_id: &TraceId, message: &str, extra: Option<State>) {
        tracing::warn!(trace_id = %trace_id, "{}", message);
        self.add_log_entry(trace_id, LogLevel::Warning, message, extra);
    }

    /// Log at error level, in the trace and as an event
    pub fn log_error(&self, trace_id: &TraceId, message: &str, extra: Option<State>) {
        tracing::error!(trace_id = %trace_id, "{}", message);
        self.add_log_entry(trace_id, LogLevel::Error, message, extra);
    }

    /// Check if a trace is active
    #[must_use]
    pub fn is_active(&self, trace_id: &TraceId) -> bool {
        self.lock().active.contains_key(trace_id)
    }

    /// Snapshot of an active trace
    #[must_use]
    pub fn active_trace(&self, trace_id: &TraceId) -> Option<ExecutionTrace> {
        self.lock().active.get(trace_id).map(|a| a.trace.clone())
    }

    /// Completed trace by id
    #[must_use]
    pub fn completed_trace(&self, trace_id: &TraceId) -> Option<ExecutionTrace> {
        self.lock()
            .completed
            .iter()
            .find(|t| &t.trace_id == trace_id)
            .cloned()
    }

    /// All completed traces, in completion order
    #[must_use]
    pub fn completed_traces(&self) -> Vec<ExecutionTrace> {
        self.lock().completed.clone()
    }

    /// Summary of one trace, active or completed
    #[must_use]
    pub fn trace_summary(&self, trace_id: &TraceId) -> Option<TraceSummary> {
        let table = self.lock();
        if let Some(active) = table.active.get(trace_id) {
            return Some(TraceSummary::Active {
                trace_id: trace_id.clone(),
                node_name: active.trace.node_name.clone(),
                start_time: active.trace.start_time,
                running_for: active.started.elapsed(),
            });
        }
        table
            .completed
            .iter()
            .find(|t| &t.trace_id == trace_id)
            .map(TraceSummary::completed)
    }

    /// Summary of all traces
    #[must_use]
    pub fn summary(&self) -> TracerSummary {
        let table = self.lock();
        let active_traces = table.active.len();
        let completed_traces = table.completed.len();
        TracerSummary {
            active_traces,
            completed_traces,
            total_traces: active_traces + completed_traces,
            active_trace_ids: table.active.keys().cloned().collect(),
            recent_completed: table
                .completed
                .iter()
                .rev()
                .take(5)
                .rev()
                .map(TraceSummary::completed)
                .collect(),
        }
    }

    /// Complete every active trace as abandoned
    ///
    /// Intended for shutdown; returns the traces it completed.
    pub fn flush_active(&self) -> Vec<ExecutionTrace> {
        let flushed = {
            let mut table = self.lock();
            let ids: Vec<TraceId> = table.active.keys().cloned().collect();
            self.abandon(&mut table, &ids)
        };
        if !flushed.is_empty() {
            tracing::warn!(count = flushed.len(), "active traces flushed as abandoned");
        }
        self.persist_all(&flushed);
        flushed
    }

    fn sweep_expired(&self, table: &mut TraceTable) -> Vec<ExecutionTrace> {
        let Some(ttl) = self.config.active_ttl else {
            return Vec::new();
        };
        let expired: Vec<TraceId> = table
            .active
            .iter()
            .filter(|(_, a)| a.started.elapsed() > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        if !expired.is_empty() {
            tracing::warn!(count = expired.len(), "expired active traces abandoned");
        }
        self.abandon(table, &expired)
    }

    fn abandon(&self, table: &mut TraceTable, ids: &[TraceId]) -> Vec<ExecutionTrace> {
        let error = NodeError::failed(ABANDONED);
        ids.iter()
            .filter_map(|id| self.complete(table, id, Err(&error)))
            .collect()
    }

    fn complete(
        &self,
        table: &mut TraceTable,
        trace_id: &TraceId,
        outcome: Result<&Value, &NodeError>,
    ) -> Option<ExecutionTrace> {
        let ActiveTrace { mut trace, started } = table.active.shift_remove(trace_id)?;

        let elapsed = started.elapsed();
        trace.end_time = Some(time::advance(&trace.start_time, elapsed));
        trace.execution_time = Some(elapsed);
        match outcome {
            Ok(output) => {
                trace.success = true;
                trace.output_hash = Some(structural_hash(&output.to_canonical()));
            }
            Err(error) => {
                trace.success = false;
                trace.error_message = Some(error.to_string());
                trace.stack_trace = error.stack_trace().map(str::to_string);
            }
        }
        if self.config.enable_performance_tracking {
            trace.performance_metrics =
                Some(PerformanceMetrics::analyze(elapsed, &self.config.thresholds));
        }

        table.completed.push(trace.clone());
        let limit = self.config.completed_limit.max(1);
        if table.completed.len() > limit {
            let excess = table.completed.len() - limit;
            table.completed.drain(..excess);
        }
        Some(trace)
    }

    fn persist(&self, trace: &ExecutionTrace) {
        match self.store.write_json(&trace.file_name(), trace) {
            Ok(persisted) => {
                if let Some(path) = persisted.path() {
                    tracing::debug!(trace_id = %trace.trace_id, path = %path.display(), "trace saved");
                }
            }
            Err(err) => {
                tracing::warn!(trace_id = %trace.trace_id, error = %err, "failed to save trace");
            }
        }
    }

    fn persist_all(&self, traces: &[ExecutionTrace]) {
        for trace in traces {
            self.persist(trace);
        }
    }

    fn lock(&self) -> MutexGuard<'_, TraceTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
