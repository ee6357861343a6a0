//! Session context object.

use crate::config::SessionConfig;
use nodetape_codec::{SerializationSummary, Serializer, State, Value};
use nodetape_core::TapeResult;
use nodetape_node::{NodeError, NodeRegistry};
use nodetape_replay::{ReplayEngine, ReplaySummary};
use nodetape_storage::ArtifactStore;
use nodetape_trace::{ExecutionTrace, Tracer, TracerSummary, instrumented_call};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Combined view over every component of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Serializer history
    pub serialization: SerializationSummary,
    /// Tracer state
    pub tracing: TracerSummary,
    /// Replay history
    pub replay: ReplaySummary,
}

/// Serializer, tracer, and replay engine built from one configuration
///
/// Opening a session resolves every artifact directory once. An unusable
/// directory degrades to its fallback, then to disabled persistence; it
/// never fails construction.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    registry: Arc<NodeRegistry>,
    serializer: Arc<Serializer>,
    tracer: Tracer,
    replay: ReplayEngine,
}

impl Session {
    /// Open a session over a node registry
    #[must_use]
    pub fn new(config: SessionConfig, registry: Arc<NodeRegistry>) -> Self {
        let serializer = Arc::new(Serializer::with_store(
            config.serializer.clone(),
            ArtifactStore::open(&config.serializer_store()),
        ));
        let tracer = Tracer::with_store(
            config.tracer.clone(),
            ArtifactStore::open(&config.tracer_store()),
        );
        let replay = ReplayEngine::with_store(
            config.replay.clone(),
            Arc::clone(&serializer),
            Arc::clone(&registry),
            ArtifactStore::open(&config.replay_store()),
        );

        tracing::info!(
            nodes = registry.len(),
            mode = %config.replay.mode,
            data_dir = ?serializer.store().dir(),
            trace_dir = ?tracer.store().dir(),
            sequence_dir = ?replay.store().dir(),
            "session opened"
        );

        Self {
            config,
            registry,
            serializer,
            tracer,
            replay,
        }
    }

    /// Open a session from a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the file cannot be read or parsed
    pub fn from_json_file(path: impl AsRef<Path>, registry: Arc<NodeRegistry>) -> TapeResult<Self> {
        Ok(Self::new(SessionConfig::from_json_file(path)?, registry))
    }

    /// Get configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Node registry
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Serializer shared with the replay engine
    #[must_use]
    pub fn serializer(&self) -> &Arc<Serializer> {
        &self.serializer
    }

    /// Tracer
    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Replay engine
    #[must_use]
    pub fn replay(&self) -> &ReplayEngine {
        &self.replay
    }

    /// Replay engine, for reconfiguring the mode
    pub fn replay_mut(&mut self) -> &mut ReplayEngine {
        &mut self.replay
    }

    /// Call a registered node under a trace
    ///
    /// The outer result fails only when the node is unknown, before any
    /// trace is started; the inner result is the node's own outcome.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNode` if no node is registered under `node_name`
    pub async fn traced_call(
        &self,
        node_name: &str,
        input: State,
    ) -> TapeResult<Result<Value, NodeError>> {
        let node = self.registry.get(node_name)?;
        Ok(instrumented_call(&self.tracer, node.as_ref(), input).await)
    }

    /// Summary of every component
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            serialization: self.serializer.summary(),
            tracing: self.tracer.summary(),
            replay: self.replay.summary(),
        }
    }

    /// Close the session, completing every still-active trace as abandoned
    pub fn shutdown(self) -> Vec<ExecutionTrace> {
        let flushed = self.tracer.flush_active();
        tracing::info!(flushed = flushed.len(), "session closed");
        flushed
    }
}
