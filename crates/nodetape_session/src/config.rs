//! Session configuration.

use nodetape_codec::SerializerConfig;
use nodetape_core::{TapeError, TapeResult};
use nodetape_replay::ReplayConfig;
use nodetape_storage::StoreConfig;
use nodetape_trace::TracerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for every component of a session
///
/// Every section is optional in JSON; missing sections and fields take
/// their defaults. Durations are seconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Serializer settings
    pub serializer: SerializerConfig,
    /// Tracer settings
    pub tracer: TracerConfig,
    /// Replay engine settings
    pub replay: ReplayConfig,
    /// Root for all fallback directories (process temp dir when unset)
    pub fallback_root: Option<PathBuf>,
}

impl SessionConfig {
    /// Parse a JSON document
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the document is malformed
    pub fn from_json(json: &str) -> TapeResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| TapeError::configuration(format!("invalid session config: {}", e)))
    }

    /// Read a JSON document from disk
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the file cannot be read or parsed
    pub fn from_json_file(path: impl AsRef<Path>) -> TapeResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TapeError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), "session config loaded");
        Ok(config)
    }

    /// Store configuration for serialized-data artifacts
    #[must_use]
    pub fn serializer_store(&self) -> StoreConfig {
        self.rooted(self.serializer.store_config())
    }

    /// Store configuration for trace artifacts
    #[must_use]
    pub fn tracer_store(&self) -> StoreConfig {
        self.rooted(self.tracer.store_config())
    }

    /// Store configuration for sequence artifacts
    #[must_use]
    pub fn replay_store(&self) -> StoreConfig {
        self.rooted(self.replay.store_config())
    }

    fn rooted(&self, store: StoreConfig) -> StoreConfig {
        match &self.fallback_root {
            Some(root) => store.with_fallback_root(root),
            None => store,
        }
    }
}
