//! Serializer: canonical encode/decode with history and artifact storage.

use crate::canonical::{FromCanonical, ToCanonical};
use crate::encoding::{decode_payload, encode_payload};
use crate::envelope::{SCHEMA_VERSION, SERIALIZER_VERSION, SerializationMetadata, SerializedData};
use crate::format::{DataType, SerializationFormat};
use crate::value::{State, Value, ValueKind};
use nodetape_core::{DecodeStage, TapeError, TapeResult, Timestamp};
use nodetape_storage::{ArtifactStore, Persisted, StoreConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Serializer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Format used when a call does not name one
    pub default_format: SerializationFormat,
    /// Directory for standalone serialized-data artifacts
    pub data_dir: PathBuf,
    /// Fallback directory under the process temp dir
    pub fallback_subdir: PathBuf,
    /// Fields restored on decoded input states when missing
    pub input_defaults: BTreeMap<String, Value>,
    /// Maximum history records kept; oldest are dropped first
    pub history_limit: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            default_format: SerializationFormat::PlainText,
            data_dir: PathBuf::from("logs/serialization/data"),
            fallback_subdir: PathBuf::from("serialization/data"),
            input_defaults: BTreeMap::new(),
            history_limit: 10_000,
        }
    }
}

impl SerializerConfig {
    /// Store configuration for the data directory
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.data_dir, &self.fallback_subdir)
    }
}

/// One encode operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializationRecord {
    /// Encode time
    pub timestamp: Timestamp,
    /// Node the data belongs to
    pub node_name: Option<String>,
    /// Input or output
    pub data_type: DataType,
    /// Encoding used
    pub format: SerializationFormat,
    /// Uncompressed canonical size
    pub size: u64,
    /// Payload checksum
    pub checksum: String,
}

/// Aggregate view over the serialization history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializationSummary {
    /// Encode operations recorded
    pub total_operations: usize,
    /// Counts keyed by data type
    pub by_data_type: BTreeMap<String, usize>,
    /// Counts keyed by format
    pub by_format: BTreeMap<String, usize>,
    /// Sum of canonical sizes
    pub total_size: u64,
    /// Five most recent operations, oldest first
    pub recent: Vec<SerializationRecord>,
}

/// Canonical serializer
pub struct Serializer {
    config: SerializerConfig,
    store: ArtifactStore,
    history: Mutex<Vec<SerializationRecord>>,
}

impl Serializer {
    /// Create a serializer with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    /// Create a serializer, opening its artifact directory
    #[must_use]
    pub fn with_config(config: SerializerConfig) -> Self {
        let store = ArtifactStore::open(&config.store_config());
        Self::with_store(config, store)
    }

    /// Create a serializer over an already-opened store
    #[must_use]
    pub fn with_store(config: SerializerConfig, store: ArtifactStore) -> Self {
        Self {
            config,
            store,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Get configuration
    #[must_use]
    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Artifact store for serialized data
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Encode in the default format
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be encoded
    pub fn encode<T: ToCanonical + ?Sized>(
        &self,
        value: &T,
        data_type: DataType,
        node_name: Option<&str>,
    ) -> TapeResult<SerializedData> {
        self.encode_as(value, self.config.default_format, data_type, node_name)
    }

    /// Encode in a chosen format
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be encoded
    pub fn encode_as<T: ToCanonical + ?Sized>(
        &self,
        value: &T,
        format: SerializationFormat,
        data_type: DataType,
        node_name: Option<&str>,
    ) -> TapeResult<SerializedData> {
        let canonical = value.to_canonical();
        let encoded = encode_payload(&canonical, format)?;

        let data = SerializedData {
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: SerializationMetadata {
                format,
                timestamp: nodetape_core::time::now(),
                version: SERIALIZER_VERSION.to_string(),
                checksum: encoded.checksum,
                original_size: encoded.original_size,
                compressed_size: encoded.compressed_size,
                node_name: node_name.map(str::to_string),
                data_type,
            },
            data: encoded.payload,
        };

        tracing::debug!(
            node_name = node_name.unwrap_or("-"),
            data_type = %data_type,
            format = %format,
            size = data.metadata.original_size,
            checksum = data.checksum_prefix(),
            "encoded"
        );
        self.record(&data);
        Ok(data)
    }

    /// Encode a node input state
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be encoded
    pub fn encode_input<T: ToCanonical + ?Sized>(
        &self,
        state: &T,
        node_name: &str,
    ) -> TapeResult<SerializedData> {
        self.encode(state, DataType::Input, Some(node_name))
    }

    /// Encode a node output
    ///
    /// # Errors
    ///
    /// Returns error if the output cannot be encoded
    pub fn encode_output<T: ToCanonical + ?Sized>(
        &self,
        output: &T,
        node_name: &str,
    ) -> TapeResult<SerializedData> {
        self.encode(output, DataType::Output, Some(node_name))
    }

    /// Decode to the canonical value
    ///
    /// # Errors
    ///
    /// Returns `Integrity` on checksum mismatch or `Decode` on malformed data
    pub fn decode(&self, data: &SerializedData) -> TapeResult<Value> {
        let value = decode_payload(&data.data, data.format(), &data.metadata.checksum)?;
        tracing::debug!(
            node_name = data.node_name().unwrap_or("-"),
            format = %data.format(),
            checksum = data.checksum_prefix(),
            "decoded"
        );
        Ok(value)
    }

    /// Decode into a domain type
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails or the value has the wrong shape
    pub fn decode_as<T: FromCanonical>(&self, data: &SerializedData) -> TapeResult<T> {
        let value = self.decode(data)?;
        Ok(T::from_canonical(&value)?)
    }

    /// Decode a node input state, restoring configured default fields
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails or the value is not a map
    pub fn decode_input(&self, data: &SerializedData) -> TapeResult<State> {
        let value = self.decode(data)?;
        let kind = value.kind();
        let mut state = value.into_map().ok_or_else(|| {
            TapeError::decode(
                DecodeStage::Parse,
                format!("input state must be a {}, found {}", ValueKind::Map, kind),
            )
        })?;
        for (field, default) in &self.config.input_defaults {
            state
                .entry(field.clone())
                .or_insert_with(|| default.clone());
        }
        Ok(state)
    }

    /// Decode a node output
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails
    pub fn decode_output(&self, data: &SerializedData) -> TapeResult<Value> {
        self.decode(data)
    }

    /// Save a standalone serialized-data document
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the write fails
    pub fn save_serialized_data(
        &self,
        data: &SerializedData,
        file_name: &str,
    ) -> TapeResult<Persisted> {
        let persisted = self.store.write_json(file_name, data)?;
        if let Some(path) = persisted.path() {
            tracing::info!(path = %path.display(), "serialized data saved");
        }
        Ok(persisted)
    }

    /// Load a standalone serialized-data document
    ///
    /// Format names are parsed back into [`SerializationFormat`]; unknown
    /// names fail the load.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_serialized_data(&self, path: &Path) -> TapeResult<SerializedData> {
        let data: SerializedData = ArtifactStore::read_json(path)?;
        tracing::info!(path = %path.display(), format = %data.format(), "serialized data loaded");
        Ok(data)
    }

    /// Encode history, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<SerializationRecord> {
        self.lock_history().clone()
    }

    /// Summarize the encode history
    #[must_use]
    pub fn summary(&self) -> SerializationSummary {
        let history = self.lock_history();
        let mut by_data_type = BTreeMap::new();
        let mut by_format = BTreeMap::new();
        for record in history.iter() {
            *by_data_type
                .entry(record.data_type.to_string())
                .or_insert(0) += 1;
            *by_format.entry(record.format.to_string()).or_insert(0) += 1;
        }
        SerializationSummary {
            total_operations: history.len(),
            by_data_type,
            by_format,
            total_size: history.iter().map(|r| r.size).sum(),
            recent: history.iter().rev().take(5).rev().cloned().collect(),
        }
    }

    fn record(&self, data: &SerializedData) {
        let mut history = self.lock_history();
        history.push(SerializationRecord {
            timestamp: data.metadata.timestamp,
            node_name: data.metadata.node_name.clone(),
            data_type: data.metadata.data_type,
            format: data.metadata.format,
            size: data.metadata.original_size,
            checksum: data.metadata.checksum.clone(),
        });
        let limit = self.config.history_limit.max(1);
        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
        }
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<SerializationRecord>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Serializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializer")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalEnum, field, require_map};
    use crate::CodecError;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::BTreeSet;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum ReviewStatus {
        Pending,
        Analyzing,
    }

    impl CanonicalEnum for ReviewStatus {
        const TYPE_NAME: &'static str = "ReviewStatus";

        fn as_canonical_str(&self) -> &'static str {
            match self {
                Self::Pending => "PENDING",
                Self::Analyzing => "ANALYZING",
            }
        }

        fn from_canonical_str(s: &str) -> Option<Self> {
            match s {
                "PENDING" => Some(Self::Pending),
                "ANALYZING" => Some(Self::Analyzing),
                _ => None,
            }
        }
    }

    crate::impl_canonical_enum!(ReviewStatus);

    #[derive(Debug, Clone, PartialEq)]
    struct ReviewState {
        status: ReviewStatus,
        files: BTreeSet<String>,
        created: DateTime<Utc>,
    }

    impl ToCanonical for ReviewState {
        fn to_canonical(&self) -> Value {
            Value::map([
                ("status", self.status.to_canonical()),
                ("files", self.files.to_canonical()),
                ("created", self.created.to_canonical()),
            ])
        }
    }

    impl FromCanonical for ReviewState {
        fn from_canonical(value: &Value) -> Result<Self, CodecError> {
            let map = require_map(value)?;
            Ok(Self {
                status: field(map, "status")?,
                files: field(map, "files")?,
                created: field(map, "created")?,
            })
        }
    }

    fn review_state() -> ReviewState {
        ReviewState {
            status: ReviewStatus::Analyzing,
            files: ["b.py", "a.py"].iter().map(|s| s.to_string()).collect(),
            created: Utc.with_ymd_and_hms(2025, 7, 8, 17, 0, 0).unwrap(),
        }
    }

    fn serializer(dir: &Path) -> Serializer {
        Serializer::with_config(SerializerConfig {
            data_dir: dir.to_path_buf(),
            ..SerializerConfig::default()
        })
    }

    #[test]
    fn test_plain_text_review_state() {
        let tmp = tempfile::tempdir().unwrap();
        let serializer = serializer(tmp.path());
        let state = review_state();

        let data = serializer
            .encode_as(&state, SerializationFormat::PlainText, DataType::Input, Some("start_review"))
            .unwrap();

        assert_eq!(data.metadata.original_size, data.data.len() as u64);
        assert_eq!(data.metadata.compressed_size, None);
        assert_eq!(data.schema_version, "1.0");

        let value = serializer.decode(&data).unwrap();
        assert_eq!(value.get("status"), Some(&Value::from("ANALYZING")));
        assert_eq!(
            value.get("files"),
            Some(&Value::List(vec!["a.py".into(), "b.py".into()]))
        );

        let restored: ReviewState = serializer.decode_as(&data).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_roundtrip_equals_canonical_form() {
        let tmp = tempfile::tempdir().unwrap();
        let serializer = serializer(tmp.path());
        let state = review_state();
        for format in SerializationFormat::ALL {
            let data = serializer
                .encode_as(&state, format, DataType::Output, None)
                .unwrap();
            assert_eq!(data.format(), format);
            assert_eq!(serializer.decode(&data).unwrap(), state.to_canonical());
        }
    }

    #[test]
    fn test_decode_input_restores_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = SerializerConfig {
            data_dir: tmp.path().to_path_buf(),
            ..SerializerConfig::default()
        };
        config
            .input_defaults
            .insert("errors".to_string(), Value::List(Vec::new()));
        config
            .input_defaults
            .insert("status".to_string(), Value::from("PENDING"));
        let serializer = Serializer::with_config(config);

        let state = Value::map([("status", Value::from("ANALYZING"))]);
        let data = serializer.encode_input(&state, "analyze_code").unwrap();
        let restored = serializer.decode_input(&data).unwrap();

        assert_eq!(restored["status"], Value::from("ANALYZING"));
        assert_eq!(restored["errors"], Value::List(Vec::new()));
    }

    #[test]
    fn test_decode_input_rejects_non_map() {
        let tmp = tempfile::tempdir().unwrap();
        let serializer = serializer(tmp.path());
        let data = serializer.encode_input(&Value::Int(3), "start_review").unwrap();
        let err = serializer.decode_input(&data).unwrap_err();
        assert!(matches!(
            err,
            TapeError::Decode {
                stage: DecodeStage::Parse,
                ..
            }
        ));
    }

    #[test]
    fn test_tampered_envelope_fails_integrity() {
        let tmp = tempfile::tempdir().unwrap();
        let serializer = serializer(tmp.path());
        let mut data = serializer
            .encode_output(&Value::map([("step", Value::from("next"))]), "start_review")
            .unwrap();
        data.data = data.data.replace("next", "nexu");
        assert!(matches!(
            serializer.decode(&data).unwrap_err(),
            TapeError::Integrity { .. }
        ));
    }

    #[test]
    fn test_save_and_load_standalone_document() {
        let tmp = tempfile::tempdir().unwrap();
        let serializer = serializer(tmp.path());
        let data = serializer
            .encode_as(
                &review_state(),
                SerializationFormat::CompressedText,
                DataType::Input,
                Some("start_review"),
            )
            .unwrap();

        let persisted = serializer
            .save_serialized_data(&data, "start_review_input.json")
            .unwrap();
        let path = persisted.path().unwrap().to_path_buf();
        assert!(path.starts_with(tmp.path()));

        let loaded = serializer.load_serialized_data(&path).unwrap();
        assert_eq!(loaded, data);
        let restored: ReviewState = serializer.decode_as(&loaded).unwrap();
        assert_eq!(restored, review_state());
    }

    #[test]
    fn test_load_rejects_unknown_format() {
        let tmp = tempfile::tempdir().unwrap();
        let serializer = serializer(tmp.path());
        let data = serializer
            .encode_output(&Value::Int(1), "start_review")
            .unwrap();
        let mut doc = serde_json::to_value(&data).unwrap();
        doc["metadata"]["format"] = "yaml".into();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
        assert!(serializer.load_serialized_data(&path).is_err());
    }

    #[test]
    fn test_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let serializer = serializer(tmp.path());
        for i in 0..4 {
            serializer.encode_input(&Value::Int(i), "n").unwrap();
        }
        for format in SerializationFormat::ALL {
            serializer
                .encode_as(&Value::Int(9), format, DataType::Output, Some("n"))
                .unwrap();
        }

        let summary = serializer.summary();
        assert_eq!(summary.total_operations, 7);
        assert_eq!(summary.by_data_type["input"], 4);
        assert_eq!(summary.by_data_type["output"], 3);
        assert_eq!(summary.by_format["json"], 5);
        assert_eq!(summary.by_format["binary"], 1);
        assert_eq!(summary.recent.len(), 5);
        assert_eq!(
            summary.recent.last().unwrap().format,
            SerializationFormat::CompressedText
        );
        assert!(summary.total_size > 0);
    }

    #[test]
    fn test_history_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let serializer = Serializer::with_config(SerializerConfig {
            data_dir: tmp.path().to_path_buf(),
            history_limit: 2,
            ..SerializerConfig::default()
        });
        for i in 0..5 {
            serializer.encode_output(&Value::Int(i), "n").unwrap();
        }
        assert_eq!(serializer.history().len(), 2);
    }
}
