//! Sequence documents on disk.

use crate::step::ReplaySequence;
use nodetape_core::{DecodeStage, TapeError};
use nodetape_storage::{ArtifactStore, Persisted};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sequence document schema version
pub const SEQUENCE_SCHEMA_VERSION: &str = "1.0";

/// Replay error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// Document written by an incompatible version
    #[error("Unsupported sequence schema version: {version}")]
    UnsupportedSchema {
        /// Version found in the document
        version: String,
    },

    /// Document whose steps disagree with its metadata
    #[error("Inconsistent sequence document: {reason}")]
    Inconsistent {
        /// What disagreed
        reason: String,
    },
}

impl From<ReplayError> for TapeError {
    fn from(err: ReplayError) -> Self {
        TapeError::decode(DecodeStage::Parse, err)
    }
}

/// On-disk form of a sequence; every step embeds its serialized data inline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDocument {
    /// Document schema version
    pub schema_version: String,
    /// The sequence
    #[serde(flatten)]
    pub sequence: ReplaySequence,
}

impl SequenceDocument {
    /// Wrap a sequence at the current schema version
    #[must_use]
    pub fn new(sequence: ReplaySequence) -> Self {
        Self {
            schema_version: SEQUENCE_SCHEMA_VERSION.to_string(),
            sequence,
        }
    }

    /// Validate and unwrap
    ///
    /// # Errors
    ///
    /// Returns error if the schema major version differs or the step count
    /// disagrees with the metadata
    pub fn into_sequence(self) -> Result<ReplaySequence, ReplayError> {
        let major = |v: &str| v.split('.').next().map(str::to_string);
        if major(&self.schema_version) != major(SEQUENCE_SCHEMA_VERSION) {
            return Err(ReplayError::UnsupportedSchema {
                version: self.schema_version,
            });
        }
        let sequence = self.sequence;
        if sequence.metadata.total_steps != sequence.steps.len() {
            return Err(ReplayError::Inconsistent {
                reason: format!(
                    "metadata lists {} steps, document has {}",
                    sequence.metadata.total_steps,
                    sequence.steps.len()
                ),
            });
        }
        Ok(sequence)
    }
}

/// Write a sequence document under its file name
///
/// # Errors
///
/// Returns `Persistence` if the write fails
pub fn save_sequence(store: &ArtifactStore, sequence: &ReplaySequence) -> Result<Persisted, TapeError> {
    let document = SequenceDocument::new(sequence.clone());
    Ok(store.write_json(&sequence.file_name(), &document)?)
}

/// Read a sequence document
///
/// Serialized-data format names are parsed back into their variants; an
/// unknown name fails the load.
///
/// # Errors
///
/// Returns error if the file cannot be read, parsed, or validated
pub fn load_sequence(path: &Path) -> Result<ReplaySequence, TapeError> {
    let document: SequenceDocument = ArtifactStore::read_json(path)?;
    Ok(document.into_sequence()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{ReplayStep, SequenceMetadata};
    use nodetape_codec::{SerializationFormat, Serializer, SerializerConfig, Value};
    use nodetape_core::{SequenceId, StepId};
    use std::time::Duration;

    fn sequence() -> ReplaySequence {
        let serializer = Serializer::with_store(SerializerConfig::default(), ArtifactStore::disabled());
        let input = Value::map([("repo", Value::from("demo"))]);
        let step = ReplayStep {
            step_id: StepId::new("start_review_1"),
            node_name: "start_review".to_string(),
            input_data: serializer
                .encode_as(
                    &input,
                    SerializationFormat::CompressedText,
                    nodetape_codec::DataType::Input,
                    Some("start_review"),
                )
                .unwrap(),
            expected_output: Some(
                serializer
                    .encode_output(&Value::map([("step", Value::from("next"))]), "start_review")
                    .unwrap(),
            ),
            timestamp: nodetape_core::time::now(),
            execution_time: Duration::from_millis(125),
            success: true,
            error_message: None,
        };
        let steps = vec![step];
        ReplaySequence {
            sequence_id: SequenceId::new("seq_1"),
            name: "Test Workflow".to_string(),
            description: "one step".to_string(),
            created_at: nodetape_core::time::now(),
            metadata: SequenceMetadata::from_steps(&steps),
            steps,
        }
    }

    #[test]
    fn test_document_shape() {
        let json = serde_json::to_value(SequenceDocument::new(sequence())).unwrap();
        assert_eq!(json["schema_version"], "1.0");
        assert_eq!(json["sequence_id"], "seq_1");
        assert_eq!(json["metadata"]["total_steps"], 1);
        assert_eq!(json["metadata"]["nodes_involved"][0], "start_review");
        let step = &json["steps"][0];
        assert_eq!(step["input_data"]["schema_version"], "1.0");
        assert_eq!(step["input_data"]["metadata"]["format"], "compressed_json");
        assert!(step["expected_output"]["data"].is_string());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(&nodetape_storage::StoreConfig::new(tmp.path(), "unused"));
        let original = sequence();

        let persisted = save_sequence(&store, &original).unwrap();
        let path = persisted.path().unwrap();
        assert!(path.ends_with("Test_Workflow_seq_1.json"));

        let loaded = load_sequence(path).unwrap();
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.steps[0].input_data, original.steps[0].input_data);
        assert_eq!(
            loaded.steps[0].input_data.format(),
            SerializationFormat::CompressedText
        );
        assert_eq!(loaded.metadata.nodes_involved, original.metadata.nodes_involved);
    }

    #[test]
    fn test_rejects_future_schema() {
        let mut document = SequenceDocument::new(sequence());
        document.schema_version = "2.0".to_string();
        assert_eq!(
            document.into_sequence().unwrap_err(),
            ReplayError::UnsupportedSchema {
                version: "2.0".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_inconsistent_metadata() {
        let mut document = SequenceDocument::new(sequence());
        document.sequence.metadata.total_steps = 3;
        assert!(matches!(
            document.into_sequence().unwrap_err(),
            ReplayError::Inconsistent { .. }
        ));
    }

    #[test]
    fn test_disabled_store_reports_disabled() {
        let persisted = save_sequence(&ArtifactStore::disabled(), &sequence()).unwrap();
        assert_eq!(persisted, Persisted::Disabled);
    }
}
