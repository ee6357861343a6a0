//! Serialized-data envelope.

use crate::format::{DataType, SerializationFormat};
use nodetape_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Envelope schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Serializer version recorded in metadata
pub const SERIALIZER_VERSION: &str = "1.0";

/// Metadata describing one encoded payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializationMetadata {
    /// Payload encoding
    pub format: SerializationFormat,
    /// Encode time
    pub timestamp: Timestamp,
    /// Serializer version
    pub version: String,
    /// SHA-256 hex over the pre-base64 payload bytes
    pub checksum: String,
    /// Length of the uncompressed canonical bytes
    pub original_size: u64,
    /// Compressed length, compressed format only
    #[serde(default)]
    pub compressed_size: Option<u64>,
    /// Node the data belongs to
    #[serde(default)]
    pub node_name: Option<String>,
    /// Input or output
    pub data_type: DataType,
}

/// Encoded payload with its metadata
///
/// Immutable once produced; decoding never modifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedData {
    /// Envelope schema version
    pub schema_version: String,
    /// Payload metadata
    pub metadata: SerializationMetadata,
    /// Payload text (base64 for wrapped formats)
    pub data: String,
}

impl SerializedData {
    /// Payload encoding
    #[must_use]
    pub fn format(&self) -> SerializationFormat {
        self.metadata.format
    }

    /// Input or output
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.metadata.data_type
    }

    /// Node the data belongs to
    #[must_use]
    pub fn node_name(&self) -> Option<&str> {
        self.metadata.node_name.as_deref()
    }

    /// Short checksum prefix for log lines
    #[must_use]
    pub fn checksum_prefix(&self) -> &str {
        self.metadata
            .checksum
            .get(..8)
            .unwrap_or(&self.metadata.checksum)
    }
}
