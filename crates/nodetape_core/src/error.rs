//! Error taxonomy shared by every nodetape crate.

use std::fmt;

/// Core result type
pub type TapeResult<T> = Result<T, TapeError>;

/// Stage of a payload decode that rejected its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStage {
    /// Base64 unwrapping of a binary or compressed payload
    Base64,
    /// Gzip decompression
    Decompression,
    /// Structural parse of the canonical form
    Parse,
}

impl DecodeStage {
    /// Stage name as it appears in error messages
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::Decompression => "decompression",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type
///
/// Every crate-local error converts into one of these variants. Node
/// failures are deliberately absent: they are captured into traces, steps
/// and results instead of being raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TapeError {
    /// Unsupported format or other invalid configuration, raised before any side effect
    #[error("Configuration error: {reason}")]
    Configuration {
        /// What was rejected
        reason: String,
    },

    /// A node name missing from the registry
    #[error("Unknown node: {name}")]
    UnknownNode {
        /// Requested node name
        name: String,
    },

    /// Checksum mismatch on decode
    #[error("Integrity check failed: expected {expected}, got {actual}")]
    Integrity {
        /// Checksum recorded in metadata
        expected: String,
        /// Checksum recomputed from the payload
        actual: String,
    },

    /// A value could not be brought into its encoded form
    #[error("Encode failed: {reason}")]
    Encode {
        /// Underlying cause
        reason: String,
    },

    /// Malformed payload
    #[error("Decode failed at {stage} stage: {reason}")]
    Decode {
        /// Stage that failed
        stage: DecodeStage,
        /// Underlying cause
        reason: String,
    },

    /// Artifact I/O failure
    #[error("Persistence error: {reason}")]
    Persistence {
        /// Underlying cause
        reason: String,
    },
}

impl TapeError {
    /// Build a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Build a decode error for a stage
    pub fn decode(stage: DecodeStage, reason: impl fmt::Display) -> Self {
        Self::Decode {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Build an encode error
    pub fn encode(reason: impl fmt::Display) -> Self {
        Self::Encode {
            reason: reason.to_string(),
        }
    }

    /// Build a persistence error
    pub fn persistence(reason: impl fmt::Display) -> Self {
        Self::Persistence {
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for TapeError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(DecodeStage::Parse, err)
    }
}
