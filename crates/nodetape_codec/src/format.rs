//! Serialization formats and data roles.

use nodetape_core::TapeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload encoding, a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SerializationFormat {
    /// Pretty-printed canonical JSON
    #[default]
    PlainText,
    /// Postcard bytes, base64-wrapped
    BinaryCompact,
    /// Gzip of the canonical JSON, base64-wrapped
    CompressedText,
}

impl SerializationFormat {
    /// All formats
    pub const ALL: [Self; 3] = [Self::PlainText, Self::BinaryCompact, Self::CompressedText];

    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "json",
            Self::BinaryCompact => "binary",
            Self::CompressedText => "compressed_json",
        }
    }

    /// Whether the payload is base64-wrapped
    #[must_use]
    pub const fn is_wrapped(&self) -> bool {
        !matches!(self, Self::PlainText)
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerializationFormat {
    type Err = TapeError;

    /// Accepts wire names, `pickle`, and `SerializationFormat.<NAME>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let name = lowered
            .strip_prefix("serializationformat.")
            .unwrap_or(&lowered);
        match name {
            "json" | "plain_text" | "plaintext" => Ok(Self::PlainText),
            "binary" | "pickle" | "binary_compact" => Ok(Self::BinaryCompact),
            "compressed_json" | "compressed_text" => Ok(Self::CompressedText),
            _ => Err(TapeError::configuration(format!(
                "unsupported serialization format: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for SerializationFormat {
    type Error = TapeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SerializationFormat> for String {
    fn from(format: SerializationFormat) -> Self {
        format.as_str().to_string()
    }
}

/// Role of serialized data within a node invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// State passed into a node
    Input,
    /// Value returned by a node
    Output,
}

impl DataType {
    /// Role name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
