//! nodetape codec
//!
//! Canonical serialization for node states and outputs. Values enter through
//! an explicit [`ToCanonical`] contract, are rendered in one of three
//! [`SerializationFormat`]s, and travel inside a checksummed
//! [`SerializedData`] envelope that is verified again on decode.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod encoding;
pub mod envelope;
pub mod format;
pub mod serializer;
pub mod value;

// Re-exports
pub use canonical::{
    Blob, CanonicalEnum, CodecError, FromCanonical, ToCanonical, canonicalize, field, opt_field,
    require_map,
};
pub use encoding::{EncodedPayload, canonical_text, decode_payload, encode_payload, structural_hash};
pub use envelope::{SCHEMA_VERSION, SerializationMetadata, SerializedData};
pub use format::{DataType, SerializationFormat};
pub use serializer::{SerializationRecord, SerializationSummary, Serializer, SerializerConfig};
pub use value::{State, Value, ValueKind};
