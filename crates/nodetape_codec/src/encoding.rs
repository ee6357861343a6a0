//! Payload encodings.
//!
//! Encode: canonical bytes → optional gzip → checksum → optional base64.
//! Decode runs the same stages backwards, verifying the checksum before any
//! decompression or parsing is attempted.

use crate::format::SerializationFormat;
use crate::value::Value;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::GzBuilder;
use flate2::read::GzDecoder;
use nodetape_core::{DecodeStage, Digest, TapeError, TapeResult};
use std::io::{Read, Write};

/// Encoded payload and the sizes needed for its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Text stored in the envelope
    pub payload: String,
    /// SHA-256 hex over the pre-base64 payload bytes
    pub checksum: String,
    /// Length of the uncompressed canonical bytes
    pub original_size: u64,
    /// Length of the compressed bytes, compressed format only
    pub compressed_size: Option<u64>,
}

/// Plain-text canonical bytes (pretty JSON, ordered keys)
///
/// # Errors
///
/// Returns error if the value cannot be rendered as JSON
pub fn canonical_text(value: &Value) -> TapeResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(TapeError::encode)
}

/// Stable structural hash: SHA-256 hex over the canonical text
#[must_use]
pub fn structural_hash(value: &Value) -> String {
    // Rendering a Value tree cannot fail; an empty digest would still be stable
    let bytes = canonical_text(value).unwrap_or_default();
    Digest::compute(&bytes).to_hex()
}

/// Encode a canonical value
///
/// # Errors
///
/// Returns error if the value cannot be rendered or compressed
pub fn encode_payload(value: &Value, format: SerializationFormat) -> TapeResult<EncodedPayload> {
    match format {
        SerializationFormat::PlainText => {
            let bytes = canonical_text(value)?;
            let checksum = Digest::compute(&bytes).to_hex();
            let original_size = bytes.len() as u64;
            let payload = String::from_utf8(bytes).map_err(TapeError::encode)?;
            Ok(EncodedPayload {
                payload,
                checksum,
                original_size,
                compressed_size: None,
            })
        }
        SerializationFormat::BinaryCompact => {
            let bytes = postcard::to_allocvec(value).map_err(TapeError::encode)?;
            Ok(EncodedPayload {
                payload: STANDARD.encode(&bytes),
                checksum: Digest::compute(&bytes).to_hex(),
                original_size: bytes.len() as u64,
                compressed_size: None,
            })
        }
        SerializationFormat::CompressedText => {
            let text = canonical_text(value)?;
            let compressed = gzip(&text).map_err(TapeError::encode)?;
            Ok(EncodedPayload {
                payload: STANDARD.encode(&compressed),
                checksum: Digest::compute(&compressed).to_hex(),
                original_size: text.len() as u64,
                compressed_size: Some(compressed.len() as u64),
            })
        }
    }
}

/// Decode a payload, verifying its checksum
///
/// # Errors
///
/// Returns `Integrity` on checksum mismatch and `Decode` naming the stage
/// that rejected malformed data
pub fn decode_payload(
    payload: &str,
    format: SerializationFormat,
    checksum: &str,
) -> TapeResult<Value> {
    let raw = if format.is_wrapped() {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| TapeError::decode(DecodeStage::Base64, e))?
    } else {
        payload.as_bytes().to_vec()
    };

    verify_checksum(&raw, checksum)?;

    match format {
        SerializationFormat::PlainText => parse_text(&raw),
        SerializationFormat::BinaryCompact => {
            postcard::from_bytes(&raw).map_err(|e| TapeError::decode(DecodeStage::Parse, e))
        }
        SerializationFormat::CompressedText => {
            let text = gunzip(&raw).map_err(|e| TapeError::decode(DecodeStage::Decompression, e))?;
            parse_text(&text)
        }
    }
}

fn verify_checksum(bytes: &[u8], expected: &str) -> TapeResult<()> {
    let matches = Digest::from_hex(expected.trim()).is_ok_and(|digest| digest.verify(bytes));
    if matches {
        Ok(())
    } else {
        Err(TapeError::Integrity {
            expected: expected.to_string(),
            actual: Digest::compute(bytes).to_hex(),
        })
    }
}

fn parse_text(bytes: &[u8]) -> TapeResult<Value> {
    serde_json::from_slice(bytes).map_err(|e| TapeError::decode(DecodeStage::Parse, e))
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    // mtime 0 keeps identical input byte-identical across runs
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}
