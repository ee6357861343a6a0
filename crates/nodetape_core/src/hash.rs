//! SHA-256 digests for payload checksums and structural state hashes.
//!
//! Digests are computed over canonical bytes only, so the same value hashes
//! identically across processes and platforms.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// A SHA-256 digest (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The number of bytes in a digest
    pub const LEN: usize = 32;

    /// Compute SHA-256 of data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::new().chain_update(data).finalize().into())
    }

    /// Convert to lowercase hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    ///
    /// # Errors
    ///
    /// Returns error if hex is invalid or not 32 bytes
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let bytes = hex::decode(hex).map_err(|_| HashError::InvalidHex)?;
        if bytes.len() != Self::LEN {
            return Err(HashError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Check if digest matches data
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Digest parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Invalid hex encoding
    InvalidHex,
    /// Invalid length (not 32 bytes)
    InvalidLength(usize),
}

impl std::error::Error for HashError {}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHex => write!(f, "Invalid hex encoding"),
            Self::InvalidLength(len) => write!(f, "Invalid digest length: {} (expected 32)", len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_compute() {
        let digest = Digest::compute(b"hello world");
        assert_eq!(digest.to_hex().len(), 64);
        assert_eq!(
            digest.to_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_digest_from_to_hex() {
        let digest = Digest::compute(b"test");
        let hex = digest.to_hex();
        let restored = Digest::from_hex(&hex).unwrap();
        assert_eq!(digest, restored);
    }

    #[test]
    fn test_digest_from_hex_rejects_short_input() {
        assert_eq!(Digest::from_hex("abcd"), Err(HashError::InvalidLength(2)));
        assert_eq!(Digest::from_hex("zz"), Err(HashError::InvalidHex));
    }

    #[test]
    fn test_digest_verify() {
        let digest = Digest::compute(b"test data");
        assert!(digest.verify(b"test data"));
        assert!(!digest.verify(b"other data"));
    }

    #[test]
    fn test_digest_from_hex_accepts_uppercase() {
        let digest = Digest::compute(b"test");
        let upper = digest.to_hex().to_uppercase();
        assert_eq!(Digest::from_hex(&upper).unwrap(), digest);
    }
}
