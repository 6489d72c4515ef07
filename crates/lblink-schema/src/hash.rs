//! Content digests of canonical payloads.
//!
//! Change detection and request/response correlation compare digests rather
//! than record structures, so the digest must be stable across processes and
//! releases. The algorithm is fixed here in one place; everything else calls
//! [`digest`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// 32-byte SHA-256 digest of a canonical payload.
///
/// Displayed and serialized as lowercase hex, which is also the wire form of
/// the correlation token a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a lowercase or mixed-case hex digest.
    pub fn from_hex(text: &str) -> Result<Self, HashParseError> {
        let bytes = hex::decode(text)?;
        let len = bytes.len();
        let array: [u8; 32] = bytes.try_into().map_err(|_| HashParseError::Length(len))?;
        Ok(Self(array))
    }
}

/// A digest string that does not name a 32-byte digest.
#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    /// Not valid hexadecimal.
    #[error("content hash is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// Wrong decoded length.
    #[error("content hash must be 32 bytes, got {0}")]
    Length(usize),
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// Digest canonical bytes.
pub fn digest(data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    ContentHash(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            digest(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(digest(b"payload"), digest(b"payload"));
        assert_ne!(digest(b"payload"), digest(b"payload2"));
    }

    #[test]
    fn hex_round_trip() {
        let hash = digest(b"round trip");
        let parsed: ContentHash = hash.to_hex().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn rejects_short_and_non_hex() {
        assert!(ContentHash::from_hex("abcd").is_err());
        assert!(ContentHash::from_hex("zz").is_err());
    }

    #[test]
    fn serde_uses_hex_string() {
        let hash = digest(b"wire");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{hash}\""));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
