//! Content fingerprints identifying a canonical parameter set.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Number of raw digest bytes in a fingerprint.
const DIGEST_LEN: usize = 32;

/// A 256-bit SHA-256 digest naming one generated asset set.
///
/// Fingerprints are rendered as 64 lowercase hexadecimal characters. The
/// textual form doubles as the directory name of the asset set on disk, so
/// parsing is strict: uppercase or short strings are rejected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; DIGEST_LEN]);

impl Fingerprint {
    /// Computes the fingerprint of a byte slice using SHA-256.
    pub fn from_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Returns the first eight hex characters, for log lines.
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

/// Error returned when a string is not a valid fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fingerprint '{input}': expected 64 lowercase hex characters")]
pub struct ParseFingerprintError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFingerprintError {
            input: s.to_string(),
        };
        // hex accepts uppercase digits; the directory name form does not
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(err());
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| err())?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}..)", self.short())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FingerprintVisitor;

        impl Visitor<'_> for FingerprintVisitor {
            type Value = Fingerprint;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 64-character lowercase hex string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Fingerprint, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(FingerprintVisitor)
    }
}
