//! # Digests
//!
//! Every record in the ledger's storage is addressed by a 32-byte digest:
//! blocks are keyed by their hash, transactions by theirs, and blocks link
//! to their parent through the same type. Wrapping the raw array keeps
//! "a key into a store" from being confused with "some bytes".
//!
//! The all-zero digest is reserved as [`GENESIS_DIGEST`]: the parent of the
//! first block, and the "undefined" value of a block's forward link.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 32;

/// Sentinel digest meaning "no parent block".
pub const GENESIS_DIGEST: Digest = Digest([0u8; DIGEST_LEN]);

/// Fixed-length content hash used both as a store key and as a chain link.
///
/// Serializes as raw bytes for binary formats (the stores) and as a hex
/// string for human-readable ones (JSON reports).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    /// BLAKE3-256 of `data`.
    ///
    /// The checker never recomputes digests of stored records; this exists
    /// for building stores and fixtures.
    pub fn of(data: &[u8]) -> Self {
        Digest(*blake3::hash(data).as_bytes())
    }

    /// Builds a digest from a slice, returning `None` unless it is exactly
    /// [`DIGEST_LEN`] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; DIGEST_LEN] = bytes.try_into().ok()?;
        Some(Digest(arr))
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut arr = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s.trim(), &mut arr)?;
        Ok(Digest(arr))
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// `true` for the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        *self == GENESIS_DIGEST
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Digest::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; DIGEST_LEN]>::deserialize(deserializer).map(Digest)
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}
