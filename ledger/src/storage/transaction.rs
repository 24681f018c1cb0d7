//! Transaction records held by the lane stores.
//!
//! The checker only resolves transactions, it never executes them, so the
//! payload stays opaque.

use serde::{Deserialize, Serialize};

use super::digest::Digest;

/// A transaction as persisted in a lane store, keyed by `digest`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Self-reported identity; must equal the key it is stored under.
    pub digest: Digest,
    /// Serialized transaction body.
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Builds a transaction whose digest is the BLAKE3 hash of `payload`.
    pub fn from_payload(payload: Vec<u8>) -> Self {
        Self {
            digest: Digest::of(&payload),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_derived_from_payload() {
        let a = Transaction::from_payload(b"transfer 10".to_vec());
        let b = Transaction::from_payload(b"transfer 11".to_vec());
        assert_eq!(a.digest, Digest::of(b"transfer 10"));
        assert_ne!(a.digest, b.digest);
    }
}
