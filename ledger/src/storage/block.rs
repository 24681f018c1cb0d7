//! # Block Records
//!
//! A block record is what the block store holds under a block's hash. The
//! checker only needs the linkage and the transaction layout, so that is all
//! the record carries.
//!
//! ## Record Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  BlockRecord                                │
//! │  ├── hash: Digest           (self identity) │
//! │  ├── previous_hash: Digest  (parent link)   │
//! │  ├── block_number: u64      (genesis = 0)   │
//! │  ├── slices: Vec<Slice>                     │
//! │  │     └── Vec<TransactionLayout { digest }>│
//! │  └── next_hash: Digest      (forward link)  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! `next_hash` is [`GENESIS_DIGEST`] when the successor is unknown, the same
//! "undefined" convention the store writer uses.
//!
//! ## Hash Computation
//!
//! `hash = BLAKE3(previous_hash || block_number (LE) || for each slice:
//! len (LE) || digests...)`. The forward link is not covered: it is filled
//! in after the successor exists.

use serde::{Deserialize, Serialize};

use super::digest::{Digest, GENESIS_DIGEST};

/// Minimal descriptor sufficient to look up the full transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLayout {
    /// Digest of the referenced transaction.
    pub digest: Digest,
}

impl TransactionLayout {
    pub fn new(digest: Digest) -> Self {
        Self { digest }
    }
}

/// Ordered group of transactions within a block.
pub type Slice = Vec<TransactionLayout>;

// ---------------------------------------------------------------------------
// BlockRecord
// ---------------------------------------------------------------------------

/// A block as persisted in the block store.
///
/// Immutable once fetched during a verification run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// The block's self-reported identity.
    pub hash: Digest,
    /// Hash of the parent block; [`GENESIS_DIGEST`] for the first block.
    pub previous_hash: Digest,
    /// Position in the chain, 0 for the first block.
    pub block_number: u64,
    /// Transaction layout, slice by slice.
    pub slices: Vec<Slice>,
    /// Hash of the successor block, or [`GENESIS_DIGEST`] when unknown.
    pub next_hash: Digest,
}

impl BlockRecord {
    /// The first block of a chain: number 0, no parent.
    pub fn genesis(slices: Vec<Slice>) -> Self {
        Self::with_parent(GENESIS_DIGEST, 0, slices)
    }

    /// A block extending `parent`.
    pub fn child_of(parent: &BlockRecord, slices: Vec<Slice>) -> Self {
        Self::with_parent(parent.hash, parent.block_number + 1, slices)
    }

    /// A block with explicit linkage fields and a freshly computed hash.
    pub fn with_parent(previous_hash: Digest, block_number: u64, slices: Vec<Slice>) -> Self {
        let hash = compute_record_hash(&previous_hash, block_number, &slices);
        Self {
            hash,
            previous_hash,
            block_number,
            slices,
            next_hash: GENESIS_DIGEST,
        }
    }

    /// Recomputes the hash from the record's linkage and layout.
    pub fn compute_hash(&self) -> Digest {
        compute_record_hash(&self.previous_hash, self.block_number, &self.slices)
    }

    /// Total number of transactions across all slices.
    pub fn tx_count(&self) -> u64 {
        self.slices.iter().map(|s| s.len() as u64).sum()
    }

    /// `true` when the parent link is the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_genesis()
    }
}

fn compute_record_hash(previous_hash: &Digest, block_number: u64, slices: &[Slice]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(&block_number.to_le_bytes());
    for slice in slices {
        hasher.update(&(slice.len() as u64).to_le_bytes());
        for layout in slice {
            hasher.update(layout.digest.as_bytes());
        }
    }
    Digest(*hasher.finalize().as_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
