//! # Chain Walker
//!
//! Rebuilds the chain by following `previous_hash` links from the head back
//! to genesis, one fetch per block. Each step depends on the hash resolved by
//! the step before, so the walk is strictly sequential.
//!
//! ## State Machine
//!
//! ```text
//!                  first record accepted
//!   AnchorPending ───────────────────────► Walking ──► Terminated(reason)
//!        │     (number mismatch: relocate      │
//!        │      the anchor, once)              │ fetch failure or
//!        └─────────────────────────────────────┴─► number mismatch ─► Aborted
//! ```
//!
//! The anchor is the first block fetched. Its number may disagree with the
//! position the store's size implied; that is repaired exactly once by
//! re-keying the anchor to its own number. A disagreement anywhere later
//! cannot be repaired and aborts the run, because every position below it
//! would be wrong too.

use serde::Serialize;

use crate::config::DEFAULT_MAX_PREALLOCATION;
use crate::storage::{BlockRecord, Chain, Digest, ObjectStore, GENESIS_DIGEST};

use super::diagnostics::{Diagnostic, DiagnosticKind};
use super::error::FatalError;

// ---------------------------------------------------------------------------
// Walk State & Outcome
// ---------------------------------------------------------------------------

/// Why a walk that did not abort came to a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Reached genesis at block 0.
    Genesis,
    /// A block above 0 linked to genesis. The chain is truncated.
    PrematureGenesis,
    /// Block 0 linked to something other than genesis.
    MissingGenesis,
}

/// Position of the walker in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// No record accepted yet; the anchor may still be relocated.
    AnchorPending,
    /// Anchor placed; every later number must match its position.
    Walking,
    Terminated(Termination),
    Aborted,
}

/// The single anchor relocation a walk may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnchorRepair {
    pub hash: Digest,
    /// Position implied by the store's size.
    pub from: u64,
    /// Position named by the anchor's own block number.
    pub to: u64,
}

/// Everything a completed (possibly truncated) walk produced.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub chain: Chain,
    /// Sum of slice lengths over every walked block.
    pub transactions_required: u64,
    /// Findings in walk order (highest block first).
    pub diagnostics: Vec<Diagnostic>,
    pub repair: Option<AnchorRepair>,
    pub termination: Termination,
}

impl WalkOutcome {
    pub fn blocks_walked(&self) -> usize {
        self.chain.len()
    }
}

// ---------------------------------------------------------------------------
// ChainWalker
// ---------------------------------------------------------------------------

/// Walks a block store backwards from a head digest.
pub struct ChainWalker<S> {
    store: S,
    genesis: Digest,
    size_hint: u64,
    max_preallocation: usize,
}

impl<S: ObjectStore<BlockRecord>> ChainWalker<S> {
    /// Walker over `store`, using its reported size as the position hint.
    pub fn new(store: S) -> Self {
        let size_hint = store.size();
        Self {
            store,
            genesis: GENESIS_DIGEST,
            size_hint,
            max_preallocation: DEFAULT_MAX_PREALLOCATION,
        }
    }

    /// Overrides the block count the anchor position is derived from.
    pub fn with_size_hint(mut self, size_hint: u64) -> Self {
        self.size_hint = size_hint;
        self
    }

    /// Caps how many chain slots are reserved up front.
    pub fn with_max_preallocation(mut self, max_preallocation: usize) -> Self {
        self.max_preallocation = max_preallocation;
        self
    }

    /// Sentinel marking both the root's parent link and an unset forward link.
    pub fn with_genesis(mut self, genesis: Digest) -> Self {
        self.genesis = genesis;
        self
    }

    /// Walks from `head` to genesis.
    ///
    /// Returns `Err` only for conditions that make the whole chain
    /// untrustworthy; everything else is recorded in the outcome.
    pub fn walk(&self, head: Digest) -> Result<WalkOutcome, FatalError> {
        let initial_index = self.size_hint.saturating_sub(1);
        let capacity = usize::try_from(self.size_hint)
            .unwrap_or(usize::MAX)
            .min(self.max_preallocation);

        let mut chain = Chain::with_capacity(capacity);
        chain.set_top(initial_index);

        let mut state = WalkState::AnchorPending;
        let mut expected_hash = head;
        let mut block_index = initial_index;
        let mut successor: Option<Digest> = None;
        let mut diagnostics = Vec::new();
        let mut repair = None;
        let mut transactions_required = 0u64;

        tracing::info!(head = %head, size_hint = self.size_hint, "walking chain from head");

        let termination = loop {
            let record = match self.fetch(&expected_hash, block_index) {
                Ok(record) => record,
                Err(err) => return Err(abort(&mut state, err)),
            };

            if record.hash != expected_hash {
                diagnostics.push(Diagnostic::new(DiagnosticKind::StoredHashMismatch {
                    block_number: record.block_number,
                    expected: expected_hash,
                    stored: record.hash,
                }));
            }

            if record.block_number != block_index {
                match state {
                    WalkState::AnchorPending => {
                        tracing::warn!(
                            hash = %expected_hash,
                            from = block_index,
                            to = record.block_number,
                            "anchor block number disagrees with store size; relocating"
                        );
                        chain.set_top(record.block_number);
                        repair = Some(AnchorRepair {
                            hash: expected_hash,
                            from: block_index,
                            to: record.block_number,
                        });
                        diagnostics.push(Diagnostic::new(DiagnosticKind::AnchorRelocated {
                            hash: expected_hash,
                            assumed: block_index,
                            actual: record.block_number,
                        }));
                        block_index = record.block_number;
                    }
                    _ => {
                        let err = FatalError::UnrecoverableNumberMismatch {
                            expected: block_index,
                            found: record.block_number,
                            hash: expected_hash,
                        };
                        return Err(abort(&mut state, err));
                    }
                }
            }
            state = WalkState::Walking;

            transactions_required = transactions_required.saturating_add(record.tx_count());

            if let Some(child) = successor {
                if record.next_hash != self.genesis && record.next_hash != child {
                    diagnostics.push(Diagnostic::new(DiagnosticKind::ForwardLinkMismatch {
                        block_number: block_index,
                        hash: expected_hash,
                        next_hash: record.next_hash,
                        successor: child,
                    }));
                }
            }

            let next_expected = record.previous_hash;
            let is_genesis = next_expected == self.genesis;
            chain.push_next(record);
            successor = Some(expected_hash);

            if block_index > 0 {
                if is_genesis {
                    diagnostics.push(Diagnostic::new(DiagnosticKind::PrematureGenesis {
                        block_number: block_index,
                        hash: expected_hash,
                    }));
                    break Termination::PrematureGenesis;
                }
                block_index -= 1;
                expected_hash = next_expected;
            } else if is_genesis {
                break Termination::Genesis;
            } else {
                diagnostics.push(Diagnostic::new(DiagnosticKind::MissingGenesis {
                    hash: expected_hash,
                    previous_hash: next_expected,
                }));
                break Termination::MissingGenesis;
            }
        };
        state = WalkState::Terminated(termination);

        tracing::info!(
            blocks = chain.len(),
            transactions_required,
            state = ?state,
            "chain walk finished"
        );

        Ok(WalkOutcome {
            chain,
            transactions_required,
            diagnostics,
            repair,
            termination,
        })
    }

    fn fetch(&self, hash: &Digest, block_index: u64) -> Result<BlockRecord, FatalError> {
        let reason = match self.store.get(hash) {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => "not present in block store".to_string(),
            Err(err) => err.to_string(),
        };
        Err(FatalError::Fetch {
            block_index,
            hash: *hash,
            reason,
        })
    }
}

fn abort(state: &mut WalkState, err: FatalError) -> FatalError {
    tracing::error!(from = ?*state, "chain walk aborted: {err}");
    *state = WalkState::Aborted;
    err
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
