//! # Diagnostics
//!
//! Every anomaly found during a run becomes a [`Diagnostic`]: a severity
//! plus a kind that carries enough context (block number, hash, lane,
//! digest, slice and in-slice position) to find the offending record
//! without a second run.
//!
//! Fatal conditions are not diagnostics. They stop the run and travel as
//! [`FatalError`](super::error::FatalError) instead, because nothing
//! gathered after them could be trusted.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use crate::lanes::LaneIndex;
use crate::storage::Digest;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How bad a finding is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Progress or an action taken; does not affect the outcome.
    Info,
    /// Recorded, makes the run degraded, does not stop it.
    Inconsistency,
    /// Aborts the run.
    Fatal,
}

impl Severity {
    /// Prefix used on report lines.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Inconsistency => "INCONSISTENCY",
            Severity::Fatal => "FATAL",
        }
    }
}

// ---------------------------------------------------------------------------
// DiagnosticKind
// ---------------------------------------------------------------------------

/// Why a transaction lookup did not produce the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum MissCause {
    /// No record under the digest in the resolved lane, nor in any other.
    Absent,
    /// Not in the resolved lane, but present in another one.
    Misplaced { found_in: LaneIndex },
    /// The record exists but could not be read or decoded.
    Unreadable { reason: String },
    /// The resolver named a lane that was not discovered.
    LaneUnavailable,
}

impl fmt::Display for MissCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissCause::Absent => write!(f, "absent"),
            MissCause::Misplaced { found_in } => write!(f, "misplaced in lane {found_in}"),
            MissCause::Unreadable { reason } => write!(f, "unreadable: {reason}"),
            MissCause::LaneUnavailable => write!(f, "lane not present"),
        }
    }
}

/// What was found, with the context needed to locate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The record fetched under `expected` calls itself `stored`.
    StoredHashMismatch {
        block_number: u64,
        expected: Digest,
        stored: Digest,
    },

    /// The anchor's number disagreed with the store size; it was moved to
    /// the position its own number names.
    AnchorRelocated {
        hash: Digest,
        assumed: u64,
        actual: u64,
    },

    /// A block's forward link names something other than the block walked
    /// just before it.
    ForwardLinkMismatch {
        block_number: u64,
        hash: Digest,
        next_hash: Digest,
        successor: Digest,
    },

    /// Genesis was reached while the block number was still above zero.
    PrematureGenesis { block_number: u64, hash: Digest },

    /// Block 0 links to something other than genesis.
    MissingGenesis {
        hash: Digest,
        previous_hash: Digest,
    },

    /// A transaction referenced by the chain could not be resolved.
    TransactionMissing {
        block_number: u64,
        block_hash: Digest,
        slice: u64,
        index: u64,
        digest: Digest,
        lane: LaneIndex,
        #[serde(flatten)]
        cause: MissCause,
    },

    /// The transaction stored under `digest` calls itself `stored`.
    TransactionDigestMismatch {
        block_number: u64,
        block_hash: Digest,
        slice: u64,
        index: u64,
        digest: Digest,
        stored: Digest,
        lane: LaneIndex,
    },

    /// The chain references more transactions than all lanes hold.
    SanityBound { required: u64, stored: u64 },
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::AnchorRelocated { .. } => Severity::Info,
            _ => Severity::Inconsistency,
        }
    }

    /// Position used to order diagnostics: block number, slice, in-slice
    /// index. Chain-level findings sort after everything else.
    pub fn sort_key(&self) -> (u64, u64, u64) {
        match self {
            DiagnosticKind::StoredHashMismatch { block_number, .. }
            | DiagnosticKind::ForwardLinkMismatch { block_number, .. }
            | DiagnosticKind::PrematureGenesis { block_number, .. } => (*block_number, 0, 0),
            DiagnosticKind::AnchorRelocated { actual, .. } => (*actual, 0, 0),
            DiagnosticKind::MissingGenesis { .. } => (0, 0, 0),
            DiagnosticKind::TransactionMissing {
                block_number,
                slice,
                index,
                ..
            }
            | DiagnosticKind::TransactionDigestMismatch {
                block_number,
                slice,
                index,
                ..
            } => (*block_number, *slice, *index),
            DiagnosticKind::SanityBound { .. } => (u64::MAX, u64::MAX, u64::MAX),
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::StoredHashMismatch {
                block_number,
                expected,
                stored,
            } => write!(
                f,
                "block[{block_number}] hash {stored} does not match the hash {expected} used to fetch it"
            ),
            DiagnosticKind::AnchorRelocated {
                hash,
                assumed,
                actual,
            } => write!(
                f,
                "anchor block {hash} declares number {actual} but store size implied {assumed}; relocated to {actual}"
            ),
            DiagnosticKind::ForwardLinkMismatch {
                block_number,
                hash,
                next_hash,
                successor,
            } => write!(
                f,
                "block[{block_number}] {hash} forward link {next_hash} does not match successor {successor}"
            ),
            DiagnosticKind::PrematureGenesis { block_number, hash } => write!(
                f,
                "block[{block_number}] {hash} links to genesis before block 0; walk stopped"
            ),
            DiagnosticKind::MissingGenesis {
                hash,
                previous_hash,
            } => write!(
                f,
                "block[0] {hash} links to {previous_hash} instead of genesis; walk stopped"
            ),
            DiagnosticKind::TransactionMissing {
                block_number,
                block_hash,
                slice,
                index,
                digest,
                lane,
                cause,
            } => write!(
                f,
                "tx fetch failed: block[{block_number}] {block_hash}, slice = {slice}, tx index in slice = {index}, tx hash = {digest}, lane = {lane}: {cause}"
            ),
            DiagnosticKind::TransactionDigestMismatch {
                block_number,
                block_hash,
                slice,
                index,
                digest,
                stored,
                lane,
            } => write!(
                f,
                "tx digest mismatch: block[{block_number}] {block_hash}, slice = {slice}, tx index in slice = {index}, tx hash = {digest}, stored as {stored} in lane {lane}"
            ),
            DiagnosticKind::SanityBound { required, stored } => write!(
                f,
                "less transactions present in db store {stored} than transactions required by blockchain {required}"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A classified finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            severity: kind.severity(),
            kind,
        }
    }
}

impl From<DiagnosticKind> for Diagnostic {
    fn from(kind: DiagnosticKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity.label(), self.kind)
    }
}

/// Sorts diagnostics by position; ties keep their recorded order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.kind.sort_key());
}

// ---------------------------------------------------------------------------
// DiagnosticSink
// ---------------------------------------------------------------------------

/// Thread-safe collector used by concurrent workers.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finding.
    pub fn record(&self, kind: DiagnosticKind) {
        let diagnostic = Diagnostic::new(kind);
        tracing::debug!(severity = ?diagnostic.severity, "{}", diagnostic.kind);
        self.entries.lock().push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Everything recorded, in deterministic position order regardless of
    /// which worker recorded what first.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut entries = self.entries.into_inner();
        entries.sort_by(|a, b| {
            a.kind
                .sort_key()
                .cmp(&b.kind.sort_key())
                .then_with(|| a.to_string().cmp(&b.to_string()))
        });
        entries
    }
}
