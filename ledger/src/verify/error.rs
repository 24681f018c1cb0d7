//! Fatal conditions and their process exit codes.
//!
//! A fatal error ends the run before any report is produced. Each kind maps
//! to its own exit code so scripts can tell a broken directory layout from a
//! chain that could not be walked. The codes are part of the tool's
//! interface; existing numbers must never be reassigned.

use crate::lanes::DiscoveryError;
use crate::storage::{Digest, HeadError, StoreError};

/// Exit code of a run with no findings.
pub const EXIT_CLEAN: i32 = 0;

/// Exit code of a run that completed with inconsistencies.
pub const EXIT_DEGRADED: i32 = 3;

/// Conditions that abort a verification run.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    /// The directory layout was rejected before any store was read.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("cannot open block store: {0}")]
    BlockStoreOpen(#[source] StoreError),

    #[error("head pointer unavailable: {0}")]
    HeadUnavailable(#[from] HeadError),

    #[error("block[{block_index}] {hash} could not be fetched: {reason}")]
    Fetch {
        block_index: u64,
        hash: Digest,
        reason: String,
    },

    #[error("block {hash} declares number {found} but the walk expected {expected}; the anchor was already placed")]
    UnrecoverableNumberMismatch {
        expected: u64,
        found: u64,
        hash: Digest,
    },
}

impl FatalError {
    /// Stable process exit code for this kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::Discovery(err) => match err {
                DiscoveryError::DirectoryUnreadable { .. } => 10,
                DiscoveryError::DuplicateLane { .. } => 11,
                DiscoveryError::Continuity { .. } => 12,
                DiscoveryError::ShardCount { .. } => 13,
                DiscoveryError::StoreOpen { .. } => 14,
            },
            FatalError::BlockStoreOpen(_) => 14,
            FatalError::HeadUnavailable(_) => 15,
            FatalError::Fetch { .. } => 20,
            FatalError::UnrecoverableNumberMismatch { .. } => 21,
        }
    }

    /// Error class the condition belongs to.
    pub fn category(&self) -> &'static str {
        match self {
            FatalError::Fetch { .. } => "fetch",
            FatalError::UnrecoverableNumberMismatch { .. } => "linkage",
            _ => "configuration",
        }
    }
}
