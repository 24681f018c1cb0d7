//! # Verification
//!
//! One run over a data directory, in order:
//!
//! ```text
//! LaneDiscovery ──► block store ──► HeadPointer ──► ChainWalker ──► TransactionCrossChecker
//!       │               │               │                │                   │
//!       └───────────────┴───────────────┴── FatalError ──┘                   │
//!                                                         WalkOutcome ───────┴──► ConsistencyReporter ──► Report
//! ```
//!
//! Everything before the cross-check can abort the run. Once the chain is
//! walked, every further anomaly is recorded and the run always produces a
//! report.

pub mod crosscheck;
pub mod diagnostics;
pub mod error;
pub mod report;
pub mod walker;

pub use crosscheck::{CrossCheckOutcome, TransactionCrossChecker};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, MissCause, Severity};
pub use error::{FatalError, EXIT_CLEAN, EXIT_DEGRADED};
pub use report::{ConsistencyReporter, ExitStatus, LaneSummary, Report, TransactionTotals};
pub use walker::{AnchorRepair, ChainWalker, Termination, WalkOutcome, WalkState};

use crate::config::{CheckConfig, LaneResolution};
use crate::lanes::{resolver_for, LaneDiscovery};
use crate::storage::{BlockStore, HeadPointer, ObjectStore};

/// Runs the full consistency check described by a [`CheckConfig`].
#[derive(Debug, Clone)]
pub struct Verifier {
    config: CheckConfig,
}

impl Verifier {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Verifies the data directory. Nothing on disk is modified.
    pub fn run(&self) -> Result<Report, FatalError> {
        let cfg = &self.config;
        tracing::info!(dir = %cfg.data_dir().display(), workers = cfg.workers, "starting verification");

        let lanes = LaneDiscovery::scan(cfg.data_dir())?;
        let lane_summaries = lanes
            .iter()
            .map(|(&lane, store)| LaneSummary {
                lane,
                transactions: store.size(),
            })
            .collect();

        let blocks = BlockStore::open(cfg.block_store_path(), cfg.block_index_path())
            .map_err(FatalError::BlockStoreOpen)?;
        let blocks_in_store = blocks.size();
        tracing::info!(blocks = blocks_in_store, "block store opened");

        let head = HeadPointer::read(cfg.head_pointer_path())?;
        tracing::info!(head = %head, "head pointer read");

        let walk = ChainWalker::new(&blocks)
            .with_max_preallocation(cfg.max_preallocation)
            .walk(head)?;

        if let LaneResolution::Fixed(lane) = cfg.lane_resolution {
            if !lanes.contains_key(&lane) {
                tracing::warn!(lane, "fixed lane is not among the discovered lanes");
            }
        }
        let resolver = resolver_for(cfg.lane_resolution, lanes.len() as u64);
        let crosscheck = TransactionCrossChecker::new(&lanes, resolver.as_ref())
            .with_workers(cfg.workers)
            .check(&walk.chain);

        let mut reporter = ConsistencyReporter::new(head, blocks_in_store, lane_summaries);
        reporter.record_walk(walk);
        reporter.record_crosscheck(crosscheck);
        Ok(reporter.finish())
    }
}

/// Shorthand for `Verifier::new(config).run()`.
pub fn verify(config: CheckConfig) -> Result<Report, FatalError> {
    Verifier::new(config).run()
}
