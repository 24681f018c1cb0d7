//! # Consistency Report
//!
//! The reporter gathers what the walk and the cross-check produced into one
//! [`Report`] and decides the run's [`ExitStatus`]: clean only when nothing
//! of severity `Inconsistency` or worse was recorded.
//!
//! Two renderings are provided. Text keeps informational lines and findings
//! on separate writers (the binary passes stdout and stderr); JSON is one
//! document with everything in it.

use std::io::{self, Write};

use serde::Serialize;

use crate::lanes::LaneIndex;
use crate::storage::Digest;

use super::crosscheck::CrossCheckOutcome;
use super::diagnostics::{sort_diagnostics, Diagnostic, Severity};
use super::error::{EXIT_CLEAN, EXIT_DEGRADED};
use super::walker::{AnchorRepair, Termination, WalkOutcome};

// ---------------------------------------------------------------------------
// Report Types
// ---------------------------------------------------------------------------

/// Outcome of a run that was not aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Clean,
    Degraded,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Clean => EXIT_CLEAN,
            ExitStatus::Degraded => EXIT_DEGRADED,
        }
    }
}

/// Stored transaction count of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaneSummary {
    pub lane: LaneIndex,
    pub transactions: u64,
}

/// Transaction totals of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionTotals {
    /// Sum of slice lengths over the walked chain.
    pub required: u64,
    /// Sum of lane store sizes.
    pub stored: u64,
    pub present: u64,
    pub missing: u64,
}

/// Final summary of a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub head: Digest,
    pub blocks_in_store: u64,
    pub blocks_walked: u64,
    pub termination: Termination,
    pub repair: Option<AnchorRepair>,
    pub lanes: Vec<LaneSummary>,
    pub transactions: TransactionTotals,
    pub diagnostics: Vec<Diagnostic>,
    pub status: ExitStatus,
}

impl Report {
    pub fn exit_code(&self) -> i32 {
        self.status.code()
    }

    /// Number of findings at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Writes the human-readable report. Summary lines and `INFO` findings
    /// go to `out`; `INCONSISTENCY` findings go to `err`.
    pub fn render_text<O: Write, E: Write>(&self, out: &mut O, err: &mut E) -> io::Result<()> {
        writeln!(out, "Inferred number of lanes: {}", self.lanes.len())?;
        for lane in &self.lanes {
            writeln!(out, "Lane{}: {} transactions", lane.lane, lane.transactions)?;
        }
        writeln!(out, "Blocks in store: {}", self.blocks_in_store)?;
        writeln!(out, "Head: {}", self.head)?;
        if let Some(repair) = &self.repair {
            writeln!(
                out,
                "Anchor {} relocated from block[{}] to block[{}]",
                repair.hash, repair.from, repair.to
            )?;
        }
        writeln!(
            out,
            "Blocks walked: {} (stopped at {})",
            self.blocks_walked,
            termination_label(self.termination)
        )?;

        for diagnostic in &self.diagnostics {
            match diagnostic.severity {
                Severity::Info => writeln!(out, "{diagnostic}")?,
                _ => writeln!(err, "{diagnostic}")?,
            }
        }

        let tx = &self.transactions;
        writeln!(out, "Transactions required by blockchain: {}", tx.required)?;
        writeln!(out, "Transactions stored in lanes: {}", tx.stored)?;
        writeln!(out, "Transactions present: {}", tx.present)?;
        writeln!(out, "Transactions missing: {}", tx.missing)?;
        writeln!(
            out,
            "Status: {} ({} inconsistencies)",
            status_label(self.status),
            self.count(Severity::Inconsistency)
        )?;
        out.flush()?;
        err.flush()
    }

    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn termination_label(termination: Termination) -> &'static str {
    match termination {
        Termination::Genesis => "genesis",
        Termination::PrematureGenesis => "premature genesis",
        Termination::MissingGenesis => "missing genesis",
    }
}

fn status_label(status: ExitStatus) -> &'static str {
    match status {
        ExitStatus::Clean => "clean",
        ExitStatus::Degraded => "degraded",
    }
}

// ---------------------------------------------------------------------------
// ConsistencyReporter
// ---------------------------------------------------------------------------

/// Accumulates the results of one run into a [`Report`].
#[derive(Debug)]
pub struct ConsistencyReporter {
    head: Digest,
    blocks_in_store: u64,
    lanes: Vec<LaneSummary>,
    blocks_walked: u64,
    termination: Termination,
    repair: Option<AnchorRepair>,
    transactions: TransactionTotals,
    diagnostics: Vec<Diagnostic>,
}

impl ConsistencyReporter {
    pub fn new(head: Digest, blocks_in_store: u64, lanes: Vec<LaneSummary>) -> Self {
        Self {
            head,
            blocks_in_store,
            lanes,
            blocks_walked: 0,
            termination: Termination::Genesis,
            repair: None,
            transactions: TransactionTotals::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Takes the walk's findings. The chain itself is not kept.
    pub fn record_walk(&mut self, walk: WalkOutcome) {
        self.blocks_walked = walk.chain.len() as u64;
        self.termination = walk.termination;
        self.repair = walk.repair;
        self.transactions.required = walk.transactions_required;
        self.diagnostics.extend(walk.diagnostics);
    }

    pub fn record_crosscheck(&mut self, outcome: CrossCheckOutcome) {
        self.transactions.stored = outcome.stored;
        self.transactions.present = outcome.present;
        self.transactions.missing = outcome.missing;
        self.diagnostics.extend(outcome.diagnostics);
    }

    /// Sorts findings by position and classifies the run.
    pub fn finish(mut self) -> Report {
        sort_diagnostics(&mut self.diagnostics);
        let degraded = self
            .diagnostics
            .iter()
            .any(|d| d.severity >= Severity::Inconsistency);
        let status = if degraded {
            ExitStatus::Degraded
        } else {
            ExitStatus::Clean
        };

        tracing::info!(
            status = status_label(status),
            diagnostics = self.diagnostics.len(),
            "verification finished"
        );

        Report {
            head: self.head,
            blocks_in_store: self.blocks_in_store,
            blocks_walked: self.blocks_walked,
            termination: self.termination,
            repair: self.repair,
            lanes: self.lanes,
            transactions: self.transactions,
            diagnostics: self.diagnostics,
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
