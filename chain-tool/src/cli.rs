//! # CLI Interface
//!
//! Defines the command-line arguments of `chain-tool` using `clap` derive.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use ledger_fsck::config::{default_workers, CheckConfig, LaneResolution};

use crate::logging::LogFormat;

/// Offline consistency checker for a node's ledger storage.
///
/// Walks the chain from the persisted head back to genesis and verifies
/// that every referenced transaction is present in its lane store. The data
/// directory is never modified unless `--reset-head` is given.
///
/// Exit codes: 0 clean, 3 inconsistencies found, 10-15 unusable directory
/// layout, 20-21 chain cannot be walked, 1 internal error, 2 usage error.
#[derive(Parser, Debug)]
#[command(name = "chain-tool", version, about = "Ledger storage consistency checker")]
pub struct ChainToolCli {
    /// Directory holding chain.db, chain.head.db and the lane stores.
    #[arg(long, short = 'd', env = "CHAIN_TOOL_DIR", default_value = ".")]
    pub directory: PathBuf,

    /// Worker threads for transaction lookups. Defaults to the available
    /// parallelism, capped at 8.
    #[arg(long, short = 'j')]
    pub workers: Option<usize>,

    /// How transaction digests are routed to lanes.
    #[arg(long, value_enum, default_value_t = ResolverKind::Digest)]
    pub lane_resolver: ResolverKind,

    /// Lane used by `--lane-resolver fixed`.
    #[arg(long, default_value_t = 0)]
    pub fixed_lane: u64,

    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report_format: ReportFormat,

    /// Log format written to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Overwrite chain.head.db with this hex digest and exit without
    /// checking. This is the only way the tool writes to the directory.
    #[arg(long, value_name = "HEX")]
    pub reset_head: Option<String>,
}

/// Lane routing selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolverKind {
    /// Route by the low bits of the digest.
    Digest,
    /// Look every transaction up in `--fixed-lane`.
    Fixed,
}

/// Report rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ChainToolCli {
    /// Builds the run configuration from the parsed arguments.
    pub fn check_config(&self) -> CheckConfig {
        let lane_resolution = match self.lane_resolver {
            ResolverKind::Digest => LaneResolution::Digest,
            ResolverKind::Fixed => LaneResolution::Fixed(self.fixed_lane),
        };
        CheckConfig {
            workers: self.workers.unwrap_or_else(default_workers).max(1),
            lane_resolution,
            ..CheckConfig::for_dir(&self.directory)
        }
    }
}
