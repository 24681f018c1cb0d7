//! # Storage Layout & Check Configuration
//!
//! Every file name the checker relies on lives here, next to the knobs a
//! run can be tuned with. The names are fixed by the node that writes the
//! data directory; changing one here means the checker silently finds
//! nothing, so don't.

use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File Names
// ---------------------------------------------------------------------------

/// Block store data file.
pub const BLOCK_STORE_FILE: &str = "chain.db";

/// Block store index file.
pub const BLOCK_INDEX_FILE: &str = "chain.index.db";

/// Head pointer: exactly 32 raw bytes.
pub const HEAD_POINTER_FILE: &str = "chain.head.db";

/// Lane store file names are `LANE_FILE_PREFIX <N> LANE_FILE_SUFFIX`.
pub const LANE_FILE_PREFIX: &str = "node_storage_lane";

/// Suffix of a lane's transaction data file.
pub const LANE_FILE_SUFFIX: &str = "_transaction.db";

/// Suffix of a lane's transaction index file.
pub const LANE_INDEX_SUFFIX: &str = "_transaction_index.db";

/// Data file name for lane `digits` (the decimal text as found on disk).
pub fn lane_data_file(digits: &str) -> String {
    format!("{LANE_FILE_PREFIX}{digits}{LANE_FILE_SUFFIX}")
}

/// Index file name for lane `digits`.
pub fn lane_index_file(digits: &str) -> String {
    format!("{LANE_FILE_PREFIX}{digits}{LANE_INDEX_SUFFIX}")
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Upper bound on cross-check worker threads picked by default.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Largest number of chain slots preallocated from the block store's
/// reported size. A corrupted size must not turn into a huge allocation.
pub const DEFAULT_MAX_PREALLOCATION: usize = 1 << 20;

// ---------------------------------------------------------------------------
// CheckConfig
// ---------------------------------------------------------------------------

/// How a transaction digest is mapped to the lane that should hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaneResolution {
    /// Derive the lane from the digest bits.
    #[default]
    Digest,
    /// Look every transaction up in one lane. Reproduces single-lane
    /// deployments and the historical checker behaviour.
    Fixed(u64),
}

/// Parameters of one verification run.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Directory holding the chain and lane files.
    pub data_dir: PathBuf,
    /// Worker threads used to resolve transactions.
    pub workers: usize,
    /// Lane routing for transaction lookups.
    pub lane_resolution: LaneResolution,
    /// Cap on chain capacity preallocated from the store's size hint.
    pub max_preallocation: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            workers: default_workers(),
            lane_resolution: LaneResolution::default(),
            max_preallocation: DEFAULT_MAX_PREALLOCATION,
        }
    }
}

impl CheckConfig {
    /// Default configuration for `data_dir`.
    pub fn for_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn block_store_path(&self) -> PathBuf {
        self.data_dir.join(BLOCK_STORE_FILE)
    }

    pub fn block_index_path(&self) -> PathBuf {
        self.data_dir.join(BLOCK_INDEX_FILE)
    }

    pub fn head_pointer_path(&self) -> PathBuf {
        self.data_dir.join(HEAD_POINTER_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Available parallelism, capped at [`DEFAULT_MAX_WORKERS`], never zero.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, DEFAULT_MAX_WORKERS)
}
