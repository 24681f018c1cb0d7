//! # Lane Discovery
//!
//! A data directory holds one transaction store per lane:
//!
//! ```text
//! node_storage_lane<N>_transaction.db
//! node_storage_lane<N>_transaction_index.db
//! ```
//!
//! Discovery finds every data file matching that pattern, checks that the
//! lane indices are exactly `0..count` with `count` a power of two, and
//! opens each store read-only.
//!
//! Names are sorted before anything is decided, so the outcome (including
//! which file a duplicate error names) never depends on the order the
//! filesystem happens to list entries in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{lane_data_file, lane_index_file, LANE_FILE_PREFIX, LANE_FILE_SUFFIX};
use crate::storage::{LaneStore, ObjectStore, StoreError};

use super::LaneIndex;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Directory layouts discovery refuses to work with.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("cannot read data directory {}: {source}", .path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the \"{second}\" file with index {lane} has already been inserted before (as \"{first}\")")]
    DuplicateLane {
        lane: LaneIndex,
        first: String,
        second: String,
    },

    #[error("lane files have non-continuous numbering {found:?}: there are missing files for one or more indexes")]
    Continuity { found: Vec<LaneIndex> },

    #[error("inferred number of lanes {count} (= number of file indexes) must be a power of 2")]
    ShardCount { count: usize },

    #[error("cannot open store for lane {lane}: {source}")]
    StoreOpen {
        lane: LaneIndex,
        #[source]
        source: StoreError,
    },
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// File names belonging to one discovered lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneFiles {
    pub data_file: String,
    pub index_file: String,
}

/// Parses `node_storage_lane<N>_transaction.db`, returning `N` and its digit
/// text. Anything else (including index files) yields `None`.
pub fn parse_lane_file_name(name: &str) -> Option<(LaneIndex, &str)> {
    let digits = name
        .strip_prefix(LANE_FILE_PREFIX)?
        .strip_suffix(LANE_FILE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<LaneIndex>() {
        Ok(lane) => Some((lane, digits)),
        Err(_) => {
            tracing::warn!(file = name, "lane index does not fit in 64 bits; ignored");
            None
        }
    }
}

/// Decides the lane layout from a set of directory entry names.
///
/// Pure and order-independent: the names are sorted first.
pub fn plan_lanes<I, S>(names: I) -> Result<BTreeMap<LaneIndex, LaneFiles>, DiscoveryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_owned()).collect();
    names.sort();

    let mut lanes: BTreeMap<LaneIndex, LaneFiles> = BTreeMap::new();
    for name in &names {
        let Some((lane, digits)) = parse_lane_file_name(name) else {
            continue;
        };
        if let Some(existing) = lanes.get(&lane) {
            return Err(DiscoveryError::DuplicateLane {
                lane,
                first: existing.data_file.clone(),
                second: name.clone(),
            });
        }
        tracing::debug!(file = %name, lane, "lane file matched");
        lanes.insert(
            lane,
            LaneFiles {
                data_file: lane_data_file(digits),
                index_file: lane_index_file(digits),
            },
        );
    }

    validate_lane_set(&lanes)?;
    Ok(lanes)
}

/// Lane indices must be exactly `0..count`, and `count` a power of two.
fn validate_lane_set<V>(lanes: &BTreeMap<LaneIndex, V>) -> Result<(), DiscoveryError> {
    let count = lanes.len();
    let continuous = match (lanes.keys().next(), lanes.keys().next_back()) {
        (Some(&min), Some(&max)) => min == 0 && max - min + 1 == count as u64,
        _ => false,
    };
    if !continuous {
        return Err(DiscoveryError::Continuity {
            found: lanes.keys().copied().collect(),
        });
    }
    if !count.is_power_of_two() {
        return Err(DiscoveryError::ShardCount { count });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// LaneDiscovery
// ---------------------------------------------------------------------------

/// Finds and opens the lane stores of a data directory.
pub struct LaneDiscovery;

impl LaneDiscovery {
    /// Scans `dir` and opens every lane store read-only.
    pub fn scan(dir: impl AsRef<Path>) -> Result<BTreeMap<LaneIndex, LaneStore>, DiscoveryError> {
        let dir = dir.as_ref();
        let unreadable = |source| DiscoveryError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source,
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!(name = ?raw, "skipping non-UTF-8 directory entry"),
            }
        }

        let plan = plan_lanes(names)?;
        Self::open(dir, &plan)
    }

    /// Opens the stores named by `plan`.
    pub fn open(
        dir: &Path,
        plan: &BTreeMap<LaneIndex, LaneFiles>,
    ) -> Result<BTreeMap<LaneIndex, LaneStore>, DiscoveryError> {
        let mut stores = BTreeMap::new();
        for (&lane, files) in plan {
            let store = LaneStore::open(dir.join(&files.data_file), dir.join(&files.index_file))
                .map_err(|source| DiscoveryError::StoreOpen { lane, source })?;
            tracing::info!(lane, tx_count = store.size(), "lane store opened");
            stores.insert(lane, store);
        }
        tracing::info!(lanes = stores.len(), "inferred number of lanes");
        Ok(stores)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
