//! # Lanes
//!
//! Transactions are sharded across a power-of-two number of lane stores.
//! [`discovery`] finds and opens them; [`resolver`] decides which lane a
//! given transaction digest belongs to.

pub mod discovery;
pub mod resolver;

pub use discovery::{parse_lane_file_name, plan_lanes, DiscoveryError, LaneDiscovery, LaneFiles};
pub use resolver::{resolver_for, DigestLaneResolver, FixedLaneResolver, LaneResolver};

/// Position of a lane in `0..lane_count`.
pub type LaneIndex = u64;
