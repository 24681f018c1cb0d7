//! Digest → lane routing.
//!
//! Which lane owns a transaction is a function of its digest and the lane
//! count. Keeping that function behind [`LaneResolver`] lets the
//! cross-checker stay ignorant of the routing rule, and lets the rule be
//! tested on its own.

use crate::config::LaneResolution;
use crate::storage::Digest;

use super::LaneIndex;

/// Maps a transaction digest to the lane that should hold it.
pub trait LaneResolver: Send + Sync {
    fn resolve(&self, digest: &Digest) -> LaneIndex;
}

/// Routes by the low bits of the digest.
///
/// The first four digest bytes are read as a little-endian integer and
/// masked with `lane_count - 1`, which is why the lane count has to be a
/// power of two.
#[derive(Debug, Clone, Copy)]
pub struct DigestLaneResolver {
    mask: u64,
}

impl DigestLaneResolver {
    /// Returns `None` unless `lane_count` is a non-zero power of two.
    pub fn new(lane_count: u64) -> Option<Self> {
        lane_count
            .is_power_of_two()
            .then(|| Self { mask: lane_count - 1 })
    }
}

impl LaneResolver for DigestLaneResolver {
    fn resolve(&self, digest: &Digest) -> LaneIndex {
        let bytes = digest.as_bytes();
        let low = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        u64::from(low) & self.mask
    }
}

/// Sends every digest to the same lane.
#[derive(Debug, Clone, Copy)]
pub struct FixedLaneResolver(pub LaneIndex);

impl LaneResolver for FixedLaneResolver {
    fn resolve(&self, _digest: &Digest) -> LaneIndex {
        self.0
    }
}

/// Builds the resolver a configuration asks for.
///
/// `lane_count` must already be validated as a power of two; discovery
/// refuses anything else.
pub fn resolver_for(resolution: LaneResolution, lane_count: u64) -> Box<dyn LaneResolver> {
    match resolution {
        LaneResolution::Fixed(lane) => Box::new(FixedLaneResolver(lane)),
        LaneResolution::Digest => match DigestLaneResolver::new(lane_count) {
            Some(resolver) => Box::new(resolver),
            None => Box::new(FixedLaneResolver(0)),
        },
    }
}
