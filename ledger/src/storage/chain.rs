//! Index-addressed chain reconstructed by a backward walk.
//!
//! The walk visits blocks from the highest number down, so records are kept
//! in visit order and addressed through the number of the first one (the
//! anchor). Re-keying the anchor before anything else is stored is how the
//! walker relocates it; no slots are ever allocated for blocks that were not
//! read, so a corrupted block number cannot blow up memory.

use super::block::BlockRecord;

/// Ordered chain of block records, addressed by block number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    /// Number of the first (highest) record. Meaningless while empty.
    top: u64,
    /// Records in walk order: `blocks[k]` has number `top - k`.
    blocks: Vec<BlockRecord>,
}

impl Chain {
    /// Empty chain with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            top: 0,
            blocks: Vec::with_capacity(capacity),
        }
    }

    /// Places the anchor. Only valid on an empty chain.
    pub(crate) fn set_top(&mut self, top: u64) {
        debug_assert!(self.blocks.is_empty(), "anchor moved after records were stored");
        self.top = top;
    }

    /// Stores the record one position below the previous one.
    pub(crate) fn push_next(&mut self, record: BlockRecord) {
        self.blocks.push(record);
    }

    /// Record at `index`, if walked.
    pub fn get(&self, index: u64) -> Option<&BlockRecord> {
        if self.blocks.is_empty() || index > self.top {
            return None;
        }
        let offset = usize::try_from(self.top - index).ok()?;
        self.blocks.get(offset)
    }

    /// Number of walked records.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of the anchor (highest) record.
    pub fn highest_index(&self) -> Option<u64> {
        (!self.blocks.is_empty()).then_some(self.top)
    }

    /// Number of the last record reached by the walk.
    pub fn lowest_index(&self) -> Option<u64> {
        let len = self.blocks.len() as u64;
        (len > 0).then(|| self.top - (len - 1))
    }

    /// `true` when the walk reached index 0.
    pub fn reaches_genesis(&self) -> bool {
        self.lowest_index() == Some(0)
    }

    /// Records in ascending block-number order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &BlockRecord> + ExactSizeIterator {
        self.blocks.iter().rev()
    }

    /// Ascending `(index, record)` pairs.
    pub fn indexed(&self) -> impl Iterator<Item = (u64, &BlockRecord)> {
        let low = self.lowest_index().unwrap_or(0);
        self.iter().enumerate().map(move |(i, b)| (low + i as u64, b))
    }

    /// Total transactions referenced by the walked records.
    pub fn tx_count(&self) -> u64 {
        self.blocks.iter().map(BlockRecord::tx_count).sum()
    }
}
