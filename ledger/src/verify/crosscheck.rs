//! # Transaction Cross-Check
//!
//! Once the chain is walked, every transaction it references is looked up
//! in the lane its digest resolves to. Lookups are independent and
//! read-only, so they are spread over a bounded set of scoped worker
//! threads. Findings go into a shared [`DiagnosticSink`] and come out sorted
//! by (block number, slice, in-slice index), whatever the scheduling.
//!
//! A transaction counts as missing whenever the resolved lookup does not
//! produce it. When it is absent from its own lane, the other lanes are
//! probed so the diagnostic can say whether the data is lost or merely
//! routed to the wrong place.

use std::collections::BTreeMap;

use crate::lanes::{LaneIndex, LaneResolver};
use crate::storage::{Chain, Digest, ObjectStore, Transaction};

use super::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, MissCause};

/// One transaction reference taken from the chain.
#[derive(Debug, Clone, Copy)]
struct WorkItem {
    block_number: u64,
    block_hash: Digest,
    slice: u64,
    index: u64,
    digest: Digest,
}

/// Per-worker tallies, merged after the join.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    present: u64,
    missing: u64,
}

/// Totals and findings of a cross-check.
#[derive(Debug, Clone, Default)]
pub struct CrossCheckOutcome {
    /// Transaction references seen in the chain.
    pub observed: u64,
    /// References the resolved lookup produced.
    pub present: u64,
    /// References the resolved lookup failed to produce.
    pub missing: u64,
    /// Sum of every lane store's reported size.
    pub stored: u64,
    /// Sorted findings.
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves every transaction of a chain against the lane stores.
pub struct TransactionCrossChecker<'a, S> {
    lanes: &'a BTreeMap<LaneIndex, S>,
    resolver: &'a dyn LaneResolver,
    workers: usize,
}

impl<'a, S> TransactionCrossChecker<'a, S>
where
    S: ObjectStore<Transaction> + Sync,
{
    pub fn new(lanes: &'a BTreeMap<LaneIndex, S>, resolver: &'a dyn LaneResolver) -> Self {
        Self {
            lanes,
            resolver,
            workers: 1,
        }
    }

    /// Number of worker threads; zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn check(&self, chain: &Chain) -> CrossCheckOutcome {
        let work = collect_work(chain);
        let observed = work.len() as u64;
        let stored: u64 = self.lanes.values().map(|store| store.size()).sum();
        let sink = DiagnosticSink::new();

        let workers = self.workers.min(work.len()).max(1);
        tracing::info!(transactions = observed, workers, "cross-checking transactions");

        let tally = if workers == 1 {
            self.check_items(&work, &sink)
        } else {
            let chunk = work.len().div_ceil(workers);
            let sink = &sink;
            std::thread::scope(|scope| {
                let handles: Vec<_> = work
                    .chunks(chunk)
                    .map(|items| scope.spawn(move || self.check_items(items, sink)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| match h.join() {
                        Ok(tally) => tally,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
                    .fold(Tally::default(), |acc, t| Tally {
                        present: acc.present + t.present,
                        missing: acc.missing + t.missing,
                    })
            })
        };

        if observed > stored {
            tracing::warn!(
                required = observed,
                stored,
                "chain references more transactions than the lanes hold"
            );
            sink.record(DiagnosticKind::SanityBound {
                required: observed,
                stored,
            });
        }

        tracing::info!(
            observed,
            present = tally.present,
            missing = tally.missing,
            stored,
            "cross-check finished"
        );

        CrossCheckOutcome {
            observed,
            present: tally.present,
            missing: tally.missing,
            stored,
            diagnostics: sink.into_sorted(),
        }
    }

    fn check_items(&self, items: &[WorkItem], sink: &DiagnosticSink) -> Tally {
        let mut tally = Tally::default();
        for item in items {
            if self.check_one(item, sink) {
                tally.present += 1;
            } else {
                tally.missing += 1;
            }
        }
        tally
    }

    /// `true` when the resolved lane produced the transaction.
    fn check_one(&self, item: &WorkItem, sink: &DiagnosticSink) -> bool {
        let lane = self.resolver.resolve(&item.digest);
        let missing = |cause| DiagnosticKind::TransactionMissing {
            block_number: item.block_number,
            block_hash: item.block_hash,
            slice: item.slice,
            index: item.index,
            digest: item.digest,
            lane,
            cause,
        };

        let Some(store) = self.lanes.get(&lane) else {
            sink.record(missing(MissCause::LaneUnavailable));
            return false;
        };

        match store.get(&item.digest) {
            Ok(Some(tx)) => {
                if tx.digest != item.digest {
                    sink.record(DiagnosticKind::TransactionDigestMismatch {
                        block_number: item.block_number,
                        block_hash: item.block_hash,
                        slice: item.slice,
                        index: item.index,
                        digest: item.digest,
                        stored: tx.digest,
                        lane,
                    });
                }
                true
            }
            Ok(None) => {
                let cause = match self.find_elsewhere(&item.digest, lane) {
                    Some(found_in) => MissCause::Misplaced { found_in },
                    None => MissCause::Absent,
                };
                sink.record(missing(cause));
                false
            }
            Err(err) => {
                sink.record(missing(MissCause::Unreadable {
                    reason: err.to_string(),
                }));
                false
            }
        }
    }

    /// First other lane holding a readable record under `digest`.
    fn find_elsewhere(&self, digest: &Digest, resolved: LaneIndex) -> Option<LaneIndex> {
        self.lanes
            .iter()
            .filter(|(lane, _)| **lane != resolved)
            .find(|&(_, store)| matches!(store.get(digest), Ok(Some(_))))
            .map(|(lane, _)| *lane)
    }
}

fn collect_work(chain: &Chain) -> Vec<WorkItem> {
    let capacity = usize::try_from(chain.tx_count()).unwrap_or(0);
    let mut work = Vec::with_capacity(capacity);
    for block in chain.iter() {
        for (slice, layouts) in block.slices.iter().enumerate() {
            for (index, layout) in layouts.iter().enumerate() {
                work.push(WorkItem {
                    block_number: block.block_number,
                    block_hash: block.hash,
                    slice: slice as u64,
                    index: index as u64,
                    digest: layout.digest,
                });
            }
        }
    }
    work
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
