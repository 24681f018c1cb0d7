//! End-to-end tests for ledger verification.
//!
//! Each test writes a complete data directory (block store, head pointer and
//! lane stores) into its own temporary directory, in the same file format a
//! node produces, and runs the full [`Verifier`] over it. No shared state,
//! no ordering dependencies.

use std::collections::BTreeMap;
use std::path::Path;

use ledger_fsck::config::{
    lane_data_file, lane_index_file, CheckConfig, LaneResolution, BLOCK_INDEX_FILE,
    BLOCK_STORE_FILE, HEAD_POINTER_FILE,
};
use ledger_fsck::lanes::{DigestLaneResolver, DiscoveryError, LaneResolver};
use ledger_fsck::storage::{
    BlockRecord, Digest, HeadPointer, ObjectStoreWriter, Transaction, TransactionLayout,
};
use ledger_fsck::verify::{
    DiagnosticKind, ExitStatus, FatalError, MissCause, Severity, Termination, Verifier,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn tx(tag: &str) -> Transaction {
    Transaction::from_payload(tag.as_bytes().to_vec())
}

/// Linked chain where block `n` carries `per_block[n]` as slices.
fn build_chain(per_block: &[Vec<Vec<Transaction>>]) -> Vec<BlockRecord> {
    let mut blocks: Vec<BlockRecord> = Vec::new();
    for slices in per_block {
        let slices: Vec<Vec<TransactionLayout>> = slices
            .iter()
            .map(|s| s.iter().map(|t| TransactionLayout::new(t.digest)).collect())
            .collect();
        let block = match blocks.last() {
            None => BlockRecord::genesis(slices),
            Some(parent) => BlockRecord::child_of(parent, slices),
        };
        blocks.push(block);
    }
    for i in 1..blocks.len() {
        blocks[i - 1].next_hash = blocks[i].hash;
    }
    blocks
}

fn write_blocks(dir: &Path, blocks: &[BlockRecord]) {
    let mut w = ObjectStoreWriter::create(dir.join(BLOCK_STORE_FILE), dir.join(BLOCK_INDEX_FILE))
        .expect("create block store");
    for b in blocks {
        w.put(&b.hash, b).expect("put block");
    }
    w.finish().expect("finish block store");
}

/// Writes `lane_count` lane stores, each transaction routed by digest.
fn write_lanes(dir: &Path, lane_count: u64, txs: &[Transaction]) {
    let resolver = DigestLaneResolver::new(lane_count).expect("power of two");
    let mut by_lane: BTreeMap<u64, Vec<&Transaction>> =
        (0..lane_count).map(|l| (l, Vec::new())).collect();
    for t in txs {
        by_lane.entry(resolver.resolve(&t.digest)).or_default().push(t);
    }
    for (lane, txs) in by_lane {
        let digits = lane.to_string();
        let mut w = ObjectStoreWriter::create(
            dir.join(lane_data_file(&digits)),
            dir.join(lane_index_file(&digits)),
        )
        .expect("create lane store");
        for t in txs {
            w.put(&t.digest, t).expect("put tx");
        }
        w.finish().expect("finish lane store");
    }
}

fn write_head(dir: &Path, head: &Digest) {
    std::fs::write(dir.join(HEAD_POINTER_FILE), head.as_bytes()).expect("write head");
}

/// Full directory: chain, head at the last block, lanes holding `stored`.
fn write_directory(dir: &Path, blocks: &[BlockRecord], lane_count: u64, stored: &[Transaction]) {
    write_blocks(dir, blocks);
    write_lanes(dir, lane_count, stored);
    if let Some(head) = blocks.last() {
        write_head(dir, &head.hash);
    }
}

fn verifier(dir: &Path) -> Verifier {
    let mut config = CheckConfig::for_dir(dir);
    config.workers = 4;
    Verifier::new(config)
}

/// Every file in `dir` with its contents.
fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                std::fs::read(e.path()).unwrap(),
            )
        })
        .collect()
}

fn sample_transactions(n: usize) -> Vec<Transaction> {
    (0..n).map(|i| tx(&format!("payment #{i}"))).collect()
}

// ---------------------------------------------------------------------------
// 1. Clean Directories
// ---------------------------------------------------------------------------

#[test]
fn genesis_only_single_lane_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = build_chain(&[vec![]]);
    write_directory(dir.path(), &blocks, 1, &[]);

    let report = verifier(dir.path()).run().expect("verification");
    assert_eq!(report.blocks_walked, 1);
    assert_eq!(report.blocks_in_store, 1);
    assert_eq!(report.termination, Termination::Genesis);
    assert_eq!(report.transactions.required, 0);
    assert_eq!(report.transactions.missing, 0);
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.status, ExitStatus::Clean);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn sharded_chain_is_clean_and_rerun_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let txs = sample_transactions(60);
    let blocks = build_chain(&[
        vec![txs[..5].to_vec()],
        vec![txs[5..20].to_vec(), txs[20..30].to_vec()],
        vec![],
        vec![txs[30..].to_vec()],
    ]);
    write_directory(dir.path(), &blocks, 4, &txs);
    let before = snapshot(dir.path());

    let first = verifier(dir.path()).run().expect("first run");
    let second = verifier(dir.path()).run().expect("second run");

    assert_eq!(first.status, ExitStatus::Clean);
    assert!(first.diagnostics.is_empty());
    assert_eq!(first.blocks_walked, 4);
    assert_eq!(first.lanes.len(), 4);
    assert_eq!(first.transactions.required, 60);
    assert_eq!(first.transactions.present, 60);
    assert_eq!(first.transactions.stored, 60);
    assert_eq!(first, second);
    assert_eq!(snapshot(dir.path()), before, "verification must not modify files");
}

#[test]
fn orphan_block_triggers_single_anchor_repair_only() {
    let dir = tempfile::tempdir().unwrap();
    let txs = sample_transactions(4);
    let mut blocks = build_chain(&[
        vec![txs[..1].to_vec()],
        vec![txs[1..2].to_vec()],
        vec![txs[2..].to_vec()],
    ]);
    let head = blocks[2].hash;
    // A stale fork block inflates the store's size to four.
    let orphan = BlockRecord::with_parent(blocks[1].hash, 2, vec![]);
    blocks.push(orphan);
    write_blocks(dir.path(), &blocks);
    write_lanes(dir.path(), 2, &txs);
    write_head(dir.path(), &head);

    let report = verifier(dir.path()).run().expect("verification");
    let repair = report.repair.expect("anchor relocated");
    assert_eq!((repair.from, repair.to), (3, 2));
    assert_eq!(report.blocks_walked, 3);
    assert_eq!(report.count(Severity::Info), 1);
    assert_eq!(report.status, ExitStatus::Clean);
}

// ---------------------------------------------------------------------------
// 2. Degraded Directories
// ---------------------------------------------------------------------------

#[test]
fn missing_transaction_is_located_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let txs = sample_transactions(12);
    let blocks = build_chain(&[
        vec![txs[..4].to_vec()],
        vec![txs[4..8].to_vec(), txs[8..].to_vec()],
    ]);
    let lost = txs[9].clone();
    let mut stored: Vec<Transaction> = txs.iter().filter(|t| **t != lost).cloned().collect();
    stored.push(tx("unrelated"));
    write_directory(dir.path(), &blocks, 2, &stored);

    let report = verifier(dir.path()).run().expect("verification");
    assert_eq!(report.status, ExitStatus::Degraded);
    assert_eq!(report.exit_code(), 3);
    assert_eq!(report.transactions.missing, 1);
    assert_eq!(report.transactions.present, 11);
    assert_eq!(report.diagnostics.len(), 1);
    match &report.diagnostics[0].kind {
        DiagnosticKind::TransactionMissing {
            block_number,
            block_hash,
            slice,
            index,
            digest,
            cause,
            ..
        } => {
            assert_eq!((*block_number, *slice, *index), (1, 1, 1));
            assert_eq!(*block_hash, blocks[1].hash);
            assert_eq!(*digest, lost.digest);
            assert_eq!(*cause, MissCause::Absent);
        }
        other => panic!("unexpected diagnostic {other:?}"),
    }
}

#[test]
fn storage_deficit_raises_sanity_bound() {
    let dir = tempfile::tempdir().unwrap();
    let txs = sample_transactions(3);
    let blocks = build_chain(&[vec![txs.clone()]]);
    write_directory(dir.path(), &blocks, 1, &txs[..1]);

    let report = verifier(dir.path()).run().expect("verification");
    assert_eq!(report.transactions.missing, 2);
    assert!(matches!(
        report.diagnostics.last().map(|d| &d.kind),
        Some(DiagnosticKind::SanityBound {
            required: 3,
            stored: 1
        })
    ));
    assert_eq!(report.status, ExitStatus::Degraded);
}

#[test]
fn unreadable_transaction_is_missing_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let good = tx("good");
    let broken = tx("broken");
    let blocks = build_chain(&[vec![vec![good.clone(), broken.clone()]]]);
    write_blocks(dir.path(), &blocks);
    write_head(dir.path(), &blocks[0].hash);

    let mut w = ObjectStoreWriter::create(
        dir.path().join(lane_data_file("0")),
        dir.path().join(lane_index_file("0")),
    )
    .unwrap();
    w.put(&good.digest, &good).unwrap();
    w.put_dangling(&broken.digest, 1 << 20, 64).unwrap();
    w.finish().unwrap();

    let report = verifier(dir.path()).run().expect("verification");
    assert_eq!(report.transactions.missing, 1);
    assert!(matches!(
        &report.diagnostics[0].kind,
        DiagnosticKind::TransactionMissing {
            cause: MissCause::Unreadable { .. },
            ..
        }
    ));
}

#[test]
fn fixed_lane_resolution_is_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let txs = sample_transactions(16);
    let blocks = build_chain(&[vec![txs.clone()]]);
    write_directory(dir.path(), &blocks, 2, &txs);

    let routed = verifier(dir.path()).run().unwrap();
    assert_eq!(routed.transactions.missing, 0);

    let mut config = CheckConfig::for_dir(dir.path());
    config.lane_resolution = LaneResolution::Fixed(0);
    let fixed = Verifier::new(config).run().unwrap();
    let in_lane_one = routed.lanes[1].transactions;
    assert_eq!(fixed.transactions.missing, in_lane_one);
}

// ---------------------------------------------------------------------------
// 3. Fatal Directories
// ---------------------------------------------------------------------------

#[test]
fn short_head_pointer_is_fatal_before_walk() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = build_chain(&[vec![]]);
    write_directory(dir.path(), &blocks, 1, &[]);
    std::fs::write(dir.path().join(HEAD_POINTER_FILE), [0u8; 31]).unwrap();

    let err = verifier(dir.path()).run().unwrap_err();
    assert!(matches!(err, FatalError::HeadUnavailable(_)), "{err:?}");
    assert_eq!(err.exit_code(), 15);
}

#[test]
fn empty_or_absent_head_pointer_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = build_chain(&[vec![]]);
    write_blocks(dir.path(), &blocks);
    write_lanes(dir.path(), 1, &[]);

    let err = verifier(dir.path()).run().unwrap_err();
    assert!(matches!(err, FatalError::HeadUnavailable(_)));

    std::fs::write(dir.path().join(HEAD_POINTER_FILE), b"").unwrap();
    let err = verifier(dir.path()).run().unwrap_err();
    assert!(matches!(err, FatalError::HeadUnavailable(_)));
    assert_eq!(
        std::fs::metadata(dir.path().join(HEAD_POINTER_FILE)).unwrap().len(),
        0,
        "head pointer must not be rewritten by a check"
    );
}

#[test]
fn three_lanes_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = build_chain(&[vec![]]);
    write_directory(dir.path(), &blocks, 2, &[]);
    ObjectStoreWriter::<Transaction>::create(
        dir.path().join(lane_data_file("2")),
        dir.path().join(lane_index_file("2")),
    )
    .unwrap()
    .finish()
    .unwrap();

    let err = verifier(dir.path()).run().unwrap_err();
    assert!(matches!(err, FatalError::Discovery(DiscoveryError::ShardCount { count: 3 })));
    assert_eq!(err.exit_code(), 13);
}

#[test]
fn no_lanes_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = build_chain(&[vec![]]);
    write_blocks(dir.path(), &blocks);
    write_head(dir.path(), &blocks[0].hash);

    let err = verifier(dir.path()).run().unwrap_err();
    assert!(matches!(err, FatalError::Discovery(DiscoveryError::Continuity { .. })));
}

#[test]
fn corrupt_block_mid_walk_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = build_chain(&[vec![], vec![], vec![]]);
    let mut w = ObjectStoreWriter::create(
        dir.path().join(BLOCK_STORE_FILE),
        dir.path().join(BLOCK_INDEX_FILE),
    )
    .unwrap();
    w.put(&blocks[0].hash, &blocks[0]).unwrap();
    w.put_raw(&blocks[1].hash, b"\x01not a block").unwrap();
    w.put(&blocks[2].hash, &blocks[2]).unwrap();
    w.finish().unwrap();
    write_lanes(dir.path(), 1, &[]);
    write_head(dir.path(), &blocks[2].hash);

    let err = verifier(dir.path()).run().unwrap_err();
    assert!(matches!(err, FatalError::Fetch { block_index: 1, .. }), "{err:?}");
    assert_eq!(err.exit_code(), 20);
}

#[test]
fn missing_block_store_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_lanes(dir.path(), 1, &[]);
    write_head(dir.path(), &Digest::of(b"head"));

    let err = verifier(dir.path()).run().unwrap_err();
    assert!(matches!(err, FatalError::BlockStoreOpen(_)));
    assert_eq!(err.exit_code(), 14);
}

// ---------------------------------------------------------------------------
// 4. Explicit Head Reset
// ---------------------------------------------------------------------------

#[test]
fn reset_head_points_check_at_new_tip() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = build_chain(&[vec![], vec![], vec![]]);
    write_directory(dir.path(), &blocks, 1, &[]);
    let head_path = dir.path().join(HEAD_POINTER_FILE);

    HeadPointer::write(&head_path, &blocks[1].hash).unwrap();
    assert_eq!(HeadPointer::read(&head_path).unwrap(), blocks[1].hash);

    let report = verifier(dir.path()).run().unwrap();
    assert_eq!(report.head, blocks[1].hash);
    assert_eq!(report.blocks_walked, 2);
    // The store still holds three blocks, so the anchor is relocated.
    assert_eq!(report.repair.map(|r| r.to), Some(1));
    assert_eq!(report.status, ExitStatus::Clean);
}
