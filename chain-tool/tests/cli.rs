//! Exit-code tests for the `chain-tool` binary.
//!
//! Each test lays out a data directory in a temp dir, runs the compiled
//! binary against it, and checks the process status and output streams.

use std::path::Path;
use std::process::{Command, Output};

use ledger_fsck::config::{
    lane_data_file, lane_index_file, BLOCK_INDEX_FILE, BLOCK_STORE_FILE, HEAD_POINTER_FILE,
};
use ledger_fsck::storage::{BlockRecord, ObjectStoreWriter, Transaction, TransactionLayout};

fn chain_tool(dir: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chain-tool"))
        .arg("--directory")
        .arg(dir)
        .args(extra)
        .env_remove("CHAIN_TOOL_DIR")
        .env("RUST_LOG", "off")
        .output()
        .expect("spawn chain-tool")
}

/// Two-block chain referencing `txs`; a single lane holding `stored`.
fn write_directory(dir: &Path, txs: &[Transaction], stored: &[Transaction]) -> Vec<BlockRecord> {
    let genesis = BlockRecord::genesis(vec![]);
    let layouts = txs.iter().map(|t| TransactionLayout::new(t.digest)).collect();
    let tip = BlockRecord::child_of(&genesis, vec![layouts]);
    let blocks = vec![genesis, tip];

    let mut w = ObjectStoreWriter::create(dir.join(BLOCK_STORE_FILE), dir.join(BLOCK_INDEX_FILE))
        .unwrap();
    for b in &blocks {
        w.put(&b.hash, b).unwrap();
    }
    w.finish().unwrap();

    let mut w =
        ObjectStoreWriter::create(dir.join(lane_data_file("0")), dir.join(lane_index_file("0")))
            .unwrap();
    for t in stored {
        w.put(&t.digest, t).unwrap();
    }
    w.finish().unwrap();

    std::fs::write(dir.join(HEAD_POINTER_FILE), blocks[1].hash.as_bytes()).unwrap();
    blocks
}

fn txs(n: usize) -> Vec<Transaction> {
    (0..n)
        .map(|i| Transaction::from_payload(vec![i as u8; 8]))
        .collect()
}

#[test]
fn clean_directory_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let t = txs(3);
    write_directory(dir.path(), &t, &t);

    let out = chain_tool(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Blocks walked: 2"));
    assert!(stdout.contains("Status: clean"));
    assert!(out.stderr.is_empty());
}

#[test]
fn missing_transaction_exits_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let t = txs(3);
    let mut stored = t[..2].to_vec();
    stored.push(Transaction::from_payload(b"spare".to_vec()));
    write_directory(dir.path(), &t, &stored);

    let out = chain_tool(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("INCONSISTENCY: tx fetch failed: block[1]"));
    assert!(stderr.contains("tx index in slice = 2"));
}

#[test]
fn json_report_goes_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let t = txs(2);
    write_directory(dir.path(), &t, &t);

    let out = chain_tool(dir.path(), &["--report-format", "json"]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.trim_start().starts_with('{'));
    assert!(stdout.contains("\"status\": \"clean\""));
}

#[test]
fn bad_head_pointer_exits_with_its_code() {
    let dir = tempfile::tempdir().unwrap();
    write_directory(dir.path(), &[], &[]);
    std::fs::write(dir.path().join(HEAD_POINTER_FILE), [7u8; 33]).unwrap();

    let out = chain_tool(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(15));
    assert!(String::from_utf8_lossy(&out.stderr).contains("head pointer unavailable"));
}

#[test]
fn fatal_error_is_printed_once_at_default_log_level() {
    let dir = tempfile::tempdir().unwrap();
    write_directory(dir.path(), &[], &[]);
    std::fs::write(dir.path().join(HEAD_POINTER_FILE), [7u8; 5]).unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_chain-tool"))
        .arg("--directory")
        .arg(dir.path())
        .env_remove("CHAIN_TOOL_DIR")
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn chain-tool");
    assert_eq!(out.status.code(), Some(15));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("starting verification"), "logging is on: {stderr}");
    assert_eq!(stderr.matches("head pointer unavailable").count(), 1, "{stderr}");
    assert_eq!(stderr.matches("FATAL: [configuration]").count(), 1, "{stderr}");
}

#[test]
fn lane_gap_exits_with_its_code() {
    let dir = tempfile::tempdir().unwrap();
    write_directory(dir.path(), &[], &[]);
    ObjectStoreWriter::<Transaction>::create(
        dir.path().join(lane_data_file("2")),
        dir.path().join(lane_index_file("2")),
    )
    .unwrap()
    .finish()
    .unwrap();

    let out = chain_tool(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(12));
}

#[test]
fn reset_head_rewrites_pointer_only_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = write_directory(dir.path(), &[], &[]);
    let head_path = dir.path().join(HEAD_POINTER_FILE);

    let out = chain_tool(dir.path(), &["--reset-head", &blocks[0].hash.to_hex()]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(std::fs::read(&head_path).unwrap(), blocks[0].hash.as_bytes());

    let out = chain_tool(dir.path(), &["--reset-head", "not-hex"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(std::fs::read(&head_path).unwrap(), blocks[0].hash.as_bytes());
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = chain_tool(dir.path(), &["--no-such-flag"]);
    assert_eq!(out.status.code(), Some(2));
}
