// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Ledger FSCK — Offline Storage Consistency Checker
//!
//! Verifies a node's on-disk ledger without a running node: walks the block
//! chain backwards from the persisted head to genesis, then checks that
//! every transaction the chain references can be found in the sharded
//! transaction stores. Nothing is ever written during a check.
//!
//! ## Architecture
//!
//! - **config** — File-name conventions and the knobs of a run.
//! - **storage** — Digests, block and transaction records, read-only object
//!   stores, the head pointer, and the reconstructed chain.
//! - **lanes** — Discovery of the transaction shards ("lanes") and routing
//!   of digests to them.
//! - **verify** — The chain walker, the transaction cross-checker, the
//!   diagnostics they emit, and the final report.
//!
//! ## Outcome
//!
//! A run ends in exactly one of three ways:
//!
//! 1. A [`verify::FatalError`]: the directory or the chain is unusable and
//!    nothing gathered so far can be trusted. Each kind has its own exit code.
//! 2. A degraded [`verify::Report`]: inconsistencies were found and recorded.
//! 3. A clean report.

pub mod config;
pub mod lanes;
pub mod storage;
pub mod verify;

pub use config::CheckConfig;
pub use verify::{verify, FatalError, Report, Verifier};
