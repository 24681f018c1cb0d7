//! # Storage Module
//!
//! Read-side model of the ledger's on-disk state. Nothing here mutates a
//! store; the only writers are [`ObjectStoreWriter`] (which produces stores
//! for the checker to read) and [`HeadPointer::write`], which only an
//! explicit operator action reaches.
//!
//! ## Architecture
//!
//! ```text
//! digest.rs       — Digest newtype, GENESIS_DIGEST sentinel
//! block.rs        — BlockRecord, Slice, TransactionLayout
//! transaction.rs  — Transaction records held by lane stores
//! object_store.rs — ObjectStore trait, file-backed and in-memory stores
//! chain.rs        — Chain reconstructed by the backward walk
//! head.rs         — chain.head.db pointer
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! chain.head.db ──► head digest ──► chain.db / chain.index.db ──► Chain
//!                                                                  │
//! node_storage_lane<N>_transaction(.index).db ◄── tx digests ──────┘
//! ```

pub mod block;
pub mod chain;
pub mod digest;
pub mod head;
pub mod object_store;
pub mod transaction;

pub use block::{BlockRecord, Slice, TransactionLayout};
pub use chain::Chain;
pub use digest::{Digest, DIGEST_LEN, GENESIS_DIGEST};
pub use head::{HeadError, HeadPointer};
pub use object_store::{
    FileObjectStore, InMemoryObjectStore, ObjectStore, ObjectStoreWriter, StoreError, StoreResult,
};
pub use transaction::Transaction;

/// Block store as found on disk.
pub type BlockStore = FileObjectStore<BlockRecord>;

/// One lane's transaction store as found on disk.
pub type LaneStore = FileObjectStore<Transaction>;
