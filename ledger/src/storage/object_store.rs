//! # Object Stores
//!
//! Both the block store and every lane store are content-addressed
//! key-value stores: a 32-byte [`Digest`] maps to one bincode-encoded record.
//! The checker only needs three things from a store: open it without
//! touching it, get a record by key, and ask how many records it claims to
//! hold. That is the whole [`ObjectStore`] trait.
//!
//! ## File Layout
//!
//! A store is a pair of files:
//!
//! | File   | Contents                                                  |
//! |--------|-----------------------------------------------------------|
//! | index  | `b"LOBJIDX1"`, then entries of key (32B), offset (u64 LE), len (u32 LE) |
//! | data   | record payloads at the offsets named by the index         |
//!
//! The index is loaded into memory when the store is opened; payloads are
//! read on demand. A later index entry for the same key shadows an earlier
//! one, so [`ObjectStore::size`] counts distinct keys.
//!
//! A malformed index fails the open. An entry pointing past the end of the
//! data file only fails the `get` for that key: the rest of the store is
//! still usable, and the caller decides what one bad record means.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::digest::{Digest, DIGEST_LEN};

/// Magic prefix of every index file.
pub const INDEX_MAGIC: &[u8; 8] = b"LOBJIDX1";

/// Serialized size of one index entry.
const INDEX_ENTRY_LEN: usize = DIGEST_LEN + 8 + 4;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by object stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt index {}: {reason}", .path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("record {key} out of bounds: offset {offset} + len {len} exceeds data size {data_len}")]
    OutOfBounds {
        key: Digest,
        offset: u64,
        len: u32,
        data_len: u64,
    },

    #[error("cannot decode record {key}: {reason}")]
    Decode { key: Digest, reason: String },

    #[error("cannot encode record {key}: {reason}")]
    Encode { key: Digest, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// ObjectStore trait
// ---------------------------------------------------------------------------

/// Read-only view of a content-addressed store of `T`.
///
/// `get` distinguishes "no such key" (`Ok(None)`) from "the key exists but
/// the record cannot be produced" (`Err`).
pub trait ObjectStore<T> {
    /// Fetches the record stored under `key`.
    fn get(&self, key: &Digest) -> StoreResult<Option<T>>;

    /// Number of records the store claims to hold.
    fn size(&self) -> u64;
}

impl<T, S: ObjectStore<T> + ?Sized> ObjectStore<T> for &S {
    fn get(&self, key: &Digest) -> StoreResult<Option<T>> {
        (**self).get(key)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

// ---------------------------------------------------------------------------
// FileObjectStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u64,
    len: u32,
}

/// File-backed store, opened strictly read-only.
///
/// Safe to share across threads: payloads are fetched with positional reads
/// on one shared handle, so concurrent lookups never wait on each other.
pub struct FileObjectStore<T> {
    data_path: PathBuf,
    data: File,
    data_len: u64,
    index: HashMap<Digest, IndexEntry>,
    _record: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for FileObjectStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileObjectStore")
            .field("data_path", &self.data_path)
            .field("records", &self.index.len())
            .finish()
    }
}

impl<T> FileObjectStore<T> {
    /// Opens a store from its data and index files without modifying either.
    pub fn open(data_path: impl AsRef<Path>, index_path: impl AsRef<Path>) -> StoreResult<Self> {
        let data_path = data_path.as_ref();
        let index_path = index_path.as_ref();

        let data = File::open(data_path).map_err(io_error(data_path))?;
        let data_len = data.metadata().map_err(io_error(data_path))?.len();

        let mut raw = Vec::new();
        File::open(index_path)
            .and_then(|mut f| f.read_to_end(&mut raw))
            .map_err(io_error(index_path))?;
        let index = parse_index(index_path, &raw)?;

        tracing::debug!(
            data = %data_path.display(),
            records = index.len(),
            data_len,
            "object store opened"
        );

        Ok(Self {
            data_path: data_path.to_path_buf(),
            data,
            data_len,
            index,
            _record: PhantomData,
        })
    }

    /// Path of the data file, for diagnostics.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn read_payload(&self, key: &Digest, entry: IndexEntry) -> StoreResult<Vec<u8>> {
        let end = entry.offset.checked_add(u64::from(entry.len));
        if end.map_or(true, |end| end > self.data_len) {
            return Err(StoreError::OutOfBounds {
                key: *key,
                offset: entry.offset,
                len: entry.len,
                data_len: self.data_len,
            });
        }

        let mut buf = vec![0u8; entry.len as usize];
        read_exact_at(&self.data, &mut buf, entry.offset).map_err(io_error(&self.data_path))?;
        Ok(buf)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut total = 0usize;
    while total < buf.len() {
        let n = file.seek_read(&mut buf[total..], offset + total as u64)?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        total += n;
    }
    Ok(())
}

impl<T: DeserializeOwned> ObjectStore<T> for FileObjectStore<T> {
    fn get(&self, key: &Digest) -> StoreResult<Option<T>> {
        let Some(entry) = self.index.get(key).copied() else {
            return Ok(None);
        };
        let bytes = self.read_payload(key, entry)?;
        let record = bincode::deserialize(&bytes).map_err(|e| StoreError::Decode {
            key: *key,
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }

    fn size(&self) -> u64 {
        self.index.len() as u64
    }
}

fn parse_index(path: &Path, raw: &[u8]) -> StoreResult<HashMap<Digest, IndexEntry>> {
    let corrupt = |reason: String| StoreError::CorruptIndex {
        path: path.to_path_buf(),
        reason,
    };

    // A store that was created but never written to.
    if raw.is_empty() {
        return Ok(HashMap::new());
    }

    let body = raw
        .strip_prefix(INDEX_MAGIC.as_slice())
        .ok_or_else(|| corrupt("bad magic".to_string()))?;

    if body.len() % INDEX_ENTRY_LEN != 0 {
        return Err(corrupt(format!(
            "trailing {} bytes after last complete entry",
            body.len() % INDEX_ENTRY_LEN
        )));
    }

    let mut index = HashMap::with_capacity(body.len() / INDEX_ENTRY_LEN);
    for chunk in body.chunks_exact(INDEX_ENTRY_LEN) {
        let (key, rest) = chunk.split_at(DIGEST_LEN);
        let (offset, len) = rest.split_at(8);
        let key = Digest::from_slice(key).ok_or_else(|| corrupt("short key".to_string()))?;
        let offset = u64::from_le_bytes(
            offset
                .try_into()
                .map_err(|_| corrupt("short offset".to_string()))?,
        );
        let len = u32::from_le_bytes(
            len.try_into()
                .map_err(|_| corrupt("short length".to_string()))?,
        );
        index.insert(key, IndexEntry { offset, len });
    }
    Ok(index)
}

// ---------------------------------------------------------------------------
// ObjectStoreWriter
// ---------------------------------------------------------------------------

/// Builds a store on disk in the format [`FileObjectStore`] reads.
///
/// The checker itself never writes stores; this is how stores are produced
/// for it (fixtures, tooling, benchmarks).
pub struct ObjectStoreWriter<T> {
    data_path: PathBuf,
    index_path: PathBuf,
    data: BufWriter<File>,
    index: BufWriter<File>,
    offset: u64,
    _record: PhantomData<fn(&T)>,
}

impl<T: Serialize> ObjectStoreWriter<T> {
    /// Creates (or truncates) the data and index files.
    pub fn create(data_path: impl AsRef<Path>, index_path: impl AsRef<Path>) -> StoreResult<Self> {
        let data_path = data_path.as_ref().to_path_buf();
        let index_path = index_path.as_ref().to_path_buf();

        let data = File::create(&data_path).map_err(io_error(&data_path))?;
        let mut index = BufWriter::new(File::create(&index_path).map_err(io_error(&index_path))?);
        index.write_all(INDEX_MAGIC).map_err(io_error(&index_path))?;

        Ok(Self {
            data: BufWriter::new(data),
            index,
            data_path,
            index_path,
            offset: 0,
            _record: PhantomData,
        })
    }

    /// Appends `value` under `key`.
    pub fn put(&mut self, key: &Digest, value: &T) -> StoreResult<()> {
        let bytes = bincode::serialize(value).map_err(|e| StoreError::Encode {
            key: *key,
            reason: e.to_string(),
        })?;
        self.put_raw(key, &bytes)
    }

    /// Appends pre-encoded bytes under `key`, whatever they contain.
    pub fn put_raw(&mut self, key: &Digest, bytes: &[u8]) -> StoreResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| StoreError::Encode {
            key: *key,
            reason: format!("record of {} bytes exceeds u32 length field", bytes.len()),
        })?;
        self.data.write_all(bytes).map_err(io_error(&self.data_path))?;
        self.write_index_entry(key, self.offset, len)?;
        self.offset += u64::from(len);
        Ok(())
    }

    /// Writes an index entry without a payload. Lets callers describe
    /// records that point outside the data file.
    pub fn put_dangling(&mut self, key: &Digest, offset: u64, len: u32) -> StoreResult<()> {
        self.write_index_entry(key, offset, len)
    }

    fn write_index_entry(&mut self, key: &Digest, offset: u64, len: u32) -> StoreResult<()> {
        let mut entry = [0u8; INDEX_ENTRY_LEN];
        entry[..DIGEST_LEN].copy_from_slice(key.as_bytes());
        entry[DIGEST_LEN..DIGEST_LEN + 8].copy_from_slice(&offset.to_le_bytes());
        entry[DIGEST_LEN + 8..].copy_from_slice(&len.to_le_bytes());
        self.index
            .write_all(&entry)
            .map_err(io_error(&self.index_path))
    }

    /// Flushes both files to disk.
    pub fn finish(mut self) -> StoreResult<()> {
        self.data.flush().map_err(io_error(&self.data_path))?;
        self.index.flush().map_err(io_error(&self.index_path))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryObjectStore
// ---------------------------------------------------------------------------

/// `HashMap`-backed store for tests and benchmarks.
#[derive(Debug, Clone)]
pub struct InMemoryObjectStore<T> {
    records: HashMap<Digest, T>,
}

impl<T> Default for InMemoryObjectStore<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<T> InMemoryObjectStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous record.
    pub fn insert(&mut self, key: Digest, value: T) {
        self.records.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<T: Clone> ObjectStore<T> for InMemoryObjectStore<T> {
    fn get(&self, key: &Digest) -> StoreResult<Option<T>> {
        Ok(self.records.get(key).cloned())
    }

    fn size(&self) -> u64 {
        self.records.len() as u64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
