//! # Head Pointer
//!
//! `chain.head.db` holds exactly one raw 32-byte digest: the hash of the
//! chain head. No header, no length prefix.
//!
//! Reading is strictly read-only. A file of any other size means there is
//! no usable head, and that is reported as such rather than turned into an
//! empty key. Rewriting the pointer is a separate call that only an
//! explicit operator action reaches.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::digest::{Digest, DIGEST_LEN};

/// Why the head pointer could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum HeadError {
    #[error("head pointer {} i/o error: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("head pointer {} is {size} bytes, expected 32", .path.display())]
    BadSize { path: PathBuf, size: u64 },
}

/// Reads and (on explicit request) rewrites the head pointer file.
pub struct HeadPointer;

impl HeadPointer {
    /// Reads the head digest without modifying the file.
    pub fn read(path: impl AsRef<Path>) -> Result<Digest, HeadError> {
        let path = path.as_ref();
        let io = |source| HeadError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io)?;
        let size = file.metadata().map_err(io)?.len();
        if size != DIGEST_LEN as u64 {
            return Err(HeadError::BadSize {
                path: path.to_path_buf(),
                size,
            });
        }

        let mut buf = [0u8; DIGEST_LEN];
        file.read_exact(&mut buf).map_err(io)?;
        Ok(Digest(buf))
    }

    /// Overwrites the head pointer with `head`, creating the file if needed.
    pub fn write(path: impl AsRef<Path>, head: &Digest) -> Result<(), HeadError> {
        let path = path.as_ref();
        let io = |source| HeadError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(io)?;
        file.write_all(head.as_bytes()).map_err(io)?;
        file.sync_all().map_err(io)?;
        tracing::info!(path = %path.display(), head = %head, "head pointer rewritten");
        Ok(())
    }
}
