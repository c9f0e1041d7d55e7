//! Write-Ahead Log (C3): append-only log of pending mutations, replayable
//! after a crash, per spec.md §4.3.
//!
//! Grounded on `wral::journal::Journal::load`'s stream-of-CBOR-values replay
//! loop (`Cbor::decode` on a file repeatedly, tracking bytes consumed) and
//! on `wral::batch::Batch`'s `#[derive(Cborize)]` framing. Unlike the
//! teacher's rotating, batch-grouped journals, this WAL is a single sibling
//! file of the index file; commit is a truncation to zero length (the
//! alternative spec.md §4.3 explicitly allows), which is simpler to reason
//! about for a single-writer store and avoids a commit-marker format.

use cbordata::{Cbor, Cborize, FromCbor, IntoCbor};
use log::warn;

use std::{
    convert::TryFrom,
    ffi, fs,
    io::{Seek, SeekFrom},
};

use crate::{err_at, record::Id, util, Result};

/// One framed WAL entry. A single shape covers all three logical kinds
/// (Add/Update/Remove); `kind` disambiguates, and unused fields are zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Cborize)]
pub struct WalEntry {
    pub kind: u8,
    pub id: Vec<u8>,
    pub bytes: Vec<u8>,
    pub index_pos: u64,
    pub data_pos: u64,
}

impl WalEntry {
    const ID: u32 = 0x0;

    pub const KIND_ADD: u8 = 0;
    pub const KIND_UPDATE: u8 = 1;
    pub const KIND_REMOVE: u8 = 2;

    pub fn add(id: Id, bytes: Vec<u8>, index_pos: u64, data_pos: u64) -> WalEntry {
        WalEntry {
            kind: Self::KIND_ADD,
            id: id.to_bytes().to_vec(),
            bytes,
            index_pos,
            data_pos,
        }
    }

    pub fn update(id: Id, bytes: Vec<u8>, index_pos: u64, new_data_pos: u64) -> WalEntry {
        WalEntry {
            kind: Self::KIND_UPDATE,
            id: id.to_bytes().to_vec(),
            bytes,
            index_pos,
            data_pos: new_data_pos,
        }
    }

    pub fn remove(id: Id, tombstone_bytes: Vec<u8>, index_pos: u64) -> WalEntry {
        WalEntry {
            kind: Self::KIND_REMOVE,
            id: id.to_bytes().to_vec(),
            bytes: tombstone_bytes,
            index_pos,
            data_pos: 0,
        }
    }

    pub fn id(&self) -> Id {
        Id::from_bytes(&self.id)
    }
}

/// Sibling write-ahead-log of a store's index file.
pub struct Wal {
    path: ffi::OsString,
    file: fs::File,
}

impl Wal {
    /// Create a fresh, empty WAL file at `path`.
    pub fn create(path: &ffi::OsStr) -> Result<Wal> {
        let file = util::create_file_a(path)?;
        Ok(Wal {
            path: path.to_os_string(),
            file,
        })
    }

    /// Open an existing WAL file, creating an empty one if absent.
    pub fn open(path: &ffi::OsStr) -> Result<Wal> {
        let file = if std::path::Path::new(path).exists() {
            util::open_file_a(path)?
        } else {
            util::create_file_a(path)?
        };
        Ok(Wal {
            path: path.to_os_string(),
            file,
        })
    }

    pub fn filename(&self) -> &ffi::OsStr {
        &self.path
    }

    /// Append `entry` to the log and fsync it. The caller must not consider
    /// the mutation durable until the paired index/data write also lands.
    pub fn log(&mut self, entry: &WalEntry) -> Result<()> {
        err_at!(IoError, self.file.seek(SeekFrom::End(0)))?;
        let cbor: Cbor = err_at!(FailConvert, entry.clone().into_cbor())?;
        let mut buf = Vec::new();
        err_at!(FailConvert, cbor.encode(&mut buf))?;
        util::sync_write(&mut self.file, &buf)?;
        Ok(())
    }

    /// Mark all logged entries as applied by truncating the log to zero
    /// length, per spec.md §4.3's "or truncates the WAL to zero length".
    pub fn commit(&mut self) -> Result<()> {
        err_at!(IoError, self.file.set_len(0))?;
        err_at!(IoError, self.file.seek(SeekFrom::Start(0)))?;
        err_at!(IoError, self.file.sync_all())?;
        Ok(())
    }

    /// Ordered list of uncommitted entries, read from the start of the file.
    /// A trailing partial entry (the process died mid-`log`) is dropped and
    /// logged, not treated as corruption: spec.md §7 prefers partial
    /// recovery to aborting startup.
    pub fn read_entries(&mut self) -> Result<Vec<WalEntry>> {
        err_at!(IoError, self.file.seek(SeekFrom::Start(0)))?;
        let len = err_at!(IoError, self.file.metadata())?.len();

        let mut entries = Vec::new();
        let mut fpos: u64 = 0;
        while fpos < len {
            match Cbor::decode(&mut self.file) {
                Ok((val, n)) => match WalEntry::from_cbor(val) {
                    Ok(entry) => {
                        entries.push(entry);
                        fpos += err_at!(FailConvert, u64::try_from(n))?;
                    }
                    Err(err) => {
                        warn!("wal {:?}: skipping malformed entry at {}: {}", self.path, fpos, err);
                        break;
                    }
                },
                Err(err) => {
                    warn!(
                        "wal {:?}: stopping replay at {} (truncated tail?): {}",
                        self.path, fpos, err
                    );
                    break;
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
#[path = "wal_test.rs"]
mod wal_test;
