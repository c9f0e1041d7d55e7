//! Mapped File Holder (C1): owns one sparse, memory-mapped backing file.
//!
//! Modeled on `robt::IndexFile`'s block/mmap duality, simplified to the one
//! mode this store actually needs: a writable memory map over a sparse file
//! sized to its full logical capacity up front. The view sits behind a
//! `Mutex` rather than requiring `&mut MappedFile`: a reader of the store
//! (C7) holding only its *read* lock must still be able to transparently
//! recreate a view that the memory-pressure monitor released, per spec.md
//! §4.1 and §5.

use memmap2::MmapMut;

use std::{
    convert::TryFrom,
    ffi, fs, path,
    sync::{Mutex, MutexGuard},
};

use crate::{err_at, util, Result};

/// Whether the backing file is a fresh, caller-managed file (kept across
/// restarts) or owned by a temporary holder that deletes it on dispose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Open,
    Temporary,
}

/// A sparse, memory-mapped backing file plus its current view.
pub struct MappedFile {
    path: ffi::OsString,
    file: fs::File,
    capacity: u64,
    temporary: bool,
    view: Mutex<Option<MmapMut>>,
}

impl MappedFile {
    /// Create or open the backing file at `path`, sized to `capacity_bytes`,
    /// and map it. On supporting platforms the file is sparse: logical size
    /// is `capacity_bytes` but disk usage tracks only written blocks.
    pub fn open(path: &ffi::OsStr, capacity_bytes: u64, mode: Mode) -> Result<MappedFile> {
        let mut file = match mode {
            Mode::Create | Mode::Temporary => util::create_file_a(path)?,
            Mode::Open => util::open_file_a(path)?,
        };
        // An existing file may be shorter than the caller-supplied
        // `capacity_bytes` (created under a different `Config`, an
        // interrupted previous run, or on-disk corruption); the mapping
        // must reflect what's actually there, not the caller's guess, so a
        // corruption check — and the store's own recovered capacity — see
        // the real extent. `Store::open` derives capacity from this file's
        // on-disk length rather than growing it; see its own recovery
        // comment.
        let capacity = if mode == Mode::Open {
            err_at!(IoError, file.metadata())?.len()
        } else {
            util::allocate_sparse(&mut file, capacity_bytes)?;
            capacity_bytes
        };

        let view = err_at!(IoError, unsafe { MmapMut::map_mut(&file) })?;

        Ok(MappedFile {
            path: path.to_os_string(),
            file,
            capacity,
            temporary: mode == Mode::Temporary,
            view: Mutex::new(Some(view)),
        })
    }

    pub fn filename(&self) -> &ffi::OsStr {
        &self.path
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn ensure_view<'a>(&self, guard: &'a mut MutexGuard<Option<MmapMut>>) -> Result<()> {
        if guard.is_none() {
            **guard = Some(err_at!(IoError, unsafe { MmapMut::map_mut(&self.file) })?);
        }
        Ok(())
    }

    /// Read `len` bytes at `offset`, recreating the view first if it had
    /// been released.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut guard = self.view.lock().unwrap();
        self.ensure_view(&mut guard)?;
        let start = err_at!(FailConvert, usize::try_from(offset))?;
        Ok(guard.as_ref().unwrap()[start..start + len].to_vec())
    }

    /// Write `data` at `offset`, recreating the view first if it had been
    /// released. Does not flush or sync; the durability manager owns that.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut guard = self.view.lock().unwrap();
        self.ensure_view(&mut guard)?;
        let start = err_at!(FailConvert, usize::try_from(offset))?;
        guard.as_mut().unwrap()[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Flush the view's dirty pages to disk without disposing it.
    pub fn flush_view(&self) -> Result<()> {
        let guard = self.view.lock().unwrap();
        if let Some(view) = guard.as_ref() {
            err_at!(IoError, view.flush())?;
        }
        Ok(())
    }

    /// Dispose the view without deleting the file, letting the OS page the
    /// resident memory out. The next `read_at`/`write_at` call recreates
    /// the mapping transparently.
    pub fn release_view(&self) {
        self.view.lock().unwrap().take();
    }

    /// Recreate the view on the same backing file.
    pub fn reset(&self) -> Result<()> {
        self.release_view();
        let mut guard = self.view.lock().unwrap();
        self.ensure_view(&mut guard)
    }

    /// Release the view; delete the backing file iff this holder was
    /// opened as temporary.
    pub fn dispose(self) -> Result<()> {
        self.release_view();
        if self.temporary {
            err_at!(IoError, fs::remove_file(path::Path::new(&self.path)))?;
        }
        Ok(())
    }

    /// Underlying file descriptor, for side operations (fsync, advisory
    /// locks) that must not go through the mapping.
    pub fn file(&self) -> &fs::File {
        &self.file
    }
}

impl crate::durability::Durable for MappedFile {
    fn flush_view(&mut self) -> Result<()> {
        MappedFile::flush_view(self)
    }

    fn filename(&self) -> ffi::OsString {
        self.path.clone()
    }
}

#[cfg(test)]
#[path = "mmapfile_test.rs"]
mod mmapfile_test;
