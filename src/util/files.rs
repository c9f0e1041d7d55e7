//! File helpers shared by the mapped-file holder, the WAL, and the
//! durability manager. The `read_file!`/`write_file!` macros and the
//! `create_file_*`/`open_file_*` helpers mirror the teacher's
//! `util::files` module; `allocate_sparse` is new, needed for §6's
//! sparse-file allocation contract.

use serde::de::DeserializeOwned;

use std::{ffi, fs, io::Seek, path};

use crate::{err_at, Result};

#[macro_export]
macro_rules! read_file {
    ($fd:expr, $seek:expr, $n:expr, $msg:expr) => {{
        use std::{convert::TryFrom, io::Read};

        match $fd.seek($seek) {
            Ok(_) => {
                let mut buf = vec![0; usize::try_from($n).unwrap()];
                match $fd.read_exact(&mut buf) {
                    Ok(()) => Ok(buf),
                    Err(err) => $crate::err_at!(IoError, Err(err), $msg),
                }
            }
            Err(err) => $crate::err_at!(IoError, Err(err), $msg),
        }
    }};
}

#[macro_export]
macro_rules! write_file {
    ($fd:expr, $buffer:expr, $file:expr, $msg:expr) => {{
        use std::io::Write;

        match $crate::err_at!(IoError, $fd.write($buffer))? {
            n if $buffer.len() == n => Ok(n),
            n => $crate::err_at!(
                Fatal, msg: "partial-wr {}, {:?}, {}/{}", $msg, $file, $buffer.len(), n
            ),
        }
    }};
}

/// Create a fresh file, truncating any existing file at `path`, and create
/// parent directories as needed.
pub fn create_file_a(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = path::Path::new(file);
    if let Some(parent) = os_file.parent() {
        err_at!(IoError, fs::create_dir_all(parent))?;
    }
    fs::remove_file(os_file).ok();

    let mut opts = fs::OpenOptions::new();
    err_at!(
        IoError,
        opts.read(true).write(true).create_new(true).open(os_file)
    )
}

/// Open an existing file for read-write random access.
pub fn open_file_a(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = path::Path::new(file);
    let mut opts = fs::OpenOptions::new();
    err_at!(IoError, opts.read(true).write(true).open(os_file))
}

/// Open a file strictly for reading.
pub fn open_file_r(file: &ffi::OsStr) -> Result<fs::File> {
    let os_file = path::Path::new(file);
    err_at!(IoError, fs::OpenOptions::new().read(true).open(os_file))
}

/// Write `data` and sync it to disk before returning. Used by the WAL's
/// `log` path, where every appended entry must be durable before the
/// caller considers the mutation logged.
pub fn sync_write(file: &mut fs::File, data: &[u8]) -> Result<usize> {
    use std::io::Write;

    let n = err_at!(IoError, file.write(data))?;
    if n != data.len() {
        return err_at!(IoError, msg: "partial write to file {} {}", n, data.len());
    }
    err_at!(IoError, file.sync_all())?;
    Ok(n)
}

/// Create `file` sized to `capacity_bytes`, marking it sparse where the
/// platform supports it. On platforms without sparse-file support the file
/// is ordinary and the OS pages in zero-filled blocks on demand; either way
/// `file.set_len` is the portable way to express "logical size up front,
/// physical blocks on write" that both Windows and POSIX honor for a freshly
/// created file.
pub fn allocate_sparse(file: &mut fs::File, capacity_bytes: u64) -> Result<()> {
    err_at!(IoError, file.set_len(capacity_bytes))?;
    err_at!(IoError, file.seek(std::io::SeekFrom::Start(0)))?;
    Ok(())
}

/// Load a toml file and parse it into `T`. Used by [crate::config::Config]'s
/// file-based constructor.
pub fn load_toml<P, T>(loc: P) -> Result<T>
where
    P: AsRef<path::Path>,
    T: DeserializeOwned,
{
    use std::str::from_utf8;

    let ploc: &path::Path = loc.as_ref();
    let data = err_at!(IoError, fs::read(ploc))?;
    let s = err_at!(FailConvert, from_utf8(&data), "not utf8 for {:?}", ploc)?;
    err_at!(FailConvert, toml::from_str(s), "file:{:?}", ploc)
}

#[cfg(test)]
#[path = "files_test.rs"]
mod files_test;
