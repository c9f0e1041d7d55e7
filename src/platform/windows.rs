use std::{ffi, os::windows::io::AsRawHandle};

use winapi::{shared::minwindef::FALSE, um::fileapi::FlushFileBuffers, um::handleapi::HANDLE};

use crate::{err_at, util, Result};

/// Open a side handle for `path` and invoke `FlushFileBuffers` on it.
pub fn sync_file(path: &ffi::OsStr) -> Result<()> {
    let fd = util::open_file_r(path)?;
    let handle = fd.as_raw_handle() as HANDLE;
    let ok = unsafe { FlushFileBuffers(handle) };
    if ok == FALSE {
        return err_at!(IoError, Err(std::io::Error::last_os_error()));
    }
    Ok(())
}
