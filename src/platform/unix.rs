use std::{ffi, os::unix::io::AsRawFd};

use crate::{err_at, util, Result};

/// Open a side file descriptor for `path` and `fsync` it.
pub fn sync_file(path: &ffi::OsStr) -> Result<()> {
    let fd = util::open_file_r(path)?;
    let rc = unsafe { libc::fsync(fd.as_raw_fd()) };
    if rc != 0 {
        return err_at!(IoError, Err(std::io::Error::last_os_error()));
    }
    Ok(())
}
