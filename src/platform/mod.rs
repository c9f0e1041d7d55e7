//! Platform-specific durability primitives for the durability manager (C2),
//! per spec.md §4.2: POSIX `fsync` vs. Windows `FlushFileBuffers`, each
//! invoked on a side file descriptor so the caller's own handle/cursor is
//! left untouched.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::sync_file;
#[cfg(windows)]
pub use windows::sync_file;
