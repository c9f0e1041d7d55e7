//! Error taxonomy for the store, in the shape required by [crate::err_at].
//!
//! Every variant carries a `(location, message)` pair so that a failure can
//! be traced back to the call-site that raised it without pulling in a
//! backtrace crate. `NotFound` exists for completeness of the taxonomy in
//! spec terms, but is never constructed by this crate's public API — lookups
//! return `None`/`false` instead, per the propagation policy.

use std::{fmt, result, sync::mpsc, sync::PoisonError};

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Identifier absent. Kept in the taxonomy for documentation purposes;
    /// public lookups surface this as `None`/`false`, never as `Err`.
    NotFound(String, String),
    /// Index file has no EMPTY slot left, or data file cannot accommodate a
    /// new or grown record.
    InsufficientCapacity(String, String),
    /// Decoded bytes violate the record codec.
    InvalidData(String, String),
    /// Index/data invariants violated on open; recoverable via `attempt_repair`.
    Corrupt(String, String),
    /// File I/O failure from the OS.
    IoError(String, String),
    /// Cancellation token fired before or between atomic steps.
    Cancelled(String, String),
    /// Operation forbidden by contract (e.g. positional insert on the facade).
    Unsupported(String, String),
    /// `copy_to` (or similar bounded-buffer access) given a range past `count`.
    OutOfBounds(String, String),
    /// Internal invariant violated; always a bug, never routine.
    Fatal(String, String),
    /// Inter-thread channel send/receive failed.
    IpcFail(String, String),
    /// A worker thread panicked or failed to join cleanly.
    ThreadFail(String, String),
    /// A numeric/type conversion failed (e.g. `usize::try_from`).
    FailConvert(String, String),
}

impl Error {
    fn parts(&self) -> (&'static str, &str, &str) {
        match self {
            Error::NotFound(l, m) => ("NotFound", l, m),
            Error::InsufficientCapacity(l, m) => ("InsufficientCapacity", l, m),
            Error::InvalidData(l, m) => ("InvalidData", l, m),
            Error::Corrupt(l, m) => ("Corrupt", l, m),
            Error::IoError(l, m) => ("IoError", l, m),
            Error::Cancelled(l, m) => ("Cancelled", l, m),
            Error::Unsupported(l, m) => ("Unsupported", l, m),
            Error::OutOfBounds(l, m) => ("OutOfBounds", l, m),
            Error::Fatal(l, m) => ("Fatal", l, m),
            Error::IpcFail(l, m) => ("IpcFail", l, m),
            Error::ThreadFail(l, m) => ("ThreadFail", l, m),
            Error::FailConvert(l, m) => ("FailConvert", l, m),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (kind, loc, msg) = self.parts();
        write!(f, "{} {} {}", kind, loc, msg)
    }
}

impl std::error::Error for Error {}

impl<T> From<mpsc::SendError<T>> for Error {
    fn from(err: mpsc::SendError<T>) -> Error {
        Error::IpcFail("mpsc::SendError".to_string(), err.to_string())
    }
}

impl From<mpsc::RecvError> for Error {
    fn from(err: mpsc::RecvError) -> Error {
        Error::IpcFail("mpsc::RecvError".to_string(), err.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Error {
        Error::Fatal("lock poisoned".to_string(), err.to_string())
    }
}

/// Wrap a fallible expression (or format a message) into a located [Error].
///
/// ```ignore
/// err_at!(IoError, fs::metadata(path))?;
/// err_at!(Fatal, msg: "unexpected state {}", n)?;
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::Error::$v(prefix, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(prefix, format!("{}", err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(prefix, format!("{}: {}", format!($($arg),+), err)))
            }
        }
    }};
}
