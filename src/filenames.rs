//! File naming for a store's on-disk family: `{title}_{purpose}.nbrly` plus
//! the WAL's `.wal` sibling of the index file.
//!
//! Modeled on `robt::files::{IndexFileName, VlogFileName}`: a thin wrapper
//! around an `OsString` with a `From<String>`/`TryFrom<Self>` round trip and
//! a `Display` impl, generalized from two hard-coded purposes to the three
//! named in spec.md §6.

use std::{convert::TryFrom, ffi, fmt, path, result};

use crate::{err_at, Error, Result};

/// The three file purposes a title can resolve to. `Text` is reserved for a
/// future external text-search companion file; this crate never populates
/// it, but the naming contract must be stable for collaborators that do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Purpose {
    Index,
    Data,
    Text,
}

impl Purpose {
    fn as_str(&self) -> &'static str {
        match self {
            Purpose::Index => "index",
            Purpose::Data => "data",
            Purpose::Text => "text",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One member of a store's on-disk file family: `{title}_{purpose}.nbrly`.
#[derive(Clone)]
pub struct StoreFileName(pub ffi::OsString);

impl StoreFileName {
    pub fn new(title: &str, purpose: Purpose) -> StoreFileName {
        let file_name = format!("{}_{}.nbrly", sanitize_title(title), purpose);
        StoreFileName(AsRef::<ffi::OsStr>::as_ref(&file_name).to_os_string())
    }
}

impl From<StoreFileName> for ffi::OsString {
    fn from(name: StoreFileName) -> ffi::OsString {
        name.0
    }
}

impl TryFrom<StoreFileName> for (String, Purpose) {
    type Error = Error;

    fn try_from(fname: StoreFileName) -> Result<(String, Purpose)> {
        let ffpp = path::Path::new(&fname.0);
        let stem = || -> Option<&str> {
            let fname = ffpp.file_name()?.to_str()?;
            let stem = fname.strip_suffix(".nbrly")?;
            Some(stem)
        }();

        let stem = match stem {
            Some(stem) => stem,
            None => return err_at!(InvalidData, msg: "not a .nbrly file: {:?}", ffpp),
        };

        for (suffix, purpose) in [
            ("_index", Purpose::Index),
            ("_data", Purpose::Data),
            ("_text", Purpose::Text),
        ] {
            if let Some(title) = stem.strip_suffix(suffix) {
                return Ok((title.to_string(), purpose));
            }
        }
        err_at!(InvalidData, msg: "unrecognized purpose suffix: {:?}", ffpp)
    }
}

impl fmt::Display for StoreFileName {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self.0.to_str() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// Sibling WAL file name of an index file: `{title}_index.nbrly.wal`.
pub struct WalFileName(pub ffi::OsString);

impl WalFileName {
    pub fn new(title: &str) -> WalFileName {
        let index_name = StoreFileName::new(title, Purpose::Index);
        let file_name = format!("{}.wal", index_name);
        WalFileName(AsRef::<ffi::OsStr>::as_ref(&file_name).to_os_string())
    }
}

impl From<WalFileName> for ffi::OsString {
    fn from(name: WalFileName) -> ffi::OsString {
        name.0
    }
}

impl fmt::Display for WalFileName {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self.0.to_str() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// Strip non-alphanumerics from a user-supplied title, per spec.md §6.
/// An empty result falls back to a UTC timestamp `yyyyMMddHHmmss`.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title.chars().filter(|c| c.is_alphanumeric()).collect();
    if cleaned.is_empty() {
        chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
#[path = "filenames_test.rs"]
mod filenames_test;
