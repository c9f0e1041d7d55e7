//! Corruption Detector (C4): validates and truncates index/data files to
//! the last internally consistent record, per spec.md §4.4.

use log::{info, warn};

use crate::record::{IndexEntry, INDEX_ENTRY_SIZE};
use crate::Result;

/// Result of scanning the index file's valid prefix.
pub struct IndexValidation {
    /// Entries read before the first `EMPTY` entry (or end of file).
    pub valid_entries: Vec<IndexEntry>,
    /// Byte offset just past the valid prefix.
    pub valid_prefix_bytes: u64,
}

/// Read index entries from the beginning; the first `EMPTY` entry
/// terminates the valid prefix. `valid_entries.len() ≤ expected_count` must
/// hold for the index to be considered consistent with a cached count.
pub fn validate_index(index_bytes: &[u8], expected_count: usize) -> Result<IndexValidation> {
    let mut valid_entries = Vec::new();
    let mut pos = 0usize;

    while pos + INDEX_ENTRY_SIZE <= index_bytes.len() {
        let entry = IndexEntry::from_bytes(&index_bytes[pos..pos + INDEX_ENTRY_SIZE])?;
        if entry.is_empty() {
            break;
        }
        valid_entries.push(entry);
        pos += INDEX_ENTRY_SIZE;
    }

    let live = valid_entries.iter().filter(|e| !e.is_tombstone()).count();
    if live > expected_count {
        warn!(
            "corruption: valid prefix has {} live entries, expected at most {}",
            live, expected_count
        );
    }

    Ok(IndexValidation {
        valid_entries,
        valid_prefix_bytes: pos as u64,
    })
}

/// Check the data file is at least as long as the maximum `offset + length`
/// implied by the index's valid prefix.
pub fn validate_data(valid_entries: &[IndexEntry], data_file_len: u64) -> bool {
    valid_entries.iter().all(|e| e.end() <= data_file_len)
}

/// Repair result: the largest prefixes of each file that are still mutually
/// consistent.
pub struct RepairResult {
    pub valid_entries: Vec<IndexEntry>,
    pub index_prefix_bytes: u64,
    pub data_prefix_bytes: u64,
}

/// Find the last position at which the index is internally consistent (no
/// entry references a region outside `data_file_len`) and compute the
/// truncation points for both files. The store recomputes `count` from the
/// returned `valid_entries` after repair.
pub fn attempt_repair(index_bytes: &[u8], data_file_len: u64) -> Result<RepairResult> {
    let mut valid_entries = Vec::new();
    let mut pos = 0usize;
    let mut data_prefix_bytes = 0u64;

    while pos + INDEX_ENTRY_SIZE <= index_bytes.len() {
        let entry = match IndexEntry::from_bytes(&index_bytes[pos..pos + INDEX_ENTRY_SIZE]) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("corruption: unreadable index entry at byte {}: {}", pos, err);
                break;
            }
        };
        if entry.is_empty() {
            break;
        }
        if entry.end() > data_file_len {
            warn!(
                "corruption: entry {:?} references region beyond data file ({} > {})",
                entry.id, entry.end(), data_file_len
            );
            break;
        }
        data_prefix_bytes = data_prefix_bytes.max(entry.end());
        valid_entries.push(entry);
        pos += INDEX_ENTRY_SIZE;
    }

    info!(
        "corruption: repaired to {} valid entries, index_prefix={}B, data_prefix={}B",
        valid_entries.len(),
        pos,
        data_prefix_bytes
    );

    Ok(RepairResult {
        valid_entries,
        index_prefix_bytes: pos as u64,
        data_prefix_bytes,
    })
}

#[cfg(test)]
#[path = "corruption_test.rs"]
mod corruption_test;
