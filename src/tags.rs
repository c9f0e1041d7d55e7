//! Tag Index (C8): bidirectional map `tag_id → set of record ids` and
//! `id → tags`, maintained separately from the primary index, per
//! spec.md §4.8.
//!
//! Grounded on the WAL's (C3) `#[derive(Cborize)]` framing
//! ([crate::wal::WalEntry]) for `to_binary`/`from_binary`: the tag index is
//! persisted as one CBOR-encoded value inside the save/load stream (§6),
//! the same mechanism the WAL uses to frame a single structured value.

use cbordata::{Cbor, Cborize, FromCbor, IntoCbor};

use std::collections::{BTreeMap, BTreeSet};

use crate::{err_at, record::Id, Result};

/// Maximum number of distinct tag names a single index may hold, per
/// spec.md §4.8: tag ids are signed 16-bit, so `2^15 - 1` is the largest
/// id a name table can hand out.
pub const MAX_TAG_NAMES: usize = (1 << 15) - 1;

/// On-the-wire shape of a [TagIndex]: flat vectors instead of maps, since
/// `cbordata::Cborize` needs types it knows how to frame.
#[derive(Debug, Clone, Default, Cborize)]
struct TagIndexWire {
    names: Vec<(i16, String)>,
    memberships: Vec<(i16, Vec<u8>)>,
}

impl TagIndexWire {
    const ID: u32 = 0x1;
}

/// Bidirectional `tag_id ↔ record id` map plus the `tag_id ↔ name` table.
/// Distinct tags never share a record id list by construction — each
/// membership set is independently maintained.
#[derive(Debug, Default)]
pub struct TagIndex {
    names: BTreeMap<i16, String>,
    name_to_id: BTreeMap<String, i16>,
    by_tag: BTreeMap<i16, BTreeSet<Id>>,
    by_id: BTreeMap<Id, Vec<i16>>,
    next_id: i16,
}

impl TagIndex {
    pub fn new() -> TagIndex {
        TagIndex::default()
    }

    /// Rebuild `by_tag`/`by_id` from scratch by scanning `records`. The
    /// name table (`names`/`name_to_id`) is left untouched: tag names are
    /// assigned independently of any particular store generation.
    pub fn build_map<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a crate::record::Record>,
    {
        self.by_tag.clear();
        self.by_id.clear();
        for record in records {
            self.by_id.insert(record.id, record.tags.clone());
            for &tag in &record.tags {
                self.by_tag.entry(tag).or_default().insert(record.id);
            }
        }
    }

    /// Register (or look up) a tag name, case-folded to lower and trimmed.
    /// Returns its `tag_id`, minting a fresh one if the name is new.
    pub fn add_tag_name(&mut self, name: &str) -> Result<i16> {
        let key = normalize(name);
        if let Some(&id) = self.name_to_id.get(&key) {
            return Ok(id);
        }
        if self.names.len() >= MAX_TAG_NAMES {
            return err_at!(
                InsufficientCapacity,
                msg: "tag index full at {} names", MAX_TAG_NAMES
            );
        }
        let id = self.next_id;
        self.next_id += 1;
        self.names.insert(id, key.clone());
        self.name_to_id.insert(key, id);
        Ok(id)
    }

    /// Look up an existing tag's id by name, without minting a new one.
    pub fn get_tag_id(&self, name: &str) -> Option<i16> {
        self.name_to_id.get(&normalize(name)).copied()
    }

    pub fn tag_name(&self, tag_id: i16) -> Option<&str> {
        self.names.get(&tag_id).map(String::as_str)
    }

    /// Drop a tag name and its membership set entirely.
    pub fn remove_tag(&mut self, tag_id: i16) {
        if let Some(name) = self.names.remove(&tag_id) {
            self.name_to_id.remove(&name);
        }
        if let Some(ids) = self.by_tag.remove(&tag_id) {
            for id in ids {
                if let Some(tags) = self.by_id.get_mut(&id) {
                    tags.retain(|&t| t != tag_id);
                }
            }
        }
    }

    pub fn get_ids_by_tag(&self, tag_id: i16) -> BTreeSet<Id> {
        self.by_tag.get(&tag_id).cloned().unwrap_or_default()
    }

    /// Intersection of every tag's membership set. Empty input yields an
    /// empty set, not "all records".
    pub fn get_ids_by_all_tags(&self, tag_ids: &[i16]) -> BTreeSet<Id> {
        let mut iter = tag_ids.iter();
        let first = match iter.next() {
            Some(&t) => self.get_ids_by_tag(t),
            None => return BTreeSet::new(),
        };
        iter.fold(first, |acc, &t| {
            let other = self.get_ids_by_tag(t);
            acc.intersection(&other).copied().collect()
        })
    }

    pub fn get_ids_by_any_tag(&self, tag_ids: &[i16]) -> BTreeSet<Id> {
        let mut out = BTreeSet::new();
        for &t in tag_ids {
            out.extend(self.get_ids_by_tag(t));
        }
        out
    }

    pub fn tags_for(&self, id: Id) -> Vec<i16> {
        self.by_id.get(&id).cloned().unwrap_or_default()
    }

    /// Frame the whole index (name table + membership sets) as one CBOR
    /// value, for embedding in the save stream's tag-index section (§6).
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let wire = TagIndexWire {
            names: self.names.iter().map(|(&id, name)| (id, name.clone())).collect(),
            memberships: self
                .by_tag
                .iter()
                .map(|(&tag, ids)| {
                    let mut bytes = Vec::with_capacity(ids.len() * 16);
                    for id in ids {
                        bytes.extend_from_slice(&id.to_bytes());
                    }
                    (tag, bytes)
                })
                .collect(),
        };
        let cbor: Cbor = err_at!(FailConvert, wire.into_cbor())?;
        let mut buf = Vec::new();
        err_at!(FailConvert, cbor.encode(&mut buf))?;
        Ok(buf)
    }

    /// Reconstruct a `TagIndex` from a `to_binary` block. `by_id` is
    /// derived from the decoded `by_tag` memberships, not stored directly,
    /// so a corrupt or truncated membership list can't desynchronize the
    /// two maps.
    pub fn from_binary(bytes: &[u8]) -> Result<TagIndex> {
        let (cbor, _) = err_at!(InvalidData, Cbor::decode(&mut std::io::Cursor::new(bytes)))?;
        let wire: TagIndexWire = err_at!(InvalidData, TagIndexWire::from_cbor(cbor))?;

        let mut index = TagIndex::default();
        for (id, name) in wire.names {
            index.names.insert(id, name.clone());
            index.name_to_id.insert(name, id);
            index.next_id = index.next_id.max(id.saturating_add(1));
        }
        for (tag, bytes) in wire.memberships {
            if bytes.len() % 16 != 0 {
                return err_at!(
                    InvalidData,
                    msg: "tag index membership blob for tag {} not a multiple of 16 bytes", tag
                );
            }
            let mut set = BTreeSet::new();
            for chunk in bytes.chunks_exact(16) {
                let id = Id::from_bytes(chunk);
                set.insert(id);
                index.by_id.entry(id).or_default().push(tag);
            }
            index.by_tag.insert(tag, set);
        }
        Ok(index)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
#[path = "tags_test.rs"]
mod tags_test;
