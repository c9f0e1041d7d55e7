//! The logical vector record and its on-disk index entry, per spec.md §3.

use std::convert::TryInto;

use crate::{err_at, Result};

/// 128-bit record identifier. `EMPTY` and `TOMBSTONE` are reserved values;
/// see their associated constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(pub u128);

impl Id {
    /// Marks an unused index slot. The first `EMPTY` entry in the index file
    /// terminates the valid prefix.
    pub const EMPTY: Id = Id(0);

    /// A distinguished, constant identifier marking a logically removed
    /// index entry. Fixed across restarts (spec.md §9: a random
    /// per-process tombstone breaks recovery), chosen to be maximally
    /// unlikely to collide with a `v4` UUID: the UUID variant/version bits
    /// (bits 48-51 and 64-65 of a standard UUID) can never all be set to
    /// this pattern by `uuid::Uuid::new_v4`.
    pub const TOMBSTONE: Id = Id(u128::MAX);

    pub fn generate() -> Id {
        Id(uuid::Uuid::new_v4().as_u128())
    }

    pub fn is_empty(&self) -> bool {
        *self == Id::EMPTY
    }

    pub fn is_tombstone(&self) -> bool {
        *self == Id::TOMBSTONE
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Id {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&bytes[..16]);
        Id(u128::from_le_bytes(buf))
    }
}

impl From<u128> for Id {
    fn from(v: u128) -> Id {
        Id(v)
    }
}

/// Fixed per-record scalar attributes, per spec.md §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Attributes {
    pub priority: i8,
    pub user_id: u32,
    pub org_id: u32,
}

impl<'a> arbitrary::Arbitrary<'a> for Attributes {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Attributes {
            priority: u.arbitrary()?,
            user_id: u.arbitrary()?,
            org_id: u.arbitrary()?,
        })
    }
}

/// A logical vector record. Equality is by identifier; use
/// [Record::values_eq] for structural (element-wise) comparison.
#[derive(Clone, Debug)]
pub struct Record {
    pub id: Id,
    pub values: Vec<f32>,
    pub original_text: String,
    pub tags: Vec<i16>,
    pub attributes: Attributes,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

impl Record {
    pub fn new(values: Vec<f32>) -> Record {
        Record {
            id: Id::generate(),
            values,
            original_text: String::new(),
            tags: Vec::new(),
            attributes: Attributes::default(),
        }
    }

    /// Structural equality over `values`; used only in tests, per spec.md §3.
    pub fn values_eq(&self, other: &Record) -> bool {
        self.values == other.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// 28-byte on-disk tuple, per spec.md §3: `id(16B) || offset(8B LE) ||
/// length(4B LE)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: Id,
    pub offset: u64,
    pub length: u32,
}

pub const INDEX_ENTRY_SIZE: usize = 28;

impl IndexEntry {
    pub const EMPTY: IndexEntry = IndexEntry {
        id: Id::EMPTY,
        offset: 0,
        length: 0,
    };

    pub fn tombstone(offset: u64, length: u32) -> IndexEntry {
        IndexEntry {
            id: Id::TOMBSTONE,
            offset,
            length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    pub fn is_tombstone(&self) -> bool {
        self.id.is_tombstone()
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }

    pub fn to_bytes(&self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        buf[0..16].copy_from_slice(&self.id.to_bytes());
        buf[16..24].copy_from_slice(&self.offset.to_le_bytes());
        buf[24..28].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<IndexEntry> {
        if buf.len() != INDEX_ENTRY_SIZE {
            return err_at!(
                InvalidData,
                msg: "index entry must be {} bytes, got {}", INDEX_ENTRY_SIZE, buf.len()
            );
        }
        let id = Id::from_bytes(&buf[0..16]);
        let offset = u64::from_le_bytes(err_at!(FailConvert, buf[16..24].try_into())?);
        let length = u32::from_le_bytes(err_at!(FailConvert, buf[24..28].try_into())?);
        Ok(IndexEntry { id, offset, length })
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
