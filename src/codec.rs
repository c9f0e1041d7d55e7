//! Vector Record Codec (C6): fixed, self-describing binary layout for a
//! [Record] blob, per spec.md §4.6. Little-endian throughout.
//!
//! ```text
//! id (16B)
//! || text_len_u32 || text_bytes
//! || values_len_u32 || values (f32 LE each)
//! || tags_len_u16 || tags (i16 LE each)
//! || priority_i8 || user_id_u32 || org_id_u32
//! ```

use std::convert::TryInto;

use crate::{err_at, record::Attributes, record::Id, record::Record, Result};

pub fn encode(record: &Record) -> Vec<u8> {
    let text_bytes = record.original_text.as_bytes();
    let mut buf = Vec::with_capacity(estimate_len(record));

    buf.extend_from_slice(&record.id.to_bytes());

    buf.extend_from_slice(&(text_bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(text_bytes);

    buf.extend_from_slice(&(record.values.len() as u32).to_le_bytes());
    for v in &record.values {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    buf.extend_from_slice(&(record.tags.len() as u16).to_le_bytes());
    for t in &record.tags {
        buf.extend_from_slice(&t.to_le_bytes());
    }

    buf.push(record.attributes.priority as u8);
    buf.extend_from_slice(&record.attributes.user_id.to_le_bytes());
    buf.extend_from_slice(&record.attributes.org_id.to_le_bytes());

    buf
}

fn estimate_len(record: &Record) -> usize {
    16 + 4
        + record.original_text.len()
        + 4
        + record.values.len() * 4
        + 2
        + record.tags.len() * 2
        + 1
        + 4
        + 4
}

pub fn decode(blob: &[u8]) -> Result<Record> {
    let mut cursor = Cursor { buf: blob, pos: 0 };

    let id = Id::from_bytes(cursor.take(16)?);

    let text_len = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
    let text_bytes = cursor.take(text_len)?;
    let original_text = match std::str::from_utf8(text_bytes) {
        Ok(s) => s.to_string(),
        Err(err) => return err_at!(InvalidData, msg: "record text not utf8: {}", err),
    };

    let values_len = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
    let mut values = Vec::with_capacity(values_len);
    for _ in 0..values_len {
        values.push(f32::from_le_bytes(cursor.take(4)?.try_into().unwrap()));
    }

    let tags_len = u16::from_le_bytes(cursor.take(2)?.try_into().unwrap()) as usize;
    let mut tags = Vec::with_capacity(tags_len);
    for _ in 0..tags_len {
        tags.push(i16::from_le_bytes(cursor.take(2)?.try_into().unwrap()));
    }

    let priority = cursor.take(1)?[0] as i8;
    let user_id = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap());
    let org_id = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap());

    if cursor.pos != blob.len() {
        return err_at!(
            InvalidData,
            msg: "trailing bytes after record: {} of {}", cursor.pos, blob.len()
        );
    }

    Ok(Record {
        id,
        values,
        original_text,
        tags,
        attributes: Attributes {
            priority,
            user_id,
            org_id,
        },
    })
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return err_at!(
                InvalidData,
                msg: "record blob truncated: need {} bytes at {}, have {}",
                n, self.pos, self.buf.len()
            );
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
