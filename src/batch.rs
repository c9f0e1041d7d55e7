//! Batch/SIMD View (C12): a cache-line-aligned contiguous batch over a set
//! of records, for vectorized distance computation, per spec.md §4.12.
//!
//! Grounded on `robt_entry`'s leaf-node contiguous value layout (a flat
//! buffer addressed by computed offsets rather than a `Vec<Vec<f32>>`),
//! generalized here to a manually managed 64-byte-aligned allocation since
//! the teacher's leaf buffers don't need SIMD alignment and std's `Vec`
//! can't express a non-default alignment. Retains zero-copy semantics
//! (spec.md §9: "Retain zero-copy semantics but expose borrowed,
//! lifetime-bounded views only; raw pointers are internal to SIMD
//! kernels.") — [Batch::as_span] is the only way callers outside this
//! crate touch the buffer; [Batch::raw_ptr] is for `unsafe` SIMD kernels
//! that need the whole contiguous, padded region.

use std::alloc::{alloc_zeroed, dealloc, Layout};

use crate::{err_at, record::Record, Result};

/// Row alignment, in bytes: one AVX-512/typical cache-line width.
const ALIGNMENT: usize = 64;
/// Row width is padded to a multiple of this many `f32`s (16 × 4B = 64B),
/// so every record's row starts on an aligned boundary.
const LANE_WIDTH: usize = 16;

fn pad_to_lanes(dimension: usize) -> usize {
    (dimension + LANE_WIDTH - 1) / LANE_WIDTH * LANE_WIDTH
}

/// One contiguous, 64-byte-aligned buffer of `record_count ×
/// padded_dimension` `f32`s, zero-filled in the padding. Owns the
/// allocation; per-record views ([Batch::as_span]) borrow for the batch's
/// lifetime. Read-only: there is no mutating accessor, per spec.md §4.12
/// ("Used exclusively by read-only distance kernels").
pub struct Batch {
    ptr: *mut f32,
    layout: Layout,
    record_count: usize,
    dimension: usize,
    padded_dimension: usize,
    ids: Vec<crate::record::Id>,
}

// SAFETY: `ptr` is an owned, exclusively-held allocation; no other handle
// to it escapes `Batch`. Sharing a `Batch` across threads only allows
// shared (`&self`) access, which never mutates the buffer.
unsafe impl Send for Batch {}
unsafe impl Sync for Batch {}

impl Batch {
    /// Build a batch over `records`. All records must share a dimension;
    /// mismatched dimensions fail with `InvalidData` rather than silently
    /// truncating or zero-padding across records.
    pub fn new(records: &[Record]) -> Result<Batch> {
        if records.is_empty() {
            return Ok(Batch {
                ptr: dangling_aligned(),
                layout: Layout::from_size_align(0, ALIGNMENT).unwrap(),
                record_count: 0,
                dimension: 0,
                padded_dimension: 0,
                ids: Vec::new(),
            });
        }

        let dimension = records[0].dimension();
        for record in records {
            if record.dimension() != dimension {
                return err_at!(
                    InvalidData,
                    msg: "batch requires uniform dimension: record {:?} has {}, expected {}",
                    record.id, record.dimension(), dimension
                );
            }
        }

        let padded_dimension = pad_to_lanes(dimension);
        let total_floats = records.len() * padded_dimension;

        // A record whose shared dimension is 0 is legal per spec.md §3
        // ("values may be any ordered sequence of floats"); `Layout::array`
        // happily returns a zero-size layout for it, but `GlobalAlloc`
        // requires `layout.size() > 0` for `alloc`/`alloc_zeroed` — calling
        // it anyway is undefined behavior, not just a wasted allocation.
        // Skip the allocation entirely, same as the empty-records case.
        if total_floats == 0 {
            return Ok(Batch {
                ptr: dangling_aligned(),
                layout: Layout::from_size_align(0, ALIGNMENT).unwrap(),
                record_count: records.len(),
                dimension,
                padded_dimension,
                ids: records.iter().map(|r| r.id).collect(),
            });
        }

        let layout = err_at!(Fatal, Layout::array::<f32>(total_floats))?;

        let raw = unsafe { alloc_zeroed(layout) } as *mut f32;
        if raw.is_null() {
            return err_at!(Fatal, msg: "allocation of {} floats failed", total_floats);
        }

        for (i, record) in records.iter().enumerate() {
            let row = unsafe { std::slice::from_raw_parts_mut(raw.add(i * padded_dimension), dimension) };
            row.copy_from_slice(&record.values);
        }

        Ok(Batch {
            ptr: raw,
            layout,
            record_count: records.len(),
            dimension,
            padded_dimension,
            ids: records.iter().map(|r| r.id).collect(),
        })
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn padded_dimension(&self) -> usize {
        self.padded_dimension
    }

    pub fn id(&self, i: usize) -> crate::record::Id {
        self.ids[i]
    }

    /// Zero-copy, unpadded view of record `i`'s values, bounded by `&self`.
    pub fn as_span(&self, i: usize) -> &[f32] {
        assert!(i < self.record_count, "batch index {} out of range {}", i, self.record_count);
        unsafe { std::slice::from_raw_parts(self.ptr.add(i * self.padded_dimension), self.dimension) }
    }

    /// Raw pointer to the start of the whole padded, aligned buffer, for
    /// `unsafe` vectorized kernels that walk rows by `padded_dimension`
    /// stride directly. Never exposed as a mutable pointer.
    pub fn raw_ptr(&self) -> *const f32 {
        self.ptr
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        // The zero-size cases above never allocated; `layout.size() == 0`
        // is what distinguishes them, not a null `ptr` (which is itself no
        // longer a possible value of `ptr` — see `dangling_aligned`).
        if self.layout.size() > 0 {
            unsafe { dealloc(self.ptr as *mut u8, self.layout) };
        }
    }
}

/// A non-null, `f32`-aligned sentinel pointer for the zero-size cases of
/// [Batch::new]: no allocation ever backs it, but [Batch::as_span] still
/// calls `slice::from_raw_parts` on it at length 0, which requires a
/// non-null, aligned pointer even for a zero-length slice.
fn dangling_aligned() -> *mut f32 {
    std::ptr::NonNull::<f32>::dangling().as_ptr()
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
