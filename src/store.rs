//! Memory-Mapped List (C7) — the core of the core, per spec.md §4.7.
//!
//! Composes [MappedFile] (C1), [DurabilityManager] (C2), [Wal] (C3),
//! [corruption] (C4) and [codec] (C6) into the durable, concurrent,
//! fixed-capacity vector store. One [std::sync::RwLock] guards every
//! mutable piece of store state (the index/data cursors, the live count,
//! and the in-progress defragmentation plan) per spec.md §5: "the store's
//! write lock covers the index file, the data file, and `count`". The
//! backing files themselves sit behind `Arc<Mutex<MappedFile>>` only so
//! they can double as [crate::durability::Durable] registrations with the
//! durability manager; `MappedFile`'s own methods take `&self`; the extra
//! mutex is never held across a lock acquired by a caller of this module.

use log::warn;

use std::{
    collections::HashSet,
    convert::TryFrom,
    ffi::OsStr,
    path::Path,
    sync::{Arc, Mutex, RwLock, RwLockReadGuard},
};

use crate::{
    cancel::CancelToken,
    codec,
    config::Config,
    corruption,
    durability::{Durable, DurabilityManager},
    err_at,
    memory_pressure::PressureResponder,
    mmapfile::{MappedFile, Mode},
    record::{Id, IndexEntry, Record, INDEX_ENTRY_SIZE},
    wal::{Wal, WalEntry},
    Result,
};

/// One entry in an in-progress defragmentation plan: where its index entry
/// lives, and its pre-compaction data extent, as observed at the moment it
/// was snapshotted into the plan. Sorted by `offset` ascending so
/// compaction writes strictly left of any not-yet-processed entry's
/// original bytes, which is what makes in-place compaction safe: earlier
/// records may have been relocated to the data-file's tail by a growing
/// `update`, so the index's slot order is not necessarily the data file's
/// physical order. The snapshot can go stale between batches — each batch
/// only holds the write lock for its own duration, per spec.md §4.7 — so
/// every entry is re-validated against the index file's *current* content
/// before it's trusted; see `defragment_batch`.
#[derive(Clone, Copy)]
struct PlanEntry {
    index_pos: u64,
    id: Id,
    offset: u64,
    length: u32,
}

#[derive(Default)]
struct State {
    count: usize,
    /// Number of occupied (non-EMPTY) index slots; one past the last valid
    /// entry. Also the byte offset of the next free index slot, divided by
    /// `INDEX_ENTRY_SIZE`.
    index_cursor: usize,
    /// One past the highest `offset + length` among all valid entries.
    data_cursor: u64,
    defrag_plan: Vec<PlanEntry>,
    defrag_position: usize,
    defrag_write_cursor: u64,
    /// Index slots ([PlanEntry::index_pos]) already compacted by the
    /// in-progress defrag pass. Used at apparent completion to detect
    /// entries `add`/`update` introduced or relocated *after* they were
    /// snapshotted into `defrag_plan` — see `defragment_batch`'s
    /// completion check.
    defrag_settled: HashSet<u64>,
}

/// The durable, concurrent, disk-backed vector store.
pub struct Store {
    index_file: Arc<Mutex<MappedFile>>,
    data_file: Arc<Mutex<MappedFile>>,
    wal: Mutex<Wal>,
    durability: Arc<DurabilityManager>,
    state: RwLock<State>,
    capacity: usize,
    data_capacity: u64,
    batch_size: usize,
}

impl Store {
    /// Open (or create) a store's on-disk family: `index_path`, `data_path`
    /// and their sibling `wal_path`. On an existing index file, runs the
    /// corruption-aware startup sequence of spec.md §4.7: validate, repair
    /// if needed, then replay the WAL.
    pub fn open(
        index_path: &OsStr,
        data_path: &OsStr,
        wal_path: &OsStr,
        config: &Config,
        durability: Arc<DurabilityManager>,
    ) -> Result<Store> {
        let configured_capacity = config.capacity;
        let configured_data_capacity = configured_capacity as u64 * config.bytes_per_record;
        let configured_index_capacity_bytes = (configured_capacity * INDEX_ENTRY_SIZE) as u64;

        let existed = Path::new(index_path).exists();
        let mode = if existed { Mode::Open } else { Mode::Create };

        let mut index_file = MappedFile::open(index_path, configured_index_capacity_bytes, mode)?;
        let mut data_file = MappedFile::open(data_path, configured_data_capacity, mode)?;

        // Reopening an existing store recovers its record capacity and
        // data-file budget from the files themselves (file length ÷ entry
        // size), per SPEC_FULL.md §F's `Config::from_stats`-style reopen
        // contract — not from whatever `Config` the caller happens to pass
        // this time. Trusting a freshly supplied `Config::capacity` here
        // would silently reinterpret (and truncate every scan of) a store
        // that was created with a different capacity.
        let (capacity, data_capacity, index_capacity_bytes) = if existed {
            let recovered_capacity = (index_file.capacity() / INDEX_ENTRY_SIZE as u64) as usize;
            (recovered_capacity, data_file.capacity(), index_file.capacity())
        } else {
            (configured_capacity, configured_data_capacity, configured_index_capacity_bytes)
        };

        if existed {
            let index_len = usize::try_from(index_file.capacity()).unwrap_or(0);
            let scan_len = index_len.min(index_capacity_bytes as usize);
            let index_bytes = index_file.read_at(0, scan_len)?;
            let validation = corruption::validate_index(&index_bytes, capacity)?;
            if !corruption::validate_data(&validation.valid_entries, data_file.capacity()) {
                warn!("store: data file shorter than index implies, attempting repair");
                let repaired = corruption::attempt_repair(&index_bytes, data_file.capacity())?;
                index_file.write_at(repaired.index_prefix_bytes, &IndexEntry::EMPTY.to_bytes())?;
            }
        }

        let index_file = Arc::new(Mutex::new(index_file));
        let data_file = Arc::new(Mutex::new(data_file));
        let durable_index: Arc<Mutex<dyn Durable>> = index_file.clone();
        let durable_data: Arc<Mutex<dyn Durable>> = data_file.clone();
        durability.register(durable_index);
        durability.register(durable_data);

        let wal = Mutex::new(Wal::open(wal_path)?);

        let store = Store {
            index_file,
            data_file,
            wal,
            durability,
            state: RwLock::new(State::default()),
            capacity,
            data_capacity,
            batch_size: config.batch_size.max(1),
        };

        {
            let mut state = store.state.write().unwrap();
            store.replay(&mut state)?;
        }

        Ok(store)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.state.read().unwrap().count
    }

    // -- startup / recovery -------------------------------------------------

    /// Read index entries 0.. until the first `EMPTY`, tracking the maximum
    /// `offset + length` seen. Per spec.md §4.7's "End-of-stream discovery".
    fn discover_cursors(&self) -> Result<(usize, u64, usize)> {
        let index_file = self.index_file.lock().unwrap();
        let mut index_cursor = 0usize;
        let mut data_cursor = 0u64;
        let mut count = 0usize;
        for i in 0..self.capacity {
            let pos = (i * INDEX_ENTRY_SIZE) as u64;
            let entry = IndexEntry::from_bytes(&index_file.read_at(pos, INDEX_ENTRY_SIZE)?)?;
            if entry.is_empty() {
                break;
            }
            data_cursor = data_cursor.max(entry.end());
            if !entry.is_tombstone() {
                count += 1;
            }
            index_cursor = i + 1;
        }
        Ok((index_cursor, data_cursor, count))
    }

    fn replay(&self, state: &mut State) -> Result<()> {
        let entries = {
            let mut wal = self.wal.lock().unwrap();
            wal.read_entries()?
        };
        for entry in &entries {
            if let Err(err) = self.replay_entry(entry) {
                warn!("wal replay: skipping entry for {:?}: {}", entry.id(), err);
            }
        }
        {
            let mut wal = self.wal.lock().unwrap();
            wal.commit()?;
        }
        let (index_cursor, data_cursor, count) = self.discover_cursors()?;
        state.index_cursor = index_cursor;
        state.data_cursor = data_cursor;
        state.count = count;
        Ok(())
    }

    /// Re-apply one logged entry without logging it again (the "dedicated
    /// add path that bypasses WAL-logging to avoid recursion" of spec.md
    /// §4.7). Validates the decoded record against the codec first,
    /// resolving spec.md §9's open question in favor of validation: a
    /// record that no longer decodes cleanly is worse than useless to
    /// re-apply blindly.
    fn replay_entry(&self, entry: &WalEntry) -> Result<()> {
        match entry.kind {
            WalEntry::KIND_ADD | WalEntry::KIND_UPDATE => {
                codec::decode(&entry.bytes)?;
                let idx = IndexEntry {
                    id: entry.id(),
                    offset: entry.data_pos,
                    length: err_at!(FailConvert, u32::try_from(entry.bytes.len()))?,
                };
                self.index_file.lock().unwrap().write_at(entry.index_pos, &idx.to_bytes())?;
                self.data_file.lock().unwrap().write_at(entry.data_pos, &entry.bytes)?;
                Ok(())
            }
            WalEntry::KIND_REMOVE => {
                self.index_file.lock().unwrap().write_at(entry.index_pos, &entry.bytes)?;
                Ok(())
            }
            kind => err_at!(Corrupt, msg: "unknown wal entry kind {}", kind),
        }
    }

    // -- internal helpers -----------------------------------------------

    fn read_index_entry(&self, index_pos: u64) -> Result<IndexEntry> {
        let index_file = self.index_file.lock().unwrap();
        IndexEntry::from_bytes(&index_file.read_at(index_pos, INDEX_ENTRY_SIZE)?)
    }

    fn decode_at(&self, entry: &IndexEntry) -> Result<Record> {
        let data_file = self.data_file.lock().unwrap();
        let bytes = data_file.read_at(entry.offset, entry.length as usize)?;
        codec::decode(&bytes)
    }

    /// `(index_pos, entry)` of the live entry matching `id`, within the
    /// valid prefix `0..state.index_cursor`.
    fn find_entry_locked(&self, state: &State, id: Id) -> Result<Option<(u64, IndexEntry)>> {
        for i in 0..state.index_cursor {
            let pos = (i * INDEX_ENTRY_SIZE) as u64;
            let entry = self.read_index_entry(pos)?;
            if entry.is_tombstone() {
                continue;
            }
            if entry.id == id {
                return Ok(Some((pos, entry)));
            }
        }
        Ok(None)
    }

    /// Non-tombstone entries of the valid prefix, in index-slot order.
    fn live_entries_locked(&self, state: &State) -> Result<Vec<(u64, IndexEntry)>> {
        let mut out = Vec::new();
        for i in 0..state.index_cursor {
            let pos = (i * INDEX_ENTRY_SIZE) as u64;
            let entry = self.read_index_entry(pos)?;
            if !entry.is_tombstone() {
                out.push((pos, entry));
            }
        }
        Ok(out)
    }

    // -- mutations --------------------------------------------------------

    pub fn add(&self, record: Record, cancel: Option<&CancelToken>) -> Result<()> {
        CancelToken::check(cancel)?;
        let mut state = self.state.write().unwrap();
        self.add_locked(&mut state, record, true)
    }

    fn add_locked(&self, state: &mut State, record: Record, wal_log: bool) -> Result<()> {
        if state.index_cursor >= self.capacity {
            return err_at!(
                InsufficientCapacity,
                msg: "index file full at capacity {}", self.capacity
            );
        }
        let bytes = codec::encode(&record);
        let len = err_at!(FailConvert, u32::try_from(bytes.len()))?;
        let data_pos = state.data_cursor;
        if data_pos + len as u64 > self.data_capacity {
            return err_at!(
                InsufficientCapacity,
                msg: "data file full: need {} bytes at {}, capacity {}",
                len, data_pos, self.data_capacity
            );
        }
        let index_pos = (state.index_cursor * INDEX_ENTRY_SIZE) as u64;

        if wal_log {
            let mut wal = self.wal.lock().unwrap();
            wal.log(&WalEntry::add(record.id, bytes.clone(), index_pos, data_pos))?;
        }

        let entry = IndexEntry { id: record.id, offset: data_pos, length: len };
        self.index_file.lock().unwrap().write_at(index_pos, &entry.to_bytes())?;
        self.data_file.lock().unwrap().write_at(data_pos, &bytes)?;

        self.durability.record_op()?;
        if wal_log {
            self.wal.lock().unwrap().commit()?;
        }

        state.index_cursor += 1;
        state.data_cursor += len as u64;
        state.count += 1;
        Ok(())
    }

    pub fn update(&self, record: Record, cancel: Option<&CancelToken>) -> Result<bool> {
        CancelToken::check(cancel)?;
        let mut state = self.state.write().unwrap();
        let (index_pos, old_entry) = match self.find_entry_locked(&state, record.id)? {
            Some(v) => v,
            None => return Ok(false),
        };

        let bytes = codec::encode(&record);
        let new_len = err_at!(FailConvert, u32::try_from(bytes.len()))?;
        let new_offset = if new_len <= old_entry.length {
            old_entry.offset
        } else {
            let actual_end = state.data_cursor;
            if actual_end + new_len as u64 > self.data_capacity {
                return err_at!(
                    InsufficientCapacity,
                    msg: "data file full: record {:?} grew to {} bytes", record.id, new_len
                );
            }
            actual_end
        };

        self.wal
            .lock()
            .unwrap()
            .log(&WalEntry::update(record.id, bytes.clone(), index_pos, new_offset))?;

        self.data_file.lock().unwrap().write_at(new_offset, &bytes)?;
        let new_entry = IndexEntry { id: record.id, offset: new_offset, length: new_len };
        self.index_file.lock().unwrap().write_at(index_pos, &new_entry.to_bytes())?;

        self.durability.record_op()?;
        self.wal.lock().unwrap().commit()?;

        state.data_cursor = state.data_cursor.max(new_offset + new_len as u64);
        Ok(true)
    }

    pub fn remove_by_id(&self, id: Id, cancel: Option<&CancelToken>) -> Result<bool> {
        CancelToken::check(cancel)?;
        let mut state = self.state.write().unwrap();
        let (index_pos, entry) = match self.find_entry_locked(&state, id)? {
            Some(v) => v,
            None => return Ok(false),
        };

        let tombstone = IndexEntry::tombstone(entry.offset, entry.length);
        let tombstone_bytes = tombstone.to_bytes();

        self.wal
            .lock()
            .unwrap()
            .log(&WalEntry::remove(id, tombstone_bytes.to_vec(), index_pos))?;

        self.index_file.lock().unwrap().write_at(index_pos, &tombstone_bytes)?;

        self.durability.record_op()?;
        self.wal.lock().unwrap().commit()?;

        state.count -= 1;
        Ok(true)
    }

    pub fn remove(&self, record: &Record, cancel: Option<&CancelToken>) -> Result<bool> {
        self.remove_by_id(record.id, cancel)
    }

    pub fn clear(&self, cancel: Option<&CancelToken>) -> Result<()> {
        CancelToken::check(cancel)?;
        let mut state = self.state.write().unwrap();
        self.index_file.lock().unwrap().write_at(0, &IndexEntry::EMPTY.to_bytes())?;
        self.durability.record_op()?;
        *state = State::default();
        Ok(())
    }

    // -- reads --------------------------------------------------------------

    pub fn get(&self, index: usize) -> Result<Option<Record>> {
        let state = self.state.read().unwrap();
        let mut logical = 0usize;
        for i in 0..state.index_cursor {
            let pos = (i * INDEX_ENTRY_SIZE) as u64;
            let entry = self.read_index_entry(pos)?;
            if entry.is_tombstone() {
                continue;
            }
            if logical == index {
                return self.decode_at(&entry).map(Some);
            }
            logical += 1;
        }
        Ok(None)
    }

    pub fn get_by_id(&self, id: Id) -> Result<Option<Record>> {
        let state = self.state.read().unwrap();
        match self.find_entry_locked(&state, id)? {
            Some((_, entry)) => self.decode_at(&entry).map(Some),
            None => Ok(None),
        }
    }

    /// Logical position of `id`, or `-1` if absent. Tombstoned and `EMPTY`
    /// slots are never counted.
    pub fn index_of(&self, id: Id) -> Result<i64> {
        let state = self.state.read().unwrap();
        let mut logical = 0i64;
        for i in 0..state.index_cursor {
            let pos = (i * INDEX_ENTRY_SIZE) as u64;
            let entry = self.read_index_entry(pos)?;
            if entry.is_tombstone() {
                continue;
            }
            if entry.id == id {
                return Ok(logical);
            }
            logical += 1;
        }
        Ok(-1)
    }

    /// Lazy, finite iterator in insertion order, skipping tombstones. Holds
    /// the store's read lock for its entire lifetime, per spec.md §4.7:
    /// "Snapshot cursor positions under a read lock held for the duration
    /// of iteration."
    pub fn iterate(&self) -> Iter<'_> {
        let guard = self.state.read().unwrap();
        let limit = guard.index_cursor;
        Iter { store: self, _guard: guard, pos: 0, limit }
    }

    /// Copy up to `buffer.len()` records starting at logical position
    /// `start` into `buffer`. `OutOfBounds` if the requested range runs
    /// past `count`.
    pub fn copy_to(&self, buffer: &mut [Option<Record>], start: usize) -> Result<()> {
        let state = self.state.read().unwrap();
        if start + buffer.len() > state.count {
            return err_at!(
                OutOfBounds,
                msg: "copy_to range [{}, {}) exceeds count {}",
                start, start + buffer.len(), state.count
            );
        }
        for (offset, slot) in buffer.iter_mut().enumerate() {
            *slot = self.get_locked(&state, start + offset)?;
        }
        Ok(())
    }

    fn get_locked(&self, state: &State, index: usize) -> Result<Option<Record>> {
        let mut logical = 0usize;
        for i in 0..state.index_cursor {
            let pos = (i * INDEX_ENTRY_SIZE) as u64;
            let entry = self.read_index_entry(pos)?;
            if entry.is_tombstone() {
                continue;
            }
            if logical == index {
                return self.decode_at(&entry).map(Some);
            }
            logical += 1;
        }
        Ok(None)
    }

    /// Integer percent: `Σ(gap between adjacent live records) × 100 ÷
    /// Σ(record lengths)`, per spec.md §4.7. Live entries are walked in
    /// ascending data-offset order, not index-slot order, since a grown
    /// `update` can relocate a record to the data file's tail.
    pub fn calculate_fragmentation(&self) -> Result<u32> {
        let state = self.state.read().unwrap();
        self.calculate_fragmentation_locked(&state)
    }

    fn calculate_fragmentation_locked(&self, state: &State) -> Result<u32> {
        let mut entries: Vec<IndexEntry> = self
            .live_entries_locked(state)?
            .into_iter()
            .map(|(_, e)| e)
            .collect();
        entries.sort_by_key(|e| e.offset);

        let mut expected_next = 0u64;
        let mut total_fragmentation = 0u64;
        let mut total_data = 0u64;
        for entry in &entries {
            if entry.offset > expected_next {
                total_fragmentation += entry.offset - expected_next;
            }
            expected_next = entry.offset + entry.length as u64;
            total_data += entry.length as u64;
        }
        if total_data == 0 {
            Ok(0)
        } else {
            Ok(((total_fragmentation * 100) / total_data) as u32)
        }
    }

    // -- defragmentation ------------------------------------------------

    /// One blocking pass: repeatedly runs [Store::defragment_batch] until
    /// it reports completion. Each batch still acquires and releases the
    /// write lock independently, per spec.md §4.7: "Both modes must hold a
    /// write lock for the duration of each batch."
    pub fn defragment(&self, cancel: Option<&CancelToken>) -> Result<()> {
        loop {
            CancelToken::check(cancel)?;
            if self.defragment_batch(cancel)? == 0 {
                return Ok(());
            }
        }
    }

    /// Processes up to `batch_size` live records per call, maintaining
    /// cursors across calls. Returns the fragmentation percent remaining,
    /// or `0` when compaction is complete (cursors reset).
    pub fn defragment_batch(&self, cancel: Option<&CancelToken>) -> Result<u32> {
        CancelToken::check(cancel)?;
        let mut state = self.state.write().unwrap();

        if state.defrag_plan.is_empty() && state.defrag_position == 0 && state.defrag_settled.is_empty() {
            let mut plan: Vec<PlanEntry> = self
                .live_entries_locked(&state)?
                .into_iter()
                .map(|(pos, e)| PlanEntry { index_pos: pos, id: e.id, offset: e.offset, length: e.length })
                .collect();
            plan.sort_by_key(|e| e.offset);
            if plan.is_empty() {
                return Ok(0);
            }
            state.defrag_plan = plan;
        }

        let mut processed = 0usize;
        while processed < self.batch_size && state.defrag_position < state.defrag_plan.len() {
            if processed > 0 {
                CancelToken::check(cancel)?;
            }
            let plan_entry = state.defrag_plan[state.defrag_position];

            // Re-validate against the index file's current content: a
            // concurrent `update`/`remove` may have run in the gap between
            // this batch and the one that built (or last extended) the
            // plan, relocating, shrinking, or tombstoning this slot.
            // Compacting the stale snapshot would overwrite whatever that
            // concurrent writer left behind.
            let current = self.read_index_entry(plan_entry.index_pos)?;
            let stale = current.id != plan_entry.id
                || current.offset != plan_entry.offset
                || current.length != plan_entry.length;

            if !stale {
                if plan_entry.offset != state.defrag_write_cursor {
                    let bytes = {
                        let data_file = self.data_file.lock().unwrap();
                        data_file.read_at(plan_entry.offset, plan_entry.length as usize)?
                    };
                    self.data_file
                        .lock()
                        .unwrap()
                        .write_at(state.defrag_write_cursor, &bytes)?;
                    let new_entry = IndexEntry {
                        id: plan_entry.id,
                        offset: state.defrag_write_cursor,
                        length: plan_entry.length,
                    };
                    self.index_file
                        .lock()
                        .unwrap()
                        .write_at(plan_entry.index_pos, &new_entry.to_bytes())?;
                }
                state.defrag_write_cursor += plan_entry.length as u64;
                state.defrag_settled.insert(plan_entry.index_pos);
            }
            // A stale entry is simply dropped: whatever the concurrent
            // writer left at `plan_entry.index_pos` (a relocation, a
            // shrink, or a tombstone) is untouched here. The completion
            // check below re-scans live entries and folds anything not
            // yet settled back into the plan.
            state.defrag_position += 1;
            processed += 1;
        }

        self.durability.record_op()?;

        if state.defrag_position >= state.defrag_plan.len() {
            // Before declaring the pass complete, re-scan live entries for
            // anything this plan never accounted for: a new `add` lands
            // past the pre-defrag data tail, and a growing `update` leaves
            // its old slot stale above while relocating to a new one. Both
            // are invisible to `defrag_write_cursor`, which only tracks
            // bytes this plan itself relocated. Trusting it alone here
            // would shrink `data_cursor` below the true tail, and the next
            // `add`/growing `update` would then write into — and corrupt —
            // one of these still-live records (spec.md §3 invariant 3).
            let fresh = self.live_entries_locked(&state)?;
            let mut extra: Vec<PlanEntry> = fresh
                .into_iter()
                .filter(|(pos, _)| !state.defrag_settled.contains(pos))
                .map(|(pos, e)| PlanEntry { index_pos: pos, id: e.id, offset: e.offset, length: e.length })
                .collect();

            if extra.is_empty() {
                state.data_cursor = state.defrag_write_cursor;
                state.defrag_plan.clear();
                state.defrag_position = 0;
                state.defrag_write_cursor = 0;
                state.defrag_settled.clear();
                Ok(0)
            } else {
                extra.sort_by_key(|e| e.offset);
                state.defrag_plan.extend(extra);
                self.calculate_fragmentation_locked(&state)
            }
        } else {
            self.calculate_fragmentation_locked(&state)
        }
    }

    // -- durability / memory pressure ----------------------------------

    pub fn flush(&self) -> Result<()> {
        self.durability.flush_all()
    }

    /// Disposes the current mapped views so the OS can reclaim resident
    /// pages; the next access recreates them transparently. Per spec.md
    /// §5: "takes the write lock, disposes current views, and resets
    /// holders."
    pub fn release_mapped_memory(&self) -> Result<()> {
        let _state = self.state.write().unwrap();
        self.index_file.lock().unwrap().release_view();
        self.data_file.lock().unwrap().release_view();
        Ok(())
    }
}

impl PressureResponder for Store {
    fn on_memory_pressure(&self) -> Result<()> {
        self.flush()?;
        self.release_mapped_memory()
    }
}

/// Lazy iterator over a store's records in insertion order, holding the
/// store's read lock for its lifetime.
pub struct Iter<'a> {
    store: &'a Store,
    _guard: RwLockReadGuard<'a, State>,
    pos: usize,
    limit: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.limit {
            let i = self.pos;
            self.pos += 1;
            let pos = (i * INDEX_ENTRY_SIZE) as u64;
            let entry = match self.store.read_index_entry(pos) {
                Ok(e) => e,
                Err(err) => return Some(Err(err)),
            };
            if entry.is_tombstone() {
                continue;
            }
            return Some(self.store.decode_at(&entry));
        }
        None
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
