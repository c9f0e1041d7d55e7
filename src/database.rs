//! Database Orchestrator (C10): composes the vector list (C9), the tag
//! index (C8) and a replaceable search-index handle behind a
//! reader-writer discipline, per spec.md §4.10.
//!
//! Grounded on `bogn::Bogn`'s role as the top-level type that owns an
//! index plus its auxiliary structures and exposes `get`/`set`/`delete`
//! over them; generalized here to own a fixed vector store instead of a
//! swappable LSM index, plus the tag index and search-index handle the
//! teacher's `Bogn` has no equivalent of.
//!
//! Open question resolved (spec.md §4.10, §9): `search` on an outdated
//! index **falls back to a linear scan** rather than blocking on a
//! rebuild. A caller who wants ANN-quality results only from a fresh index
//! should poll `is_index_outdated()`; this crate does not block reads
//! behind a background worker's schedule, the same way the teacher's
//! `mvcc` readers never block behind a compaction.

use log::{debug, warn};

use std::{
    ffi, fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Instant,
};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};

use crate::{
    background::BackgroundIndexService,
    cancel::CancelToken,
    codec,
    config::Config,
    durability::DurabilityManager,
    err_at,
    filenames::{Purpose, StoreFileName, WalFileName},
    list::VectorList,
    memory_pressure::MemoryPressureMonitor,
    record::{Id, Record},
    search::{linear_range_search, linear_search, squared_euclidean, SearchIndex, SearchIndexBuilder},
    store::Store,
    tags::TagIndex,
    Result,
};

struct OrchestratorState {
    tags: TagIndex,
    search_index: Option<Box<dyn SearchIndex>>,
}

/// Where a database's on-disk family lives: `{base_path}/{title}_*.nbrly`
/// plus the WAL sibling, per spec.md §6.
pub struct DatabasePaths {
    pub base_path: PathBuf,
    pub title: String,
}

impl DatabasePaths {
    pub fn new(base_path: impl Into<PathBuf>, title: &str) -> DatabasePaths {
        DatabasePaths { base_path: base_path.into(), title: title.to_string() }
    }

    fn resolve(&self, purpose: Purpose) -> ffi::OsString {
        self.base_path.join(StoreFileName::new(&self.title, purpose).to_string()).into_os_string()
    }

    fn wal(&self) -> ffi::OsString {
        self.base_path.join(WalFileName::new(&self.title).to_string()).into_os_string()
    }
}

/// The top-level database object: a vector store, its tag index, and its
/// current search-index handle, coordinated per spec.md §5.
pub struct Database {
    list: VectorList,
    state: RwLock<OrchestratorState>,
    index_builder: Option<Arc<dyn SearchIndexBuilder>>,
    tags_outdated: AtomicBool,
    index_outdated: AtomicBool,
    last_modification: Mutex<Instant>,
    config: Config,
    background: Mutex<Option<BackgroundIndexService>>,
}

impl Database {
    /// Open (or create) the database's on-disk family at `paths` and, if
    /// `config.platform_allows_background_index`, spawn the background
    /// index service (C11). `index_builder` is the caller-supplied
    /// search-index algorithm; `None` means "linear scan only," which is a
    /// legitimate, documented choice for small stores.
    pub fn open(
        paths: &DatabasePaths,
        config: Config,
        durability: Arc<DurabilityManager>,
        memory_pressure: Option<&Arc<MemoryPressureMonitor>>,
        index_builder: Option<Arc<dyn SearchIndexBuilder>>,
    ) -> Result<Arc<Database>> {
        let index_path = paths.resolve(Purpose::Index);
        let data_path = paths.resolve(Purpose::Data);
        let wal_path = paths.wal();

        let store = Arc::new(Store::open(&index_path, &data_path, &wal_path, &config, durability)?);
        let list = VectorList::new(Arc::clone(&store));

        let mut tags = TagIndex::new();
        let records: Vec<Record> = list.iterate().collect::<Result<Vec<_>>>()?;
        tags.build_map(&records);

        let db = Arc::new(Database {
            list,
            state: RwLock::new(OrchestratorState { tags, search_index: None }),
            index_builder,
            tags_outdated: AtomicBool::new(false),
            index_outdated: AtomicBool::new(!records.is_empty()),
            last_modification: Mutex::new(Instant::now()),
            config,
            background: Mutex::new(None),
        });

        if let Some(monitor) = memory_pressure {
            let responder: Arc<dyn crate::memory_pressure::PressureResponder> = db.list.store_handle();
            monitor.register(&responder);
        }

        if db.config.platform_allows_background_index {
            let service = BackgroundIndexService::spawn(Arc::clone(&db), db.config.background_index_delay_ms);
            *db.background.lock().unwrap() = Some(service);
        }

        Ok(db)
    }

    pub fn count(&self) -> usize {
        self.list.count()
    }

    pub fn capacity(&self) -> usize {
        self.list.capacity()
    }

    fn on_modified(&self) {
        self.tags_outdated.store(true, Ordering::SeqCst);
        self.index_outdated.store(true, Ordering::SeqCst);
        *self.last_modification.lock().unwrap() = Instant::now();
    }

    pub(crate) fn is_index_outdated(&self) -> bool {
        self.index_outdated.load(Ordering::SeqCst)
    }

    pub(crate) fn is_tags_outdated(&self) -> bool {
        self.tags_outdated.load(Ordering::SeqCst)
    }

    pub(crate) fn idle_duration(&self) -> std::time::Duration {
        self.last_modification.lock().unwrap().elapsed()
    }

    pub(crate) fn subscribe(&self) -> std::sync::mpsc::Receiver<crate::list::Modified> {
        self.list.subscribe()
    }

    // -- mutations --------------------------------------------------------

    pub fn add(&self, record: Record, cancel: Option<&CancelToken>) -> Result<()> {
        self.list.add(record, cancel)?;
        self.on_modified();
        Ok(())
    }

    pub fn add_range(&self, records: Vec<Record>, cancel: Option<&CancelToken>) -> Result<()> {
        for record in records {
            CancelToken::check(cancel)?;
            self.list.add(record, cancel)?;
        }
        self.on_modified();
        Ok(())
    }

    pub fn update(&self, id: Id, mut record: Record, cancel: Option<&CancelToken>) -> Result<bool> {
        record.id = id;
        let found = self.list.update(record, cancel)?;
        if found {
            self.on_modified();
        }
        Ok(found)
    }

    pub fn remove(&self, id: Id, cancel: Option<&CancelToken>) -> Result<bool> {
        let found = self.list.remove_by_id(id, cancel)?;
        if found {
            self.on_modified();
        }
        Ok(found)
    }

    pub fn clear(&self, cancel: Option<&CancelToken>) -> Result<()> {
        self.list.clear(cancel)?;
        self.on_modified();
        Ok(())
    }

    // -- reads --------------------------------------------------------------

    pub fn get(&self, index: usize) -> Result<Option<Record>> {
        self.list.get(index)
    }

    pub fn get_by_id(&self, id: Id) -> Result<Option<Record>> {
        self.list.get_by_id(id)
    }

    pub fn calculate_fragmentation(&self) -> Result<u32> {
        self.list.calculate_fragmentation()
    }

    /// `k` nearest neighbors of `query`. Falls back to an exact linear scan
    /// (documented policy, see module docs) whenever the current index is
    /// outdated or absent.
    pub fn search(&self, query: &[f32], k: usize, algorithm: Option<&str>) -> Result<Vec<(Id, f32)>> {
        if !self.is_index_outdated() {
            let state = self.state.read().unwrap();
            if let Some(index) = state.search_index.as_ref() {
                return Ok(index.search(query, k, algorithm));
            }
        }
        let records: Vec<Record> = self.list.iterate().collect::<Result<Vec<_>>>()?;
        Ok(linear_search(&records, query, k, squared_euclidean))
    }

    /// Every neighbor of `query` within `radius`, with the same outdated-
    /// index fallback policy as [Database::search].
    pub fn range_search(&self, query: &[f32], radius: f32, algorithm: Option<&str>) -> Result<Vec<(Id, f32)>> {
        if !self.is_index_outdated() {
            let state = self.state.read().unwrap();
            if let Some(index) = state.search_index.as_ref() {
                return Ok(index.range_search(query, radius, algorithm));
            }
        }
        let records: Vec<Record> = self.list.iterate().collect::<Result<Vec<_>>>()?;
        Ok(linear_range_search(&records, query, radius, squared_euclidean))
    }

    // -- maintenance ------------------------------------------------------

    pub fn defragment(&self, cancel: Option<&CancelToken>) -> Result<()> {
        self.list.defragment(cancel)
    }

    pub fn defragment_batch(&self, cancel: Option<&CancelToken>) -> Result<u32> {
        self.list.defragment_batch(cancel)
    }

    pub fn flush(&self) -> Result<()> {
        self.list.flush()
    }

    /// Rebuild the tag index from a full scan of the store, per spec.md
    /// §4.8. Invoked under the orchestrator's write lock, as spec.md
    /// §4.10 requires ("builds happen under the orchestrator write lock").
    pub fn rebuild_tags(&self) -> Result<()> {
        let records: Vec<Record> = self.list.iterate().collect::<Result<Vec<_>>>()?;
        let mut state = self.state.write().unwrap();
        state.tags.build_map(&records);
        self.tags_outdated.store(false, Ordering::SeqCst);
        debug!("rebuild_tags: {} records scanned", records.len());
        Ok(())
    }

    /// Rebuild the search index via the caller-supplied [SearchIndexBuilder].
    /// A no-op (clears any stale index) when no builder was configured.
    pub fn rebuild_search_indexes(&self) -> Result<()> {
        let records: Vec<Record> = self.list.iterate().collect::<Result<Vec<_>>>()?;
        let built = match self.index_builder.as_ref() {
            Some(builder) => Some(builder.build(&records)?),
            None => None,
        };
        let mut state = self.state.write().unwrap();
        state.search_index = built;
        self.index_outdated.store(false, Ordering::SeqCst);
        debug!("rebuild_search_indexes: {} records scanned", records.len());
        Ok(())
    }

    // -- tag queries --------------------------------------------------------

    pub fn add_tag_name(&self, name: &str) -> Result<i16> {
        self.state.write().unwrap().tags.add_tag_name(name)
    }

    pub fn get_ids_by_tag(&self, tag_id: i16) -> std::collections::BTreeSet<Id> {
        self.state.read().unwrap().tags.get_ids_by_tag(tag_id)
    }

    pub fn get_ids_by_all_tags(&self, tag_ids: &[i16]) -> std::collections::BTreeSet<Id> {
        self.state.read().unwrap().tags.get_ids_by_all_tags(tag_ids)
    }

    pub fn get_ids_by_any_tag(&self, tag_ids: &[i16]) -> std::collections::BTreeSet<Id> {
        self.state.read().unwrap().tags.get_ids_by_any_tag(tag_ids)
    }

    // -- persistence --------------------------------------------------------

    /// Write the save stream of spec.md §4.10/§6: gzip-framed
    /// `u32 vector_count`, then `(u32 blob_length, blob_bytes)*`, then the
    /// tag index's `to_binary` block.
    pub fn save(&self, path: &Path) -> Result<()> {
        let records: Vec<Record> = self.list.iterate().collect::<Result<Vec<_>>>()?;
        let tag_bytes = self.state.read().unwrap().tags.to_binary()?;

        let file = err_at!(IoError, fs::File::create(path))?;
        let mut enc = GzEncoder::new(file, Compression::default());

        err_at!(IoError, enc.write_all(&(records.len() as u32).to_le_bytes()))?;
        for record in &records {
            let blob = codec::encode(record);
            err_at!(IoError, enc.write_all(&(blob.len() as u32).to_le_bytes()))?;
            err_at!(IoError, enc.write_all(&blob))?;
        }
        err_at!(IoError, enc.write_all(&(tag_bytes.len() as u32).to_le_bytes()))?;
        err_at!(IoError, enc.write_all(&tag_bytes))?;
        err_at!(IoError, enc.finish())?;
        Ok(())
    }

    /// Load the mirror of [Database::save]. A missing file with
    /// `create_on_new = true` leaves the database empty, per spec.md §6;
    /// otherwise it's `InvalidData`. The store is cleared before loading,
    /// so `load` onto a non-empty database replaces its content.
    pub fn load(&self, path: &Path, create_on_new: bool, cancel: Option<&CancelToken>) -> Result<()> {
        if !path.exists() {
            return if create_on_new {
                Ok(())
            } else {
                err_at!(InvalidData, msg: "database file not found: {:?}", path)
            };
        }

        let file = err_at!(IoError, fs::File::open(path))?;
        let mut dec = GzDecoder::new(file);

        let count = err_at!(InvalidData, read_u32(&mut dec))?;
        self.list.clear(cancel)?;
        for _ in 0..count {
            CancelToken::check(cancel)?;
            let len = err_at!(InvalidData, read_u32(&mut dec))? as usize;
            let mut blob = vec![0u8; len];
            err_at!(InvalidData, dec.read_exact(&mut blob))?;
            let record = codec::decode(&blob)?;
            self.list.add(record, cancel)?;
        }

        let tag_len = err_at!(InvalidData, read_u32(&mut dec))? as usize;
        let mut tag_bytes = vec![0u8; tag_len];
        err_at!(InvalidData, dec.read_exact(&mut tag_bytes))?;
        let tags = TagIndex::from_binary(&tag_bytes)?;

        self.state.write().unwrap().tags = tags;
        self.on_modified();
        Ok(())
    }

    /// Signal the background index service to stop; it exits at its next
    /// wake, per spec.md §5 ("the orchestrator signals the service on
    /// dispose; the service exits at its next wake").
    pub fn shutdown(&self) {
        if let Some(service) = self.background.lock().unwrap().take() {
            service.stop();
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.shutdown();
        if let Err(err) = self.flush() {
            warn!("database: final flush on drop failed: {}", err);
        }
    }
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
#[path = "database_test.rs"]
mod database_test;
