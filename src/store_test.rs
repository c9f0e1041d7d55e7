use std::sync::Arc;

use super::*;
use crate::config::{Config, FlushPolicy};
use crate::durability::DurabilityManager;
use crate::record::Attributes;
use crate::Error;

struct Fixture {
    _dir: tempfile::TempDir,
    index_path: std::ffi::OsString,
    data_path: std::ffi::OsString,
    wal_path: std::ffi::OsString,
    config: Config,
}

fn fixture(capacity: usize, bytes_per_record: u64) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default()
        .with_capacity(capacity)
        .with_bytes_per_record(bytes_per_record)
        .with_flush_policy(FlushPolicy::Immediate);
    Fixture {
        index_path: dir.path().join("t_index.nbrly").into_os_string(),
        data_path: dir.path().join("t_data.nbrly").into_os_string(),
        wal_path: dir.path().join("t_index.nbrly.wal").into_os_string(),
        _dir: dir,
        config,
    }
}

fn open(fx: &Fixture) -> Store {
    let durability = Arc::new(DurabilityManager::new(fx.config.flush_policy));
    Store::open(&fx.index_path, &fx.data_path, &fx.wal_path, &fx.config, durability).unwrap()
}

fn record(values: Vec<f32>, text: &str, tags: Vec<i16>) -> Record {
    Record {
        id: Id::generate(),
        values,
        original_text: text.to_string(),
        tags,
        attributes: Attributes::default(),
    }
}

#[test]
fn test_add_get() {
    let fx = fixture(1_024, 4096);
    let store = open(&fx);

    let a = record(vec![1.0, 2.0, 3.0], "alpha", vec![7]);
    store.add(a.clone(), None).unwrap();

    assert_eq!(store.count(), 1);
    let by_index = store.get(0).unwrap().unwrap();
    let by_id = store.get_by_id(a.id).unwrap().unwrap();
    assert!(by_index.values_eq(&a));
    assert_eq!(by_index.original_text, a.original_text);
    assert_eq!(by_index.tags, a.tags);
    assert!(by_id.values_eq(&a));
}

#[test]
fn test_update_in_place_keeps_offset() {
    let fx = fixture(16, 4096);
    let store = open(&fx);

    let mut b = record(vec![0.0; 128], "b", vec![]);
    store.add(b.clone(), None).unwrap();
    let before = store.index_of(b.id).unwrap();

    b.values = vec![1.0; 128];
    assert!(store.update(b.clone(), None).unwrap());

    let after = store.get_by_id(b.id).unwrap().unwrap();
    assert_eq!(after.values[0], 1.0);
    assert_eq!(store.index_of(b.id).unwrap(), before);
}

#[test]
fn test_update_grows_relocates_to_tail() {
    let fx = fixture(16, 4096);
    let store = open(&fx);

    let mut c = record(vec![0.0; 8], "", vec![]);
    store.add(c.clone(), None).unwrap();
    let other = record(vec![0.0; 8], "", vec![]);
    store.add(other, None).unwrap();

    let prior_max_end = store.state.read().unwrap().data_cursor;

    c.values = vec![0.0; 64];
    assert!(store.update(c.clone(), None).unwrap());

    let (_, entry) = store.find_entry_locked(&store.state.read().unwrap(), c.id).unwrap().unwrap();
    assert_eq!(entry.offset, prior_max_end);
}

#[test]
fn test_remove_and_iterate_order() {
    let fx = fixture(16, 4096);
    let store = open(&fx);

    let a = record(vec![1.0], "a", vec![]);
    let b = record(vec![2.0], "b", vec![]);
    let c = record(vec![3.0], "c", vec![]);
    store.add(a.clone(), None).unwrap();
    store.add(b.clone(), None).unwrap();
    store.add(c.clone(), None).unwrap();

    assert!(store.remove_by_id(b.id, None).unwrap());

    let ids: Vec<Id> = store.iterate().map(|r| r.unwrap().id).collect();
    assert_eq!(ids, vec![a.id, c.id]);
    assert_eq!(store.count(), 2);
    assert_eq!(store.get(1).unwrap().unwrap().id, c.id);
}

#[test]
fn test_remove_nonexistent_returns_false() {
    let fx = fixture(16, 4096);
    let store = open(&fx);
    assert!(!store.remove_by_id(Id::generate(), None).unwrap());
}

#[test]
fn test_fragmentation_and_batched_defrag() {
    let fx = fixture(1_100, 4096);
    let store = open(&fx);

    let mut ids = Vec::new();
    for i in 0..1_000 {
        let r = record(vec![i as f32; 4], "", vec![]);
        ids.push(r.id);
        store.add(r, None).unwrap();
    }
    for (i, id) in ids.iter().enumerate() {
        if i % 2 == 1 {
            store.remove_by_id(*id, None).unwrap();
        }
    }
    let surviving: Vec<Id> = ids.iter().step_by(2).cloned().collect();

    let frag = store.calculate_fragmentation().unwrap();
    assert!((40..=60).contains(&frag), "fragmentation was {}", frag);

    loop {
        let remaining = store.defragment_batch(None).unwrap();
        if remaining == 0 {
            break;
        }
    }

    assert_eq!(store.calculate_fragmentation().unwrap(), 0);
    let after: Vec<Id> = store.iterate().map(|r| r.unwrap().id).collect();
    assert_eq!(after, surviving);
    assert_eq!(store.count(), 500);
}

#[test]
fn test_defragment_blocking_reaches_zero() {
    let fx = fixture(32, 4096);
    let store = open(&fx);

    let mut ids = Vec::new();
    for _ in 0..10 {
        let r = record(vec![1.0; 4], "", vec![]);
        ids.push(r.id);
        store.add(r, None).unwrap();
    }
    for id in ids.iter().step_by(2) {
        store.remove_by_id(*id, None).unwrap();
    }

    store.defragment(None).unwrap();
    assert_eq!(store.calculate_fragmentation().unwrap(), 0);
}

#[test]
fn test_insufficient_index_capacity() {
    let fx = fixture(1, 4096);
    let store = open(&fx);
    store.add(record(vec![1.0], "", vec![]), None).unwrap();
    let err = store.add(record(vec![1.0], "", vec![]), None).unwrap_err();
    assert!(matches!(err, Error::InsufficientCapacity(_, _)));
}

#[test]
fn test_insufficient_data_capacity() {
    let fx = fixture(16, 16);
    let store = open(&fx);
    let err = store
        .add(record(vec![0.0; 64], "way too big for this data file", vec![]), None)
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientCapacity(_, _)));
}

#[test]
fn test_copy_to_out_of_bounds() {
    let fx = fixture(16, 4096);
    let store = open(&fx);
    store.add(record(vec![1.0], "", vec![]), None).unwrap();

    let mut buf = vec![None, None];
    let err = store.copy_to(&mut buf, 0).unwrap_err();
    assert!(matches!(err, Error::OutOfBounds(_, _)));
}

#[test]
fn test_copy_to_fills_buffer() {
    let fx = fixture(16, 4096);
    let store = open(&fx);
    let a = record(vec![1.0], "", vec![]);
    let b = record(vec![2.0], "", vec![]);
    store.add(a.clone(), None).unwrap();
    store.add(b.clone(), None).unwrap();

    let mut buf = vec![None, None];
    store.copy_to(&mut buf, 0).unwrap();
    assert_eq!(buf[0].as_ref().unwrap().id, a.id);
    assert_eq!(buf[1].as_ref().unwrap().id, b.id);
}

#[test]
fn test_cancelled_token_aborts_before_lock() {
    let fx = fixture(16, 4096);
    let store = open(&fx);
    let token = CancelToken::new();
    token.cancel();
    let err = store.add(record(vec![1.0], "", vec![]), Some(&token)).unwrap_err();
    assert!(matches!(err, Error::Cancelled(_, _)));
    assert_eq!(store.count(), 0);
}

#[test]
fn test_crash_between_log_and_write_replays_on_reopen() {
    let fx = fixture(16, 4096);
    let id = Id::generate();
    {
        let durability = Arc::new(DurabilityManager::new(fx.config.flush_policy));
        let store =
            Store::open(&fx.index_path, &fx.data_path, &fx.wal_path, &fx.config, durability).unwrap();
        // Simulate a crash between `wal.log` and the paired index/data
        // write: log the entry directly and never apply it.
        let r = Record {
            id,
            values: vec![1.0, 2.0],
            original_text: "crash".to_string(),
            tags: vec![],
            attributes: Attributes::default(),
        };
        let bytes = codec::encode(&r);
        store
            .wal
            .lock()
            .unwrap()
            .log(&WalEntry::add(id, bytes, 0, 0))
            .unwrap();
        // store dropped here without ever applying or committing.
    }

    let store = open(&fx);
    let recovered = store.get_by_id(id).unwrap().unwrap();
    assert_eq!(recovered.original_text, "crash");
    assert_eq!(store.count(), 1);
}

#[test]
fn test_clear_resets_store_and_reopen_sees_empty() {
    let fx = fixture(16, 4096);
    {
        let store = open(&fx);
        store.add(record(vec![1.0], "", vec![]), None).unwrap();
        store.add(record(vec![2.0], "", vec![]), None).unwrap();
        store.clear(None).unwrap();
        assert_eq!(store.count(), 0);
    }
    let store = open(&fx);
    assert_eq!(store.count(), 0);
    assert!(store.iterate().next().is_none());
}

#[test]
fn test_corrupt_data_file_triggers_repair_on_open() {
    let fx = fixture(16, 4096);
    let a_id;
    {
        let store = open(&fx);
        let a = record(vec![1.0; 4], "", vec![]);
        a_id = a.id;
        store.add(a, None).unwrap();
        store.add(record(vec![2.0; 4], "", vec![]), None).unwrap();
    }

    // Truncate the data file so the second entry's region is now
    // out-of-bounds, simulating a torn write.
    let data_len = std::fs::metadata(&fx.data_path).unwrap().len();
    let truncated = data_len / 2;
    let f = std::fs::OpenOptions::new().write(true).open(&fx.data_path).unwrap();
    f.set_len(truncated).unwrap();
    drop(f);

    let store = open(&fx);
    assert!(store.get_by_id(a_id).unwrap().is_some());
}

#[test]
fn test_reopen_recovers_capacity_from_disk_not_config() {
    let fx = fixture(64, 4096);
    let mut ids = Vec::new();
    {
        // Created with a 64-record capacity; fill past where a smaller,
        // differently-configured reopen would think the index ends.
        let store = open(&fx);
        for i in 0..20u32 {
            let r = record(vec![i as f32], "", vec![]);
            ids.push(r.id);
            store.add(r, None).unwrap();
        }
    }

    // Reopen the same on-disk family with a *different*, smaller `Config`
    // (the default: 1,024... but crucially not 64) than the one the store
    // was created with. Recovery must come from the files themselves, not
    // from this freshly supplied capacity.
    let small_config = Config::default()
        .with_capacity(4)
        .with_bytes_per_record(4096)
        .with_flush_policy(FlushPolicy::Immediate);
    let durability = Arc::new(DurabilityManager::new(small_config.flush_policy));
    let store =
        Store::open(&fx.index_path, &fx.data_path, &fx.wal_path, &small_config, durability).unwrap();

    assert_eq!(store.capacity(), 64, "capacity must be recovered from the index file, not Config");
    assert_eq!(store.count(), 20);
    for id in &ids {
        assert!(store.get_by_id(*id).unwrap().is_some(), "record {:?} lost after reopen", id);
    }

    // The recovered store must still accept writes up to its true, on-disk
    // capacity, not the smaller configured one.
    for i in 20..64u32 {
        store.add(record(vec![i as f32], "", vec![]), None).unwrap();
    }
    assert_eq!(store.count(), 64);
}

#[test]
fn test_growing_update_between_defrag_batches_does_not_corrupt() {
    let mut fx = fixture(64, 4096);
    // Small batch size so a full defrag pass spans several calls, leaving
    // room to interleave a concurrent writer between them.
    fx.config.batch_size = 2;
    let store = open(&fx);

    let mut ids = Vec::new();
    for _ in 0..10 {
        let r = record(vec![1.0; 8], "", vec![]);
        ids.push(r.id);
        store.add(r, None).unwrap();
    }
    // Remove every other record to create fragmentation.
    for id in ids.iter().step_by(2) {
        store.remove_by_id(*id, None).unwrap();
    }
    let surviving: Vec<Id> = ids.iter().skip(1).step_by(2).cloned().collect();

    assert!(store.calculate_fragmentation().unwrap() > 0);

    // Run one batch, then grow a surviving record (relocating it to the
    // data file's tail, past the pre-defrag plan's snapshot) before the
    // defrag pass has finished, then run the rest to completion.
    assert!(store.defragment_batch(None).unwrap() > 0);

    let grown_id = surviving[0];
    let mut grown = store.get_by_id(grown_id).unwrap().unwrap();
    grown.values = vec![2.0; 256];
    assert!(store.update(grown.clone(), None).unwrap());

    // Also add a brand-new record mid-pass, another case the snapshotted
    // plan never accounted for.
    let fresh = record(vec![9.0; 8], "fresh", vec![]);
    store.add(fresh.clone(), None).unwrap();

    loop {
        let remaining = store.defragment_batch(None).unwrap();
        if remaining == 0 {
            break;
        }
    }

    assert_eq!(store.calculate_fragmentation().unwrap(), 0);

    // Every surviving record, including the one grown mid-pass and the one
    // added mid-pass, must still read back correctly and without any
    // overlap in the data file.
    let after = store.get_by_id(grown_id).unwrap().unwrap();
    assert!(after.values_eq(&grown));
    let after_fresh = store.get_by_id(fresh.id).unwrap().unwrap();
    assert!(after_fresh.values_eq(&fresh));

    for id in &surviving {
        assert!(store.get_by_id(*id).unwrap().is_some(), "record {:?} lost after interleaved defrag", id);
    }
    assert_eq!(store.count(), surviving.len() + 1);

    // No two live entries may overlap: re-derive fragmentation from a
    // fully independent pass over the data to make sure nothing aliases.
    let mut extents: Vec<(u64, u64)> = store
        .iterate()
        .map(|r| r.unwrap())
        .map(|r| {
            let (_, e) = store.find_entry_locked(&store.state.read().unwrap(), r.id).unwrap().unwrap();
            (e.offset, e.offset + e.length as u64)
        })
        .collect();
    extents.sort();
    for w in extents.windows(2) {
        assert!(w[0].1 <= w[1].0, "overlapping data extents: {:?} and {:?}", w[0], w[1]);
    }
}
