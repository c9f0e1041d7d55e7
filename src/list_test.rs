use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::{Config, FlushPolicy};
use crate::durability::DurabilityManager;
use crate::record::Attributes;

fn fixture() -> (tempfile::TempDir, VectorList) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default().with_capacity(16).with_flush_policy(FlushPolicy::Immediate);
    let durability = Arc::new(DurabilityManager::new(config.flush_policy));
    let store = Store::open(
        dir.path().join("l_index.nbrly").as_os_str(),
        dir.path().join("l_data.nbrly").as_os_str(),
        dir.path().join("l_index.nbrly.wal").as_os_str(),
        &config,
        durability,
    )
    .unwrap();
    (dir, VectorList::new(Arc::new(store)))
}

fn rec(values: Vec<f32>) -> Record {
    Record { id: Id::generate(), values, original_text: String::new(), tags: vec![], attributes: Attributes::default() }
}

#[test]
fn test_add_emits_modified() {
    let (_dir, list) = fixture();
    let rx = list.subscribe();
    list.add(rec(vec![1.0]), None).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Modified::Added);
}

#[test]
fn test_update_emits_modified_only_when_found() {
    let (_dir, list) = fixture();
    let rx = list.subscribe();
    let a = rec(vec![1.0]);
    list.add(a.clone(), None).unwrap();
    rx.recv_timeout(Duration::from_secs(1)).unwrap();

    let mut missing = rec(vec![2.0]);
    missing.id = Id::generate();
    assert!(!list.update(missing, None).unwrap());
    assert!(rx.try_recv().is_err());

    let mut updated = a;
    updated.values = vec![9.0];
    assert!(list.update(updated, None).unwrap());
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Modified::Updated);
}

#[test]
fn test_remove_and_clear_emit_modified() {
    let (_dir, list) = fixture();
    let rx = list.subscribe();
    let a = rec(vec![1.0]);
    list.add(a.clone(), None).unwrap();
    rx.recv_timeout(Duration::from_secs(1)).unwrap();

    assert!(list.remove(&a, None).unwrap());
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Modified::Removed);

    list.add(rec(vec![3.0]), None).unwrap();
    rx.recv_timeout(Duration::from_secs(1)).unwrap();
    list.clear(None).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Modified::Cleared);
}

#[test]
fn test_insert_at_is_unsupported() {
    let (_dir, list) = fixture();
    let err = list.insert_at(0, rec(vec![1.0])).unwrap_err();
    assert!(matches!(err, crate::Error::Unsupported(_, _)));
}

#[test]
fn test_dropped_subscriber_is_pruned() {
    let (_dir, list) = fixture();
    {
        let _rx = list.subscribe();
    }
    // The dropped receiver's sender should be pruned on the next notify
    // without panicking or leaking.
    list.add(rec(vec![1.0]), None).unwrap();
    assert_eq!(list.broadcaster.subscribers.lock().unwrap().len(), 0);
}
