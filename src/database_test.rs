use std::sync::Arc;

use super::*;
use crate::config::{Config, FlushPolicy};
use crate::durability::DurabilityManager;
use crate::record::Attributes;
use crate::search::{squared_euclidean, SearchIndex, SearchIndexBuilder};

fn fixture() -> (tempfile::TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default().with_capacity(64).with_flush_policy(FlushPolicy::Immediate);
    config.platform_allows_background_index = false;
    let durability = Arc::new(DurabilityManager::new(config.flush_policy));
    let paths = DatabasePaths::new(dir.path(), "db");
    let db = Database::open(&paths, config, durability, None, None).unwrap();
    (dir, db)
}

fn rec(id: u128, values: Vec<f32>) -> Record {
    Record { id: Id::from(id), values, original_text: "hi".to_string(), tags: vec![7], attributes: Attributes::default() }
}

#[test]
fn test_add_get_roundtrip() {
    let (_dir, db) = fixture();
    db.add(rec(1, vec![1.0, 2.0, 3.0]), None).unwrap();
    assert_eq!(db.count(), 1);
    let got = db.get_by_id(Id::from(1)).unwrap().unwrap();
    assert_eq!(got.values, vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_search_falls_back_to_linear_when_outdated() {
    let (_dir, db) = fixture();
    db.add(rec(1, vec![0.0, 0.0]), None).unwrap();
    db.add(rec(2, vec![10.0, 10.0]), None).unwrap();
    assert!(db.is_index_outdated());

    let results = db.search(&[0.0, 0.0], 1, None).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, Id::from(1));
}

struct StubIndex {
    records: Vec<Record>,
}

impl SearchIndex for StubIndex {
    fn search(&self, query: &[f32], k: usize, _algorithm: Option<&str>) -> Vec<(Id, f32)> {
        crate::search::linear_search(&self.records, query, k, squared_euclidean)
    }
    fn range_search(&self, query: &[f32], radius: f32, _algorithm: Option<&str>) -> Vec<(Id, f32)> {
        crate::search::linear_range_search(&self.records, query, radius, squared_euclidean)
    }
    fn len(&self) -> usize {
        self.records.len()
    }
}

struct StubBuilder;

impl SearchIndexBuilder for StubBuilder {
    fn build(&self, records: &[Record]) -> Result<Box<dyn SearchIndex>> {
        Ok(Box::new(StubIndex { records: records.to_vec() }))
    }
}

#[test]
fn test_rebuild_search_indexes_uses_builder() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default().with_capacity(64).with_flush_policy(FlushPolicy::Immediate);
    config.platform_allows_background_index = false;
    let durability = Arc::new(DurabilityManager::new(config.flush_policy));
    let paths = DatabasePaths::new(dir.path(), "db");
    let db = Database::open(&paths, config, durability, None, Some(Arc::new(StubBuilder))).unwrap();

    db.add(rec(1, vec![0.0, 0.0]), None).unwrap();
    db.rebuild_search_indexes().unwrap();
    assert!(!db.is_index_outdated());

    let results = db.search(&[0.0, 0.0], 1, None).unwrap();
    assert_eq!(results[0].0, Id::from(1));
}

#[test]
fn test_rebuild_tags_populates_index() {
    let (_dir, db) = fixture();
    db.add(rec(1, vec![1.0]), None).unwrap();
    db.rebuild_tags().unwrap();
    assert_eq!(db.get_ids_by_tag(7).len(), 1);
}

#[test]
fn test_save_and_load_round_trip() {
    let (_dir, db) = fixture();
    db.add(rec(1, vec![1.0, 2.0]), None).unwrap();
    db.add(rec(2, vec![3.0, 4.0]), None).unwrap();
    db.rebuild_tags().unwrap();

    let save_path = _dir.path().join("snapshot.bin");
    db.save(&save_path).unwrap();

    let dir2 = tempfile::tempdir().unwrap();
    let mut config = Config::default().with_capacity(64).with_flush_policy(FlushPolicy::Immediate);
    config.platform_allows_background_index = false;
    let durability = Arc::new(DurabilityManager::new(config.flush_policy));
    let paths = DatabasePaths::new(dir2.path(), "restored");
    let restored = Database::open(&paths, config, durability, None, None).unwrap();
    restored.load(&save_path, false, None).unwrap();

    assert_eq!(restored.count(), 2);
    assert_eq!(restored.get_by_id(Id::from(1)).unwrap().unwrap().values, vec![1.0, 2.0]);
    assert_eq!(restored.get_ids_by_tag(7).len(), 2);
}

#[test]
fn test_load_missing_file_create_on_new() {
    let (_dir, db) = fixture();
    let missing = _dir.path().join("absent.bin");
    db.load(&missing, true, None).unwrap();
    assert_eq!(db.count(), 0);
}

#[test]
fn test_load_missing_file_without_create_on_new_fails() {
    let (_dir, db) = fixture();
    let missing = _dir.path().join("absent.bin");
    assert!(db.load(&missing, false, None).is_err());
}

#[test]
fn test_remove_marks_modified() {
    let (_dir, db) = fixture();
    db.add(rec(1, vec![1.0]), None).unwrap();
    db.rebuild_tags().unwrap();
    assert!(!db.is_tags_outdated());
    assert!(db.remove(Id::from(1), None).unwrap());
    assert!(db.is_tags_outdated());
    assert_eq!(db.count(), 0);
}
