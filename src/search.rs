//! The index-service contract (C10/C11 seam): when a search index is
//! invalidated, when it is rebuilt, and how it observes the store, per
//! spec.md §1 — "we specify only the index-service contract ... not the
//! algorithms themselves." No k-d tree, ball tree, HNSW or LSH lives here;
//! an embedding application supplies its own [SearchIndexBuilder].
//!
//! Grounded on `core::Index`/`core::Reader`'s split between an index type
//! and the read operations it serves, generalized to a boxed trait object
//! since the concrete algorithm is an external collaborator, not a type
//! parameter this crate can name.

use crate::{record::Id, record::Record, Result};

/// A built, queryable approximate-nearest-neighbor index over some snapshot
/// of the store's records. Opaque to this crate beyond this contract.
pub trait SearchIndex: Send + Sync {
    /// The `k` nearest neighbors of `query`, nearest first, as
    /// `(id, distance)` pairs. `algorithm` is an opaque hint (e.g. an
    /// index-specific strategy name); implementations that only support one
    /// strategy may ignore it.
    fn search(&self, query: &[f32], k: usize, algorithm: Option<&str>) -> Vec<(Id, f32)>;

    /// Every neighbor of `query` within `radius`, as `(id, distance)` pairs,
    /// in no particular order.
    fn range_search(&self, query: &[f32], radius: f32, algorithm: Option<&str>) -> Vec<(Id, f32)>;

    /// Number of records the index was built over.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a fresh [SearchIndex] from a full snapshot of the store's records.
/// Invoked by the background index service (C11) at the end of every debounce
/// window; never invoked concurrently with itself by this crate.
pub trait SearchIndexBuilder: Send + Sync {
    fn build(&self, records: &[Record]) -> Result<Box<dyn SearchIndex>>;
}

/// Exact linear scan over an explicit distance function. Used as the
/// deterministic fallback `Database::search` falls back to while a real
/// index is outdated or absent (see spec.md §4.10's open question,
/// resolved in DESIGN.md), and useful on its own for small stores or tests
/// that don't want to stand up a real ANN index.
pub fn linear_search<D>(records: &[Record], query: &[f32], k: usize, distance: D) -> Vec<(Id, f32)>
where
    D: Fn(&[f32], &[f32]) -> f32,
{
    let mut scored: Vec<(Id, f32)> = records
        .iter()
        .filter(|r| r.values.len() == query.len())
        .map(|r| (r.id, distance(&r.values, query)))
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

/// Same linear scan, but every neighbor within `radius` instead of the
/// nearest `k`.
pub fn linear_range_search<D>(records: &[Record], query: &[f32], radius: f32, distance: D) -> Vec<(Id, f32)>
where
    D: Fn(&[f32], &[f32]) -> f32,
{
    records
        .iter()
        .filter(|r| r.values.len() == query.len())
        .filter_map(|r| {
            let d = distance(&r.values, query);
            if d <= radius {
                Some((r.id, d))
            } else {
                None
            }
        })
        .collect()
}

/// Squared Euclidean distance. Not a product-quality distance-metric
/// library (out of scope per spec.md §1); just enough to exercise
/// [linear_search]/[linear_range_search] and the batch view in tests.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
#[path = "search_test.rs"]
mod search_test;
