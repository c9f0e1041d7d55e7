//! Vector List Facade (C9): a thin, identifier-preserving wrapper around
//! [Store] (C7) that emits a `Modified` event after every successful
//! mutation, per spec.md §4.9.
//!
//! Grounded on the teacher's `core::Writer`/`core::Reader` split: a facade
//! trait that forwards to an underlying engine without adding state of its
//! own, generalized here to a concrete wrapper (the store has no alternate
//! backend to abstract over) plus the one piece of new behavior the spec
//! calls for: a change-notification channel the orchestrator (C10) and
//! background service (C11) subscribe to instead of polling.

use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc, Mutex,
};

use crate::{
    cancel::CancelToken,
    err_at,
    record::{Id, Record},
    store::{Iter, Store},
    Result,
};

/// What changed. Carries no payload beyond the kind of change: subscribers
/// (the background index service) only need to know that *something*
/// happened, not what, since a rebuild re-derives everything from the
/// store's current content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modified {
    Added,
    Updated,
    Removed,
    Cleared,
}

/// Broadcasts [Modified] events to every live subscriber. A subscriber
/// that stops polling (its receiver dropped) is pruned lazily on the next
/// send, mirroring the memory-pressure monitor's dead-weak-reference reap.
#[derive(Default)]
struct Broadcaster {
    subscribers: Mutex<Vec<Sender<Modified>>>,
}

impl Broadcaster {
    fn subscribe(&self) -> Receiver<Modified> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    fn notify(&self, event: Modified) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

/// Identifier-preserving facade over a [Store]. Forwards every read and
/// mutating operation; `insert_at` is deliberately absent from this type's
/// API (there is no positional-insert method to call), and any caller
/// reaching for one gets `Unsupported` via [VectorList::insert_at].
pub struct VectorList {
    store: Arc<Store>,
    broadcaster: Broadcaster,
}

impl VectorList {
    pub fn new(store: Arc<Store>) -> VectorList {
        VectorList { store, broadcaster: Broadcaster::default() }
    }

    /// Subscribe to `Modified` events raised by this facade's mutations.
    pub fn subscribe(&self) -> Receiver<Modified> {
        self.broadcaster.subscribe()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn add(&self, record: Record, cancel: Option<&CancelToken>) -> Result<()> {
        self.store.add(record, cancel)?;
        self.broadcaster.notify(Modified::Added);
        Ok(())
    }

    pub fn update(&self, record: Record, cancel: Option<&CancelToken>) -> Result<bool> {
        let found = self.store.update(record, cancel)?;
        if found {
            self.broadcaster.notify(Modified::Updated);
        }
        Ok(found)
    }

    pub fn remove_by_id(&self, id: Id, cancel: Option<&CancelToken>) -> Result<bool> {
        let found = self.store.remove_by_id(id, cancel)?;
        if found {
            self.broadcaster.notify(Modified::Removed);
        }
        Ok(found)
    }

    pub fn remove(&self, record: &Record, cancel: Option<&CancelToken>) -> Result<bool> {
        self.remove_by_id(record.id, cancel)
    }

    pub fn clear(&self, cancel: Option<&CancelToken>) -> Result<()> {
        self.store.clear(cancel)?;
        self.broadcaster.notify(Modified::Cleared);
        Ok(())
    }

    /// Forbidden by contract, per spec.md §4.9: the store has no positional
    /// slots to insert into without displacing existing logical indices.
    pub fn insert_at(&self, _index: usize, _record: Record) -> Result<()> {
        err_at!(Unsupported, msg: "insert_at is not supported by the vector list facade")
    }

    pub fn get(&self, index: usize) -> Result<Option<Record>> {
        self.store.get(index)
    }

    pub fn get_by_id(&self, id: Id) -> Result<Option<Record>> {
        self.store.get_by_id(id)
    }

    pub fn index_of(&self, id: Id) -> Result<i64> {
        self.store.index_of(id)
    }

    pub fn iterate(&self) -> Iter<'_> {
        self.store.iterate()
    }

    pub fn copy_to(&self, buffer: &mut [Option<Record>], start: usize) -> Result<()> {
        self.store.copy_to(buffer, start)
    }

    pub fn calculate_fragmentation(&self) -> Result<u32> {
        self.store.calculate_fragmentation()
    }

    pub fn defragment(&self, cancel: Option<&CancelToken>) -> Result<()> {
        self.store.defragment(cancel)
    }

    pub fn defragment_batch(&self, cancel: Option<&CancelToken>) -> Result<u32> {
        self.store.defragment_batch(cancel)
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    pub fn release_mapped_memory(&self) -> Result<()> {
        self.store.release_mapped_memory()
    }

    /// Escape hatch for the orchestrator (C10), which needs the underlying
    /// store to register it with the memory-pressure monitor.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A clonable handle to the underlying store, for registering it with
    /// the memory-pressure monitor ([crate::memory_pressure::PressureResponder]
    /// is implemented on [Store], not on this facade).
    pub fn store_handle(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }
}

#[cfg(test)]
#[path = "list_test.rs"]
mod list_test;
