//! nbrly is the durable, concurrent, disk-backed vector store at the core
//! of an embeddable vector database: a fixed-capacity, memory-mapped
//! key/value engine whose values are fixed-schema vector records keyed by
//! a 128-bit identifier, together with its write-ahead log, durability
//! manager, tombstone/defragmentation machinery, corruption-recovery
//! logic, memory-pressure responder, and the background index-maintenance
//! loop that keeps an approximate-nearest-neighbor index eventually
//! consistent with the store.
//!
//! This crate does not implement a gRPC/REST surface, embedding
//! generation, import/export codecs, or concrete ANN algorithms (k-d
//! tree, ball tree, HNSW, LSH) — those are external collaborators. It
//! specifies and implements the index-service *contract* ([search]) that
//! such a collaborator plugs into.
//!
//! # Layering
//!
//! - [mmapfile] (C1), [durability] (C2), [wal] (C3), [corruption] (C4),
//!   [memory_pressure] (C5), [codec] (C6) are the leaf components the
//!   store composes.
//! - [store] (C7) is the core: the durable, concurrent record store.
//! - [tags] (C8) is the separately maintained tag index.
//! - [list] (C9) is a thin, identifier-preserving facade over the store
//!   that emits change notifications.
//! - [database] (C10) is the top-level orchestrator: store + tags +
//!   replaceable search index, behind a reader-writer discipline.
//! - [background] (C11) is the debounced background index-maintenance
//!   worker.
//! - [batch] (C12) is the aligned, zero-copy batch view used by
//!   vectorized distance kernels.

pub mod background;
pub mod batch;
pub mod cancel;
pub mod codec;
pub mod config;
pub mod corruption;
pub mod database;
pub mod durability;
mod error;
pub mod filenames;
pub mod list;
pub mod memory_pressure;
pub mod mmapfile;
mod platform;
pub mod record;
pub mod search;
pub mod store;
pub mod tags;
mod util;
pub mod wal;

pub use crate::background::BackgroundIndexService;
pub use crate::batch::Batch;
pub use crate::cancel::CancelToken;
pub use crate::config::{Config, FlushPolicy};
pub use crate::database::{Database, DatabasePaths};
pub use crate::durability::DurabilityManager;
pub use crate::error::{Error, Result};
pub use crate::list::{Modified, VectorList};
pub use crate::memory_pressure::MemoryPressureMonitor;
pub use crate::record::{Attributes, Id, Record};
pub use crate::search::{SearchIndex, SearchIndexBuilder};
pub use crate::store::Store;
pub use crate::tags::TagIndex;
