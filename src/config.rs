//! Store-wide configuration, per spec.md §6.

use serde::{Deserialize, Serialize};

use std::ffi;

use crate::util;
use crate::Result;

/// Flush policy for the durability manager (C2), per spec.md §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FlushPolicy {
    /// Never auto-flush; caller must call `flush()` explicitly.
    None,
    /// Flush after every recorded operation.
    Immediate,
    /// Flush every `n` recorded operations.
    Batched(usize),
    /// Flush every `ms` milliseconds, iff an operation occurred since.
    Timer(u64),
}

impl Default for FlushPolicy {
    fn default() -> Self {
        FlushPolicy::Batched(100)
    }
}

impl<'a> arbitrary::Arbitrary<'a> for FlushPolicy {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(match u.int_in_range(0..=3)? {
            0 => FlushPolicy::None,
            1 => FlushPolicy::Immediate,
            2 => FlushPolicy::Batched(*u.choose(&[10, 50, 100, 500])?),
            _ => FlushPolicy::Timer(*u.choose(&[100, 500, 1000, 5000])?),
        })
    }
}

/// Configuration for a store, its durability manager, and the orchestrator's
/// background services. Mirrors spec.md §6 field-for-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of records the store can hold without defragmenting.
    pub capacity: usize,
    /// Data-file capacity budget per record slot, in bytes; spec.md §3's
    /// "physical size budget = capacity × 4,096 bytes", exposed so callers
    /// whose average record is far from 4 KiB (spec.md §9's open question)
    /// can adjust it instead of over- or under-provisioning the data file.
    pub bytes_per_record: u64,
    pub flush_policy: FlushPolicy,
    /// Number of records processed per `defragment_batch()` call.
    pub batch_size: usize,
    pub timer_interval_ms: u64,
    /// Fragmentation percent above which `defragment`/`defragment_batch`
    /// is worth running; `0` disables the hint entirely.
    pub defrag_threshold_percent: u32,
    pub ssd_hint: bool,
    pub background_index_delay_ms: u64,
    pub memory_pressure_check_interval_ms: u64,
    pub platform_allows_background_index: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            capacity: 1024,
            bytes_per_record: 4096,
            flush_policy: FlushPolicy::default(),
            batch_size: 100,
            timer_interval_ms: 1000,
            defrag_threshold_percent: 75,
            ssd_hint: true,
            background_index_delay_ms: 5_000,
            memory_pressure_check_interval_ms: 30_000,
            platform_allows_background_index: true,
        }
    }
}

impl<'a> arbitrary::Arbitrary<'a> for Config {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Config {
            capacity: *u.choose(&[16, 128, 1024, 16_384])?,
            bytes_per_record: *u.choose(&[256u64, 1024, 4096, 16_384])?,
            flush_policy: u.arbitrary()?,
            batch_size: *u.choose(&[10, 50, 100])?,
            timer_interval_ms: *u.choose(&[100, 1000])?,
            defrag_threshold_percent: *u.choose(&[0, 50, 75, 90])?,
            ssd_hint: u.arbitrary()?,
            background_index_delay_ms: *u.choose(&[1000, 5000])?,
            memory_pressure_check_interval_ms: *u.choose(&[5000, 30_000])?,
            platform_allows_background_index: u.arbitrary()?,
        })
    }
}

impl Config {
    /// Load a `nbrly.toml` file. Mirrors the teacher's `util::load_toml`.
    pub fn from_toml_file(loc: &ffi::OsStr) -> Result<Config> {
        util::load_toml(std::path::Path::new(loc))
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    pub fn with_bytes_per_record(mut self, bytes_per_record: u64) -> Self {
        self.bytes_per_record = bytes_per_record;
        self
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
