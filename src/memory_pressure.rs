//! Memory-Pressure Monitor (C5): observes process memory and asks
//! registered stores to flush and release view handles, per spec.md §4.5.
//!
//! Grounded on the teacher's dedicated-thread-with-stop-flag worker shape
//! (seen in `util::thread::Thread`'s join-on-drop discipline, reused here
//! directly with `thread::spawn` rather than that module's generic
//! request/response channel, which this one-way sampler has no use for)
//! and `sys::system::MemInfo`'s field shape, generalized from a static
//! snapshot struct to a periodic sampler backed by the real `sys-info`
//! crate. Holds only weak references to registered stores per spec.md §9's
//! redesign note ("Global mutable state in the memory-pressure monitor ...
//! the monitor holds only weak references").

use log::info;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Weak,
    },
    thread,
    time::Duration,
};

use crate::Result;

/// Default absolute process-RSS growth, in kilobytes, that triggers an
/// intervention: 200 MiB.
pub const DEFAULT_GROWTH_THRESHOLD_KB: u64 = 200 * 1024;

/// A store (or any resource holder) the monitor can ask to release memory.
pub trait PressureResponder: Send + Sync {
    /// Flush pending writes and release mapped views. Must tolerate being
    /// called on an already-disposed store (a no-op in that case).
    fn on_memory_pressure(&self) -> Result<()>;
}

struct Registration {
    target: Weak<dyn PressureResponder>,
}

/// Periodic observer of process memory. One monitor is typically shared
/// process-wide and injected into every store at construction.
pub struct MemoryPressureMonitor {
    registered: Mutex<Vec<Registration>>,
    growth_threshold_kb: u64,
    baseline_kb: Mutex<Option<u64>>,
    stop: Arc<AtomicBool>,
}

impl MemoryPressureMonitor {
    pub fn new(growth_threshold_kb: u64) -> Arc<MemoryPressureMonitor> {
        Arc::new(MemoryPressureMonitor {
            registered: Mutex::new(Vec::new()),
            growth_threshold_kb,
            baseline_kb: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register a store. The monitor keeps only a weak reference; dead
    /// entries are reaped on the next tick.
    pub fn register(&self, target: &Arc<dyn PressureResponder>) {
        self.registered.lock().unwrap().push(Registration {
            target: Arc::downgrade(target),
        });
    }

    /// Spawn the sleep-loop worker at `interval_ms`. Dropping the returned
    /// handle's last clone (or calling `stop`) ends the loop within one
    /// sleep interval.
    pub fn spawn(self: &Arc<Self>, interval_ms: u64) -> thread::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let stop = Arc::clone(&self.stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(interval_ms));
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                monitor.tick();
            }
        })
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Sample current process memory and, if it has grown past the
    /// threshold since the last tick's baseline, intervene on every live
    /// registered store. Reaps dead weak references along the way.
    pub fn tick(&self) {
        let current_kb = match sys_info::mem_info() {
            Ok(info) => info.total.saturating_sub(info.avail),
            Err(_) => return,
        };

        let mut baseline = self.baseline_kb.lock().unwrap();
        let grown = match *baseline {
            Some(base) => current_kb.saturating_sub(base) >= self.growth_threshold_kb,
            None => false,
        };
        *baseline = Some(current_kb);
        drop(baseline);

        if !grown {
            return;
        }

        info!(
            "memory-pressure: growth threshold crossed ({} KB), intervening on {} registered stores",
            self.growth_threshold_kb,
            self.registered.lock().unwrap().len()
        );

        let mut guard = self.registered.lock().unwrap();
        guard.retain(|reg| reg.target.upgrade().is_some());
        let targets: Vec<_> = guard.iter().filter_map(|r| r.target.upgrade()).collect();
        drop(guard);

        for target in targets {
            target.on_memory_pressure().ok();
        }
    }
}

#[cfg(test)]
#[path = "memory_pressure_test.rs"]
mod memory_pressure_test;
