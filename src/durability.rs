//! Durability Manager (C2): flushes registered mapped files per a policy,
//! per spec.md §4.2.
//!
//! Grounded on `robt::thread_flush`'s use of an advisory shared lock around
//! a writer's sync (`fd.lock_shared()? ... fd.sync_all()? ... fd.unlock()?`):
//! this manager takes the same advisory lock around each file's flush so a
//! concurrent exclusive-locking reader (e.g. a backup tool) is respected,
//! then delegates the actual sync to the platform primitive in
//! [crate::platform].
//!
//! `FlushPolicy::Timer` needs a clock independent of caller activity: a
//! write followed by silence must still be flushed on its own schedule, not
//! only on the next unrelated mutation. `Shared` (the registered-files,
//! op-count and flush-clock state) sits behind its own `Arc` so a dedicated
//! timer thread can hold it without holding the `DurabilityManager` handle
//! itself — the same split [crate::memory_pressure::MemoryPressureMonitor]
//! makes with its weakly-held registrations, here used to let the manager's
//! `Drop` stop and join the thread instead of the thread keeping the
//! manager alive forever.

use fs2::FileExt;
use log::warn;

use std::{
    ffi,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{config::FlushPolicy, err_at, platform, util, Result};

/// Anything the durability manager can flush: a view flush followed by a
/// platform sync of the backing file.
pub trait Durable: Send {
    fn flush_view(&mut self) -> Result<()>;
    fn filename(&self) -> ffi::OsString;
}

struct Registration {
    target: Arc<Mutex<dyn Durable>>,
}

/// State shared between [DurabilityManager] and its `Timer`-policy worker
/// thread, if one is running.
struct Shared {
    policy: FlushPolicy,
    registered: Mutex<Vec<Registration>>,
    op_count: AtomicU64,
    last_flush_at: Mutex<Instant>,
    /// `op_count` as of the last successful flush; compared against the
    /// current `op_count` so a due-but-idle timer tick flushes nothing, per
    /// spec.md §4.2's "iff at least one operation occurred since the last
    /// flush."
    last_flush_op_count: AtomicU64,
}

impl Shared {
    fn register(&self, target: Arc<Mutex<dyn Durable>>) {
        self.registered.lock().unwrap().push(Registration { target });
    }

    /// Called once per recorded mutation. Decides whether this operation's
    /// policy threshold has been crossed and flushes if so.
    fn record_op(&self) -> Result<()> {
        let count = self.op_count.fetch_add(1, Ordering::SeqCst) + 1;
        match self.policy {
            FlushPolicy::None => Ok(()),
            FlushPolicy::Immediate => self.flush_all(),
            FlushPolicy::Batched(n) if n > 0 && count % (n as u64) == 0 => self.flush_all(),
            FlushPolicy::Batched(_) => Ok(()),
            FlushPolicy::Timer(ms) => self.flush_if_due(ms),
        }
    }

    /// Invoked both lazily by `record_op` and independently by the dedicated
    /// timer thread (see `spawn_timer`). Flushes iff the interval has
    /// elapsed *and* at least one operation has landed since the last flush.
    fn flush_if_due(&self, interval_ms: u64) -> Result<()> {
        let due = {
            let last = self.last_flush_at.lock().unwrap();
            last.elapsed() >= Duration::from_millis(interval_ms)
        };
        if !due {
            return Ok(());
        }
        let current = self.op_count.load(Ordering::SeqCst);
        if current == self.last_flush_op_count.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.flush_all()
    }

    /// Flush every registered file. Best-effort: a failure on one file is
    /// logged and does not prevent flushing its siblings, per spec.md §7.
    fn flush_all(&self) -> Result<()> {
        let targets: Vec<_> = {
            let guard = self.registered.lock().unwrap();
            guard.iter().map(|r| Arc::clone(&r.target)).collect()
        };
        for target in targets {
            let mut target = target.lock().unwrap();
            if let Err(err) = target.flush_view() {
                warn!("durability: view flush failed for {:?}: {}", target.filename(), err);
                continue;
            }
            let filename = target.filename();
            drop(target);
            if let Err(err) = sync_with_lock(&filename) {
                warn!("durability: platform sync failed for {:?}: {}", filename, err);
            }
        }
        *self.last_flush_at.lock().unwrap() = Instant::now();
        self.last_flush_op_count.store(self.op_count.load(Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }
}

/// Flushes every registered file according to `policy`. One manager is
/// typically shared by a store's index and data files. Under
/// `FlushPolicy::Timer`, owns a dedicated worker thread (stopped and joined
/// on `Drop`) that calls `flush_if_due` on its own schedule.
pub struct DurabilityManager {
    shared: Arc<Shared>,
    timer_stop: Arc<AtomicBool>,
    timer_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl DurabilityManager {
    pub fn new(policy: FlushPolicy) -> DurabilityManager {
        let shared = Arc::new(Shared {
            policy,
            registered: Mutex::new(Vec::new()),
            op_count: AtomicU64::new(0),
            last_flush_at: Mutex::new(Instant::now()),
            last_flush_op_count: AtomicU64::new(0),
        });
        let timer_stop = Arc::new(AtomicBool::new(false));
        let timer_handle = match policy {
            FlushPolicy::Timer(ms) => {
                Some(spawn_timer(Arc::clone(&shared), Arc::clone(&timer_stop), ms))
            }
            _ => None,
        };
        DurabilityManager {
            shared,
            timer_stop,
            timer_handle: Mutex::new(timer_handle),
        }
    }

    pub fn register(&self, target: Arc<Mutex<dyn Durable>>) {
        self.shared.register(target);
    }

    /// Called once per recorded mutation. Decides whether this operation's
    /// policy threshold has been crossed and flushes if so.
    pub fn record_op(&self) -> Result<()> {
        self.shared.record_op()
    }

    /// Flush every registered file. Best-effort: a failure on one file is
    /// logged and does not prevent flushing its siblings, per spec.md §7.
    pub fn flush_all(&self) -> Result<()> {
        self.shared.flush_all()
    }

    /// Final forced flush, called on dispose regardless of policy.
    pub fn dispose(&self) -> Result<()> {
        self.flush_all()
    }
}

impl Drop for DurabilityManager {
    fn drop(&mut self) {
        self.timer_stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.timer_handle.lock().unwrap().take() {
            handle.join().ok();
        }
    }
}

/// The `Timer`-policy worker: wakes every `interval_ms` and calls
/// `flush_if_due` independent of `record_op`, so a write followed by no
/// further operations is still flushed on schedule rather than only on the
/// next unrelated mutation or an explicit `flush()`/`dispose()`. Shape
/// grounded on [crate::memory_pressure::MemoryPressureMonitor]'s sleep loop.
fn spawn_timer(shared: Arc<Shared>, stop: Arc<AtomicBool>, interval_ms: u64) -> thread::JoinHandle<()> {
    let wake_interval = Duration::from_millis(interval_ms.max(1));
    thread::Builder::new()
        .name("nbrly-durability-timer".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(wake_interval);
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(err) = shared.flush_if_due(interval_ms) {
                    warn!("durability: timer-policy flush failed: {}", err);
                }
            }
        })
        .expect("failed to spawn durability timer thread")
}

fn sync_with_lock(path: &ffi::OsStr) -> Result<()> {
    let fd = util::open_file_r(path)?;
    err_at!(IoError, fd.lock_shared())?;
    let result = platform::sync_file(path);
    err_at!(IoError, fd.unlock()).ok();
    result
}

#[cfg(test)]
#[path = "durability_test.rs"]
mod durability_test;
