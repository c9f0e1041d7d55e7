//! Cooperative cancellation for public store/orchestrator operations, per
//! spec.md §5: "every public operation accepts an optional cancellation
//! token; it is checked before taking the lock and between per-record steps
//! of batched defragmentation."
//!
//! Grounded on the same `Arc<AtomicBool>` shutdown-flag shape
//! [crate::memory_pressure::MemoryPressureMonitor] uses for its sleep loop.

use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

use crate::{err_at, Result};

/// A shareable flag a caller can flip to abort an in-flight operation
/// between atomic steps. Cloning shares the same underlying flag.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` iff this token has been flipped. Called before
    /// lock acquisition and between per-record steps of batched work.
    pub fn check(token: Option<&CancelToken>) -> Result<()> {
        match token {
            Some(t) if t.is_cancelled() => err_at!(Cancelled, msg: "operation cancelled"),
            _ => Ok(()),
        }
    }
}
