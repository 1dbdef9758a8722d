//! src/cancel.rs
//!
//! Cooperative cancellation token shared between the pipeline front and the
//! prefetch worker. The worker observes it at its defined suspension points
//! (loop top, the blocked free-queue pop, and just before publish); fill
//! callbacks receive a reference so long blocking loads can choose to
//! unblock early during shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared shutdown signal. Cheap to clone; cancellation is idempotent and
/// permanent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Safe to call from any thread, any number of
    /// times.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
