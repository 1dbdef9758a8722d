//! src/queue.rs
//!
//! Bounded handoff queue for buffer ownership transfer.
//!
//! Two of these queues ("free" and "full") are the only synchronization in
//! the pipeline: whichever side holds a buffer's handle may touch it, and
//! handles move between sides exclusively through these queues. Capacity is
//! bounded by the pool size, and a handle is only ever pushed after being
//! popped from the complementary queue, so pushes never block.
//!
//! Single producer, single consumer per queue: the worker pushes full
//! handles and pops free ones, the pipeline front does the reverse.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::PrefetchError;

#[derive(Debug)]
pub(crate) struct BoundedHandoffQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

// Manual impl: Sender/Receiver clone without requiring T: Clone.
impl<T> Clone for BoundedHandoffQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> BoundedHandoffQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Hands a buffer to the other side. Never blocks: the capacity
    /// invariant guarantees a slot, so `Full` indicates broken accounting.
    pub(crate) fn push(&self, item: T) -> Result<(), PrefetchError> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(PrefetchError::Internal("handoff queue over capacity"))
            }
            Err(TrySendError::Disconnected(_)) => Err(PrefetchError::Stopped),
        }
    }

    /// Blocking pop with a diagnostic deadline. Used on the consumer side so
    /// a stalled pipeline reports a clear starvation condition instead of
    /// hanging silently.
    pub(crate) fn pop_timeout(
        &self,
        timeout: Duration,
        context: &str,
    ) -> Result<T, PrefetchError> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Ok(item),
            Err(RecvTimeoutError::Timeout) => Err(PrefetchError::Starvation {
                context: context.to_string(),
                waited: timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(PrefetchError::Stopped),
        }
    }

    /// Blocking pop that wakes on cancellation. The worker uses this for its
    /// free-queue wait; `None` means shutdown, never an error.
    pub(crate) fn pop_until_cancelled(
        &self,
        cancel: &CancelToken,
        poll: Duration,
    ) -> Option<T> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            match self.rx.recv_timeout(poll) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}
