//! src/worker.rs
//!
//! The background prefetch worker.
//!
//! One independently scheduled thread repeatedly: pops a free buffer
//! (cancellable wait), invokes the external fill callback, stages the
//! result to the secondary memory domain if one is configured, and
//! publishes the buffer on the full queue. The publish is the single point
//! that makes the filled contents visible to the consumer - a partial
//! buffer is never pushed.
//!
//! Cancellation is cooperative and silent: it is observed at the loop top,
//! wakes the blocked free-queue pop, and is re-checked after the fill so a
//! filled-but-cancelled buffer is simply not published. Any other failure
//! (fill or staging) is fatal to the worker: logged, recorded for the
//! pipeline front, never retried.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::batch::BatchBuffer;
use crate::cancel::CancelToken;
use crate::error::PrefetchError;
use crate::queue::BoundedHandoffQueue;
use crate::staging::Staging;

/// External "load one unit of work" callback.
///
/// The callback fully determines one batch: it must set the primary field's
/// shape (and each auxiliary field's shape, up to the configured arity)
/// before writing contents. It may block arbitrarily long - that is the
/// entire reason the worker runs on its own schedule. Long-blocking loaders
/// may poll `cancel` to unblock early during shutdown; ignoring it is
/// allowed and merely extends shutdown by one in-flight fill.
pub trait BatchLoader<T>: Send + 'static {
    fn load_batch(&mut self, buffer: &mut BatchBuffer<T>, cancel: &CancelToken) -> Result<()>;
}

impl<T, F> BatchLoader<T> for F
where
    F: FnMut(&mut BatchBuffer<T>, &CancelToken) -> Result<()> + Send + 'static,
{
    fn load_batch(&mut self, buffer: &mut BatchBuffer<T>, cancel: &CancelToken) -> Result<()> {
        self(buffer, cancel)
    }
}

/// Handle to the running prefetch thread.
pub(crate) struct PrefetchWorker {
    handle: Option<thread::JoinHandle<()>>,
    cancel: CancelToken,
    fault: Arc<Mutex<Option<String>>>,
}

impl PrefetchWorker {
    /// Spawns the prefetch thread. The pool must already be initialized and
    /// pretouched; from here on the worker owns the producer end of both
    /// queues.
    pub(crate) fn spawn<T>(
        free: BoundedHandoffQueue<BatchBuffer<T>>,
        full: BoundedHandoffQueue<BatchBuffer<T>>,
        loader: Box<dyn BatchLoader<T>>,
        staging: Box<dyn Staging<T>>,
        poll: Duration,
    ) -> Result<Self, PrefetchError>
    where
        T: Clone + Default + Send + 'static,
    {
        let cancel = CancelToken::new();
        let fault = Arc::new(Mutex::new(None));

        let handle = {
            let cancel = cancel.clone();
            let fault = fault.clone();
            thread::Builder::new()
                .name("prefetch-worker".to_string())
                .spawn(move || run_loop(free, full, loader, staging, cancel, fault, poll))
                .context("Failed to spawn prefetch worker thread")
                .map_err(PrefetchError::Startup)?
        };

        Ok(Self {
            handle: Some(handle),
            cancel,
            fault,
        })
    }

    /// The fatal error that terminated the worker, if any.
    pub(crate) fn fault_message(&self) -> Option<String> {
        self.fault.lock().ok().and_then(|slot| slot.clone())
    }

    /// Requests cancellation and waits for the worker to reach its terminal
    /// state. Idempotent. Returns the recorded fatal error if the worker
    /// died before being asked to stop.
    pub(crate) fn stop(&mut self) -> Result<(), PrefetchError> {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        match self.fault_message() {
            Some(message) => Err(PrefetchError::Load(anyhow::anyhow!(message))),
            None => Ok(()),
        }
    }
}

impl Drop for PrefetchWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop<T: Clone + Default + Send + 'static>(
    free: BoundedHandoffQueue<BatchBuffer<T>>,
    full: BoundedHandoffQueue<BatchBuffer<T>>,
    mut loader: Box<dyn BatchLoader<T>>,
    mut staging: Box<dyn Staging<T>>,
    cancel: CancelToken,
    fault: Arc<Mutex<Option<String>>>,
    poll: Duration,
) {
    tracing::debug!("prefetch worker started");

    loop {
        // Suspension point 1: wait for a free buffer, waking on cancellation.
        let Some(mut buffer) = free.pop_until_cancelled(&cancel, poll) else {
            break;
        };

        if let Err(err) = loader.load_batch(&mut buffer, &cancel) {
            if cancel.is_cancelled() {
                // An abandoned in-flight fill on shutdown is not an error.
                break;
            }
            tracing::error!("prefetch fill failed: {:#}", err);
            record_fault(&fault, format!("{:#}", err));
            break;
        }

        if cancel.is_cancelled() {
            // Filled after the signal: not published, no data loss promised.
            break;
        }

        // Suspension point 2: wait on this buffer's own transfer, so the
        // published contents are consistent on the execution domain.
        let staged = staging
            .transfer_async(&mut buffer)
            .and_then(|ticket| staging.wait(ticket))
            .with_context(|| format!("Device staging failed for buffer slot {}", buffer.slot()));
        if let Err(err) = staged {
            tracing::error!("prefetch staging failed: {:#}", err);
            record_fault(&fault, format!("{:#}", err));
            break;
        }

        // Publish: the only step that makes the fill visible to the consumer.
        if full.push(buffer).is_err() {
            break;
        }
    }

    tracing::debug!("prefetch worker stopped");
}

fn record_fault(fault: &Mutex<Option<String>>, message: String) {
    if let Ok(mut slot) = fault.lock() {
        slot.get_or_insert(message);
    }
}
