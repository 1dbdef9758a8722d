//! src/pipeline.rs
//!
//! The consumer-facing pipeline front.
//!
//! [`Pipeline::start`] builds the buffer pool (eagerly pretouching every
//! memory domain), spawns the background prefetch worker, and returns a
//! handle the surrounding compute loop calls once per step. Exactly two
//! threads of control touch the pool: the worker, and whichever thread
//! calls [`Pipeline::consume_next`] - the API takes `&mut self`, so there
//! is never more than one consumer at a time.

use anyhow::anyhow;

use crate::batch::StepOutput;
use crate::config::PipelineConfig;
use crate::error::PrefetchError;
use crate::pool::BufferPool;
use crate::staging::Staging;
use crate::worker::{BatchLoader, PrefetchWorker};

const FULL_QUEUE_CONTEXT: &str = "prefetch full queue empty";

/// A running prefetch pipeline.
///
/// Dropping the pipeline requests cancellation and joins the worker; call
/// [`stop`](Self::stop) instead when the shutdown outcome matters (it
/// reports any fatal worker error).
pub struct Pipeline<T> {
    pool: BufferPool<T>,
    worker: PrefetchWorker,
    output: StepOutput<T>,
    config: PipelineConfig,
    stopped: bool,
}

impl<T: Clone + Default + Send + 'static> Pipeline<T> {
    /// Initializes the pool and starts the background worker.
    ///
    /// Pool allocation and domain pretouch failures surface here as
    /// [`PrefetchError::Startup`]; the worker is never started in that case.
    pub fn start(
        config: PipelineConfig,
        loader: impl BatchLoader<T>,
        mut staging: impl Staging<T>,
    ) -> Result<Self, PrefetchError> {
        let pool = BufferPool::new(config.pool_size, config.output_arity, &mut staging)?;

        let worker = PrefetchWorker::spawn(
            pool.free().clone(),
            pool.full().clone(),
            Box::new(loader),
            Box::new(staging),
            config.worker_poll,
        )?;

        tracing::debug!(
            pool_size = config.pool_size,
            output_arity = config.output_arity,
            "prefetch pipeline started"
        );

        let output = StepOutput::new(config.output_arity);
        Ok(Self {
            pool,
            worker,
            output,
            config,
            stopped: false,
        })
    }

    /// Pops the next fully prepared batch, copies it into pipeline-owned
    /// output storage, returns the buffer to the free queue, and hands the
    /// copy to the caller.
    ///
    /// The returned reference is valid until the next `consume_next` call;
    /// clone what must outlive it. When `output_arity` is 0 only primary
    /// data is produced.
    ///
    /// # Errors
    /// - [`PrefetchError::Starvation`] if no batch arrives within the
    ///   configured timeout - recoverable, the pipeline may just be warming
    ///   up or mid-spike.
    /// - [`PrefetchError::Load`] if the worker died of a fill or staging
    ///   failure; production will not resume.
    /// - [`PrefetchError::Stopped`] after [`stop`](Self::stop).
    pub fn consume_next(&mut self) -> Result<&StepOutput<T>, PrefetchError> {
        if self.stopped {
            return Err(PrefetchError::Stopped);
        }

        let buffer = match self
            .pool
            .full()
            .pop_timeout(self.config.starvation_timeout, FULL_QUEUE_CONTEXT)
        {
            Ok(buffer) => buffer,
            Err(err) => {
                // A dead worker also presents as starvation; report the
                // root cause when one was recorded.
                if let Some(message) = self.worker.fault_message() {
                    return Err(PrefetchError::Load(anyhow!(message)));
                }
                if err.is_starvation() {
                    tracing::warn!(
                        timeout = ?self.config.starvation_timeout,
                        "consumer starved waiting for prefetched batch"
                    );
                }
                return Err(err);
            }
        };

        self.output.copy_from(&buffer);
        self.pool.free().push(buffer)?;
        Ok(&self.output)
    }

    /// Requests cooperative cancellation and waits for the worker to reach
    /// its terminal state. Idempotent: later calls (and the eventual drop)
    /// are no-ops.
    ///
    /// Returns [`PrefetchError::Load`] if the worker had already died of a
    /// fatal fill or staging error.
    pub fn stop(&mut self) -> Result<(), PrefetchError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        let outcome = self.worker.stop();
        tracing::debug!("prefetch pipeline stopped");
        outcome
    }
}
