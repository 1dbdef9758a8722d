//! src/error.rs
//!
//! Error taxonomy for the prefetch pipeline.
//!
//! Worker-side failures never cross the queues directly: a fatal fill or
//! staging error terminates the worker, and the consumer discovers the stall
//! through its own diagnostic pop. [`PrefetchError::Starvation`] is the one
//! recoverable variant - callers may treat it as "pipeline not ready yet"
//! and retry.

use std::time::Duration;

/// Errors surfaced by the pipeline's public operations.
#[derive(Debug, thiserror::Error)]
pub enum PrefetchError {
    /// Pool construction or worker spawn failed; the pipeline never started.
    #[error("pipeline startup failed: {0:#}")]
    Startup(anyhow::Error),

    /// The fill callback or the staging transfer failed. Fatal to the worker:
    /// not retried, production stops.
    #[error("batch load failed: {0:#}")]
    Load(anyhow::Error),

    /// No prefetched batch became available within the diagnostic timeout.
    /// Recoverable - the pipeline may simply not have warmed up yet.
    #[error("{context} (no batch after {waited:?})")]
    Starvation {
        /// Operator-facing description of which handoff starved.
        context: String,
        /// How long the pop waited before giving up.
        waited: Duration,
    },

    /// The pipeline has been stopped and can no longer produce batches.
    #[error("prefetch pipeline is stopped")]
    Stopped,

    /// A handoff queue rejected a push. The capacity invariant (a handle is
    /// only pushed after being popped from the opposite queue) makes this
    /// unreachable unless buffer accounting is broken.
    #[error("buffer accounting violated: {0}")]
    Internal(&'static str),
}

impl PrefetchError {
    /// True for the recoverable "no batch ready yet" condition.
    pub fn is_starvation(&self) -> bool {
        matches!(self, PrefetchError::Starvation { .. })
    }
}
