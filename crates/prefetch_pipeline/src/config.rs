//! src/config.rs
//!
//! Configuration for pipeline behaviour.
//!
//! Example:
//! ```ignore
//! let config = PipelineConfig::builder()
//!     .pool_size(3)
//!     .output_arity(2)
//!     .starvation_timeout(Duration::from_secs(10))
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `pool_size`: more buffers absorb longer fill-time spikes but hold more
//!   memory; 3-4 is usually enough to keep the consumer from stalling.
//! - `starvation_timeout`: too low misreports legitimately slow loads as
//!   starvation; too high delays detection of a dead worker.

use std::time::Duration;

/// Configuration for a prefetch pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of reusable batch buffers in the pool (must be > 0).
    pub pool_size: usize,
    /// Number of auxiliary fields per batch. 0 disables auxiliary
    /// production entirely: the fill callback gets no auxiliary storage and
    /// `consume_next` copies only primary data.
    pub output_arity: usize,
    /// Maximum time `consume_next` waits for a prefetched batch before
    /// reporting starvation. Default: 30s.
    pub starvation_timeout: Duration,
    /// How often the blocked worker re-checks the cancellation signal.
    /// Not an error timeout - just a polling interval. Default: 100ms.
    pub worker_poll: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool_size: 3,
            output_arity: 0,
            starvation_timeout: Duration::from_secs(30),
            worker_poll: Duration::from_millis(100),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for PipelineConfig with method chaining
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the number of buffers in the pool (must be > 0)
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set how many auxiliary fields each batch carries
    pub fn output_arity(mut self, arity: usize) -> Self {
        self.config.output_arity = arity;
        self
    }

    /// Set the consumer-side starvation timeout.
    ///
    /// - Too low: may report starvation during legitimate slow loads
    /// - Too high: delays detection of a stopped worker
    pub fn starvation_timeout(mut self, timeout: Duration) -> Self {
        self.config.starvation_timeout = timeout;
        self
    }

    /// Set the worker's cancellation polling interval
    ///
    /// - Too low: more responsive shutdown, higher wakeup overhead
    /// - Too high: slower shutdown response
    pub fn worker_poll(mut self, poll: Duration) -> Self {
        self.config.worker_poll = poll;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
