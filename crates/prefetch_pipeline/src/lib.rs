//! Asynchronous double-buffered prefetch pipeline.
//!
//! A background worker continuously fills reusable batch buffers (decoding,
//! transformation, optional host-to-device staging) while a foreground
//! consumer pulls fully prepared batches at its own pace, so the compute
//! path never stalls waiting for the next unit of work.
//!
//! Ownership of each buffer moves between the two sides exclusively through
//! a pair of bounded handoff queues ("free" and "full"); no buffer is ever
//! read while being written, and no batch is lost or duplicated.
//!
//! ```ignore
//! let config = PipelineConfig::builder().pool_size(3).build();
//! let mut pipeline = Pipeline::<f32>::start(
//!     config,
//!     |buffer: &mut BatchBuffer<f32>, _cancel: &CancelToken| {
//!         buffer.set_primary_shape(&[32, 128]).fill(0.0);
//!         Ok(())
//!     },
//!     HostStaging::new(),
//! )?;
//!
//! let batch = pipeline.consume_next()?;
//! run_step(batch.primary());
//! pipeline.stop()?;
//! ```

pub mod batch;
pub mod cancel;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod staging;
pub mod worker;

mod pool;
mod queue;

pub use batch::{BatchBuffer, StepOutput};
pub use cancel::CancelToken;
pub use config::PipelineConfig;
pub use error::PrefetchError;
pub use pipeline::Pipeline;
pub use staging::{HostStaging, Staging, TransferTicket};
pub use worker::BatchLoader;
