//! src/staging.rs
//!
//! Cross-domain staging strategy.
//!
//! When a second memory domain (typically an accelerator) is the execution
//! target, each filled buffer is staged there with an asynchronous transfer,
//! and the worker waits on that specific transfer before publishing the
//! buffer - memory is consistent at publish time while the transfer engine
//! stays free to pipeline internally.
//!
//! The strategy is chosen once at pipeline setup rather than branched on
//! inside the worker loop: host-only deployments pass [`HostStaging`] and
//! pay nothing.

use anyhow::Result;

use crate::batch::BatchBuffer;

/// Identifies one in-flight transfer so the wait is local to that transfer,
/// not a global barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTicket(pub u64);

/// Strategy for moving buffer contents into a second memory domain.
///
/// Implementations own the device-side resources (streams, per-slot
/// allocations) keyed by [`BatchBuffer::slot`] as needed. All three methods
/// are called from at most one thread at a time: `pretouch` from the thread
/// constructing the pool, before the worker starts; `transfer_async` and
/// `wait` from the worker thread only.
pub trait Staging<T>: Send + 'static {
    /// Eagerly touches the secondary domain for one buffer during pool
    /// construction, so the background worker is never the first to trigger
    /// a heavyweight allocation on a domain it does not own. Called once per
    /// buffer, from the initializing thread, before the worker is spawned.
    fn pretouch(&mut self, buffer: &mut BatchBuffer<T>) -> Result<()>;

    /// Begins an asynchronous transfer of the buffer's primary data to the
    /// secondary domain.
    fn transfer_async(&mut self, buffer: &mut BatchBuffer<T>) -> Result<TransferTicket>;

    /// Blocks until the given transfer has completed.
    fn wait(&mut self, ticket: TransferTicket) -> Result<()>;
}

/// No second memory domain: every operation is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostStaging;

impl HostStaging {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Send + 'static> Staging<T> for HostStaging {
    fn pretouch(&mut self, _buffer: &mut BatchBuffer<T>) -> Result<()> {
        Ok(())
    }

    fn transfer_async(&mut self, _buffer: &mut BatchBuffer<T>) -> Result<TransferTicket> {
        Ok(TransferTicket(0))
    }

    fn wait(&mut self, _ticket: TransferTicket) -> Result<()> {
        Ok(())
    }
}
