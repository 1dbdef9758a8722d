//! src/pool.rs
//!
//! Fixed pool of reusable batch buffers.
//!
//! The pool owns nothing after construction: it builds exactly N buffers,
//! pretouches every memory domain that will be used, and seeds the free
//! queue with all N handles in slot order. From then on the buffers cycle
//! free -> being-filled -> full -> being-consumed -> free, and at any
//! instant each buffer is in exactly one of those places.

use anyhow::Context;

use crate::batch::BatchBuffer;
use crate::error::PrefetchError;
use crate::queue::BoundedHandoffQueue;
use crate::staging::Staging;

#[derive(Debug)]
pub(crate) struct BufferPool<T> {
    free: BoundedHandoffQueue<BatchBuffer<T>>,
    full: BoundedHandoffQueue<BatchBuffer<T>>,
}

impl<T: Clone + Default + Send + 'static> BufferPool<T> {
    /// Builds the N buffers and fills the free queue, pretouching each buffer
    /// on the secondary domain from the calling thread. The worker must not
    /// be running yet: concurrent first-touch allocation across domains is
    /// exactly what the eager pass avoids.
    pub(crate) fn new(
        pool_size: usize,
        output_arity: usize,
        staging: &mut dyn Staging<T>,
    ) -> Result<Self, PrefetchError> {
        if pool_size == 0 {
            return Err(PrefetchError::Startup(anyhow::anyhow!(
                "Cannot create a prefetch pool with 0 buffers. \
                At least one buffer is required; 2+ are needed to overlap \
                loading with consumption."
            )));
        }

        let free = BoundedHandoffQueue::new(pool_size);
        let full = BoundedHandoffQueue::new(pool_size);

        for slot in 0..pool_size {
            let mut buffer = BatchBuffer::new(slot, output_arity);
            staging
                .pretouch(&mut buffer)
                .with_context(|| format!("Failed to pretouch buffer slot {}", slot))
                .map_err(PrefetchError::Startup)?;
            free.push(buffer)?;
        }

        Ok(Self { free, full })
    }

    pub(crate) fn free(&self) -> &BoundedHandoffQueue<BatchBuffer<T>> {
        &self.free
    }

    pub(crate) fn full(&self) -> &BoundedHandoffQueue<BatchBuffer<T>> {
        &self.full
    }
}
