//! src/batch.rs
//!
//! Reusable batch storage.
//!
//! A [`BatchBuffer`] holds one produced unit of work: a primary data tensor
//! plus an ordered list of auxiliary fields (labels, indices, masks - the
//! pipeline does not interpret them). Buffers are allocated once at pool
//! construction and then mutated in place for the life of the pipeline;
//! every fill sets each field's shape freshly, so no shape leaks from one
//! reuse to the next.
//!
//! [`StepOutput`] is the consumer-owned counterpart: `consume_next` reshapes
//! it to match the popped buffer and copies the contents out, so the buffer
//! itself stays valid for the next fill cycle.

use anyhow::{anyhow, Result};
use ndarray::{ArrayD, IxDyn};

/// Reshapes `array` to `shape`, reusing the backing allocation when the
/// element count is unchanged and reallocating otherwise.
fn reshape_in_place<T: Clone + Default>(array: &mut ArrayD<T>, shape: &[usize]) {
    let len: usize = shape.iter().product();
    if array.len() == len {
        let current = std::mem::replace(array, ArrayD::default(IxDyn(&[0])));
        *array = match current.into_shape_with_order(IxDyn(shape)) {
            Ok(reshaped) => reshaped,
            // Non-contiguous layout cannot be reinterpreted; fall back to a
            // fresh allocation. Buffers built here are always contiguous.
            Err(_) => ArrayD::default(IxDyn(shape)),
        };
    } else {
        *array = ArrayD::default(IxDyn(shape));
    }
}

/// One reusable slot of prefetch storage.
///
/// The fill callback is responsible for calling [`set_primary_shape`] (and
/// [`set_aux_shape`] for each auxiliary field it was configured with) before
/// writing contents. The auxiliary arity is fixed at pool construction.
///
/// [`set_primary_shape`]: BatchBuffer::set_primary_shape
/// [`set_aux_shape`]: BatchBuffer::set_aux_shape
#[derive(Debug)]
pub struct BatchBuffer<T> {
    slot: usize,
    primary: ArrayD<T>,
    aux: Vec<ArrayD<T>>,
}

impl<T: Clone + Default> BatchBuffer<T> {
    pub(crate) fn new(slot: usize, output_arity: usize) -> Self {
        Self {
            slot,
            primary: ArrayD::default(IxDyn(&[0])),
            aux: (0..output_arity)
                .map(|_| ArrayD::default(IxDyn(&[0])))
                .collect(),
        }
    }

    /// Index of the physical buffer slot, stable for the pipeline's lifetime.
    /// Useful for diagnostics and for staging strategies that keep per-slot
    /// device allocations.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Number of auxiliary fields this buffer carries.
    pub fn arity(&self) -> usize {
        self.aux.len()
    }

    pub fn primary(&self) -> &ArrayD<T> {
        &self.primary
    }

    pub fn primary_mut(&mut self) -> &mut ArrayD<T> {
        &mut self.primary
    }

    /// Sets the primary field's shape for this fill and returns the storage
    /// for writing. Same-element-count reshapes keep the existing allocation.
    pub fn set_primary_shape(&mut self, shape: &[usize]) -> &mut ArrayD<T> {
        reshape_in_place(&mut self.primary, shape);
        &mut self.primary
    }

    pub fn aux(&self, index: usize) -> Result<&ArrayD<T>> {
        self.aux
            .get(index)
            .ok_or_else(|| anyhow!("Auxiliary field {} not found (arity {})", index, self.aux.len()))
    }

    pub fn aux_mut(&mut self, index: usize) -> Result<&mut ArrayD<T>> {
        let arity = self.aux.len();
        self.aux
            .get_mut(index)
            .ok_or_else(|| anyhow!("Auxiliary field {} not found (arity {})", index, arity))
    }

    /// Sets an auxiliary field's shape for this fill and returns the storage
    /// for writing. Errors if `index` is outside the configured arity.
    pub fn set_aux_shape(&mut self, index: usize, shape: &[usize]) -> Result<&mut ArrayD<T>> {
        let arity = self.aux.len();
        let field = self
            .aux
            .get_mut(index)
            .ok_or_else(|| anyhow!("Auxiliary field {} not found (arity {})", index, arity))?;
        reshape_in_place(field, shape);
        Ok(field)
    }
}

/// Consumer-owned storage that one consumed batch is copied into.
///
/// The pipeline reuses a single `StepOutput` across `consume_next` calls,
/// reshaping it to match each popped buffer. Callers that need to keep a
/// batch beyond the next call must clone the fields they care about.
#[derive(Debug)]
pub struct StepOutput<T> {
    primary: ArrayD<T>,
    aux: Vec<ArrayD<T>>,
}

impl<T: Clone + Default> StepOutput<T> {
    pub(crate) fn new(output_arity: usize) -> Self {
        Self {
            primary: ArrayD::default(IxDyn(&[0])),
            aux: (0..output_arity)
                .map(|_| ArrayD::default(IxDyn(&[0])))
                .collect(),
        }
    }

    /// Copy, not move: the buffer must remain structurally valid for reuse.
    pub(crate) fn copy_from(&mut self, buffer: &BatchBuffer<T>) {
        self.primary.clone_from(&buffer.primary);
        for (out, src) in self.aux.iter_mut().zip(&buffer.aux) {
            out.clone_from(src);
        }
    }

    pub fn primary(&self) -> &ArrayD<T> {
        &self.primary
    }

    /// The auxiliary field at `index`, or `None` past the configured arity.
    pub fn aux(&self, index: usize) -> Option<&ArrayD<T>> {
        self.aux.get(index)
    }

    pub fn arity(&self) -> usize {
        self.aux.len()
    }
}
