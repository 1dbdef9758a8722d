#![allow(dead_code)]

use anyhow::{anyhow, Result};
use prefetch_pipeline::{BatchBuffer, BatchLoader, CancelToken, Staging, TransferTicket};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Fill callback that writes the call index `k` into every element of the
/// primary field (shape `[4]`), and `k * 10 + j` into auxiliary field `j`
/// (shape `[2]`). The call counter is shared so tests can compare fill and
/// consume counts.
pub struct SequenceLoader {
    pub calls: Arc<AtomicUsize>,
}

impl SequenceLoader {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl BatchLoader<f32> for SequenceLoader {
    fn load_batch(&mut self, buffer: &mut BatchBuffer<f32>, _cancel: &CancelToken) -> Result<()> {
        let k = self.calls.fetch_add(1, Ordering::SeqCst);
        buffer.set_primary_shape(&[4]).fill(k as f32);
        for j in 0..buffer.arity() {
            buffer.set_aux_shape(j, &[2])?.fill((k * 10 + j) as f32);
        }
        Ok(())
    }
}

/// Fill callback that blocks until shutdown is requested, then returns
/// cleanly without producing anything.
pub struct BlockingLoader;

impl BatchLoader<f32> for BlockingLoader {
    fn load_batch(&mut self, _buffer: &mut BatchBuffer<f32>, cancel: &CancelToken) -> Result<()> {
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }
}

/// Fill callback that succeeds `fail_after` times, then fails fatally.
pub struct FailingLoader {
    pub fail_after: usize,
    calls: usize,
}

impl FailingLoader {
    pub fn new(fail_after: usize) -> Self {
        Self {
            fail_after,
            calls: 0,
        }
    }
}

impl BatchLoader<f32> for FailingLoader {
    fn load_batch(&mut self, buffer: &mut BatchBuffer<f32>, _cancel: &CancelToken) -> Result<()> {
        let k = self.calls;
        self.calls += 1;
        if k >= self.fail_after {
            return Err(anyhow!("synthetic decode failure on batch {}", k));
        }
        buffer.set_primary_shape(&[4]).fill(k as f32);
        Ok(())
    }
}

/// Fill callback for the torn-read race test: writes a monotonically
/// increasing marker into a large primary field, element by element, so a
/// buffer read mid-fill would show mixed markers.
pub struct MarkerLoader {
    pub elements: usize,
    calls: usize,
}

impl MarkerLoader {
    pub fn new(elements: usize) -> Self {
        Self { elements, calls: 0 }
    }
}

impl BatchLoader<f32> for MarkerLoader {
    fn load_batch(&mut self, buffer: &mut BatchBuffer<f32>, _cancel: &CancelToken) -> Result<()> {
        let marker = self.calls as f32;
        self.calls += 1;
        let primary = buffer.set_primary_shape(&[self.elements]);
        for value in primary.iter_mut() {
            *value = marker;
        }
        Ok(())
    }
}

/// Observable state of the [`EmulatedDevice`] staging strategy.
#[derive(Debug, Default)]
pub struct DeviceState {
    /// Slots pretouched during pool construction, in call order.
    pub pretouched: Vec<usize>,
    /// Whether every buffer had been pretouched by the first transfer.
    pub pretouch_complete_at_first_transfer: Option<bool>,
    /// Transfers begun / waits completed.
    pub transfers: u64,
    pub waits: u64,
    /// In-flight transfers: ticket -> (slot, primary snapshot).
    pub pending: Vec<(u64, usize, Vec<f32>)>,
    /// Committed device-side copies in wait order: (slot, first element).
    pub committed_log: Vec<(usize, f32)>,
    /// Markers currently visible on the device.
    pub committed_markers: HashSet<u32>,
}

/// Staging strategy emulating a second memory domain: `transfer_async`
/// snapshots the primary field, `wait` commits the snapshot. Tests inspect
/// the shared state to check transfer/wait/publish ordering.
pub struct EmulatedDevice {
    state: Arc<Mutex<DeviceState>>,
    pool_size: usize,
    next_ticket: u64,
}

impl EmulatedDevice {
    pub fn new(pool_size: usize) -> (Self, Arc<Mutex<DeviceState>>) {
        let state = Arc::new(Mutex::new(DeviceState::default()));
        (
            Self {
                state: state.clone(),
                pool_size,
                next_ticket: 1,
            },
            state,
        )
    }
}

impl Staging<f32> for EmulatedDevice {
    fn pretouch(&mut self, buffer: &mut BatchBuffer<f32>) -> Result<()> {
        self.state.lock().unwrap().pretouched.push(buffer.slot());
        Ok(())
    }

    fn transfer_async(&mut self, buffer: &mut BatchBuffer<f32>) -> Result<TransferTicket> {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let snapshot: Vec<f32> = buffer.primary().iter().copied().collect();
        let mut state = self.state.lock().unwrap();
        let pretouch_complete = state.pretouched.len() == self.pool_size;
        state
            .pretouch_complete_at_first_transfer
            .get_or_insert(pretouch_complete);
        state.transfers += 1;
        state.pending.push((ticket, buffer.slot(), snapshot));
        Ok(TransferTicket(ticket))
    }

    fn wait(&mut self, ticket: TransferTicket) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let position = state
            .pending
            .iter()
            .position(|(id, _, _)| *id == ticket.0)
            .ok_or_else(|| anyhow!("wait on unknown transfer ticket {}", ticket.0))?;
        let (_, slot, snapshot) = state.pending.remove(position);
        let first = snapshot.first().copied().unwrap_or(0.0);
        state.waits += 1;
        state.committed_log.push((slot, first));
        state.committed_markers.insert(first as u32);
        Ok(())
    }
}

/// Staging strategy whose transfers always fail, for worker-fatality tests.
pub struct FailingStaging;

impl Staging<f32> for FailingStaging {
    fn pretouch(&mut self, _buffer: &mut BatchBuffer<f32>) -> Result<()> {
        Ok(())
    }

    fn transfer_async(&mut self, _buffer: &mut BatchBuffer<f32>) -> Result<TransferTicket> {
        Err(anyhow!("emulated transfer engine failure"))
    }

    fn wait(&mut self, _ticket: TransferTicket) -> Result<()> {
        Ok(())
    }
}

/// First element of a batch's primary field.
pub fn first_element(primary: &ndarray::ArrayD<f32>) -> f32 {
    *primary.iter().next().expect("primary field is empty")
}
