//! Scatter/batch reads
//!
//! Reads are latency-bound, not payload-bound, so every read a refresh pass
//! needs is registered up front and sent to the transport as one round trip.
//! Completion callbacks run once the whole batch has executed.

use crate::address::ensure_valid_span;
use crate::channel::MemoryChannel;
use crate::error::{ChannelError, Result};
use crate::source::ScatterSlot;

use bytemuck::Pod;
use std::collections::HashMap;
use std::ops::Range;

type Callback<'a> = Box<dyn FnOnce(&ScatterResults) + 'a>;

/// One pass worth of pending reads plus their completion callbacks.
///
/// Owned and executed by a single thread; build a new one every cycle.
#[derive(Default)]
pub struct ScatterRequest<'a> {
    descriptors: Vec<(u64, usize)>,
    index: HashMap<(u64, usize), usize>,
    callbacks: Vec<Callback<'a>>,
}

impl<'a> ScatterRequest<'a> {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            index: HashMap::new(),
            callbacks: Vec::new(),
        }
    }

    /// Register a read of one `T` at `address`
    pub fn prepare_read<T: Pod>(&mut self, address: u64) {
        self.prepare_bytes(address, std::mem::size_of::<T>());
    }

    /// Register a read of `len` bytes at `address`. Duplicates are coalesced.
    pub fn prepare_bytes(&mut self, address: u64, len: usize) {
        let key = (address, len);
        if !self.index.contains_key(&key) {
            self.index.insert(key, self.descriptors.len());
            self.descriptors.push(key);
        }
    }

    /// Register a callback to run once after [`execute`](Self::execute)
    pub fn on_completed<F>(&mut self, callback: F)
    where
        F: FnOnce(&ScatterResults) + 'a,
    {
        self.callbacks.push(Box::new(callback));
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Perform every registered read in one round trip, then run callbacks.
    ///
    /// Descriptors with invalid addresses are never sent and resolve to
    /// `None`. If the channel is down or the round trip fails, no callback
    /// runs and the error is returned; the caller retries next cycle.
    pub fn execute(self, channel: &MemoryChannel) -> Result<ScatterSummary> {
        if !channel.is_alive() {
            return Err(ChannelError::ProcessGone.into());
        }

        let mut ranges: HashMap<(u64, usize), Range<usize>> = HashMap::new();
        let mut total = 0usize;
        for &(address, len) in &self.descriptors {
            if ensure_valid_span(address, len).is_ok() {
                ranges.insert((address, len), total..total + len);
                total += len;
            }
        }

        let mut data = vec![0u8; total];
        let mut failed: Vec<(u64, usize)> = Vec::new();
        if total > 0 {
            let mut slots = Vec::with_capacity(ranges.len());
            let mut rest: &mut [u8] = &mut data;
            for &(address, len) in &self.descriptors {
                if ranges.contains_key(&(address, len)) {
                    let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
                    slots.push(ScatterSlot::new(address, head));
                    rest = tail;
                }
            }

            channel.source().read_scatter(&mut slots)?;

            failed.extend(
                slots
                    .iter()
                    .filter(|s| !s.ok)
                    .map(|s| (s.address, s.buf.len())),
            );
        }
        for key in &failed {
            ranges.remove(key);
        }

        let summary = ScatterSummary {
            requested: self.descriptors.len(),
            succeeded: ranges.len(),
        };
        let results = ScatterResults { ranges, data };
        for callback in self.callbacks {
            callback(&results);
        }
        Ok(summary)
    }
}

/// Counts from one executed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScatterSummary {
    pub requested: usize,
    pub succeeded: usize,
}

impl ScatterSummary {
    pub fn failed(&self) -> usize {
        self.requested - self.succeeded
    }
}

/// Read-only view of a completed batch, keyed by `(address, size)`
#[derive(Debug)]
pub struct ScatterResults {
    ranges: HashMap<(u64, usize), Range<usize>>,
    data: Vec<u8>,
}

impl ScatterResults {
    /// The bytes read at `address`, if that descriptor succeeded
    pub fn bytes(&self, address: u64, len: usize) -> Option<&[u8]> {
        let range = self.ranges.get(&(address, len))?;
        self.data.get(range.clone())
    }

    /// Typed value at `address`, if a descriptor of that size succeeded
    pub fn try_read<T: Pod>(&self, address: u64) -> Option<T> {
        self.bytes(address, std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
    }

    pub fn succeeded(&self) -> usize {
        self.ranges.len()
    }
}
