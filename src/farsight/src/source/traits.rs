//! Memory Source Trait
//!
//! Core abstraction for the hardware/driver-mediated read primitive.

use super::MemoryRegion;
use crate::error::{ChannelError, ReadError, Result};

/// One descriptor of a batched read. The transport fills `buf` and sets `ok`
/// for every slot it managed to read.
#[derive(Debug)]
pub struct ScatterSlot<'a> {
    pub address: u64,
    pub buf: &'a mut [u8],
    pub ok: bool,
}

impl<'a> ScatterSlot<'a> {
    pub fn new(address: u64, buf: &'a mut [u8]) -> Self {
        Self {
            address,
            buf,
            ok: false,
        }
    }
}

/// Trait for reading memory of a foreign process
///
/// Implementations never pause or suspend the target; a call blocks only the
/// calling thread for the duration of the transaction.
pub trait MemorySource: Send + Sync {
    /// Read exactly `buf.len()` bytes starting at `address`
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<()>;

    /// Whether the target process is still present
    fn is_alive(&self) -> bool;

    /// Mapped regions of the target, when the transport can enumerate them
    fn regions(&self) -> Vec<MemoryRegion> {
        Vec::new()
    }

    /// Read many independent spans in one round trip.
    ///
    /// Per-slot failures only clear that slot's `ok` flag. An `Err` return
    /// means the transport as a whole failed and no slot can be trusted.
    /// Transports without native batching fall back to one read per slot.
    fn read_scatter(&self, slots: &mut [ScatterSlot<'_>]) -> Result<()> {
        if !self.is_alive() {
            return Err(ChannelError::ProcessGone.into());
        }
        for slot in slots.iter_mut() {
            slot.ok = match self.read_into(slot.address, slot.buf) {
                Ok(()) => true,
                Err(ReadError::Channel(err)) => return Err(err.into()),
                Err(_) => false,
            };
        }
        Ok(())
    }

    /// Read bytes into a freshly allocated buffer
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.read_into(address, &mut buf)?;
        Ok(buf)
    }

    /// Find the lowest mapped region backed by the named module
    fn find_module(&self, name: &str) -> Option<MemoryRegion> {
        self.regions()
            .into_iter()
            .filter(|r| r.is_module(name))
            .min_by_key(|r| r.start)
    }
}
