//! Pointer-chain resolution
//!
//! The target's type metadata is unavailable, so field paths are expressed as
//! offset sequences from the layout table: each hop adds an offset and
//! dereferences the pointer stored there.

use crate::address::{ensure_valid, is_valid};
use crate::channel::MemoryChannel;
use crate::error::{ReadError, Result};
use crate::layout::LayoutTable;

/// A named offset sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerChain {
    pub name: String,
    pub offsets: Vec<u64>,
}

impl PointerChain {
    /// Look up a chain by name in the layout table
    pub fn from_layout(layout: &LayoutTable, name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            offsets: layout.chain(name)?.to_vec(),
        })
    }

    pub fn resolve(&self, channel: &MemoryChannel, base: u64, use_cache: bool) -> Result<u64> {
        resolve(channel, base, use_cache, &self.offsets).map_err(|err| match err {
            ReadError::Access { address, reason } => ReadError::Access {
                address,
                reason: format!("{} ({})", reason, self.name),
            },
            other => other,
        })
    }
}

/// Walk `offsets` from `base`, returning the final address.
///
/// Every pointer read along the way must be valid. The walk stops at the
/// first null or out-of-range hop and never returns a partial address.
pub fn resolve(
    channel: &MemoryChannel,
    base: u64,
    use_cache: bool,
    offsets: &[u64],
) -> Result<u64> {
    let mut address = ensure_valid(base)?;

    for (hop, &offset) in offsets.iter().enumerate() {
        let slot = address
            .checked_add(offset)
            .ok_or_else(|| ReadError::access(address, format!("hop {} offset overflows", hop)))?;
        let next = channel.read_ptr(slot, use_cache)?;
        if !is_valid(next) {
            return Err(ReadError::access(
                slot,
                format!("hop {} read invalid pointer {:#x}", hop, next),
            ));
        }
        address = next;
    }

    Ok(address)
}
