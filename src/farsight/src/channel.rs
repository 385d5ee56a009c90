//! Memory Access Channel
//!
//! Typed reads against the foreign address space with an optional short-TTL
//! cache in front of the transport. Shared by every subsystem thread.

use crate::address::{ensure_valid, ensure_valid_span};
use crate::cache::ReadCache;
use crate::chain;
use crate::error::{ReadError, Result};
use crate::layout::StringLayout;
use crate::source::MemorySource;

use byteorder::{ByteOrder, LittleEndian};
use bytemuck::Pod;
use std::sync::Arc;
use std::time::Duration;

/// Typed, optionally cached access to a memory source
pub struct MemoryChannel {
    source: Arc<dyn MemorySource>,
    cache: ReadCache,
}

impl MemoryChannel {
    pub fn new(source: Arc<dyn MemorySource>, cache_ttl: Duration) -> Self {
        Self {
            source,
            cache: ReadCache::new(cache_ttl),
        }
    }

    pub fn source(&self) -> &Arc<dyn MemorySource> {
        &self.source
    }

    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }

    pub fn is_alive(&self) -> bool {
        self.source.is_alive()
    }

    /// Fill `buf` from `address`.
    ///
    /// With `use_cache` a span read within the TTL is served locally and a
    /// miss populates the cache. Without it the read always goes to the
    /// transport and leaves the cache untouched.
    pub fn read_span(&self, address: u64, buf: &mut [u8], use_cache: bool) -> Result<()> {
        ensure_valid_span(address, buf.len())?;
        if use_cache && self.cache.get(address, buf) {
            return Ok(());
        }
        self.source.read_into(address, buf)?;
        if use_cache {
            self.cache.insert(address, buf);
        }
        Ok(())
    }

    pub fn read_value<T: Pod>(&self, address: u64, use_cache: bool) -> Result<T> {
        let mut value = T::zeroed();
        self.read_span(address, bytemuck::bytes_of_mut(&mut value), use_cache)?;
        Ok(value)
    }

    /// Read a raw 64-bit pointer. The value itself is not validated.
    pub fn read_ptr(&self, address: u64, use_cache: bool) -> Result<u64> {
        self.read_value::<u64>(address, use_cache)
    }

    /// Read a pointer and require it to be a plausible address
    pub fn read_valid_ptr(&self, address: u64, use_cache: bool) -> Result<u64> {
        let ptr = self.read_ptr(address, use_cache)?;
        ensure_valid(ptr).map_err(|_| {
            ReadError::access(address, format!("holds invalid pointer {:#x}", ptr))
        })
    }

    /// Follow an offset chain from `base`, see [`chain::resolve`]
    pub fn read_ptr_chain(&self, base: u64, use_cache: bool, offsets: &[u64]) -> Result<u64> {
        chain::resolve(self, base, use_cache, offsets)
    }

    /// Read a managed UTF-16 string object
    pub fn read_string(
        &self,
        address: u64,
        layout: &StringLayout,
        use_cache: bool,
    ) -> Result<String> {
        ensure_valid(address)?;
        let len = self.read_value::<i32>(address + layout.length_offset, use_cache)?;
        if len < 0 || len as usize > layout.max_chars {
            return Err(ReadError::decode(format!(
                "string at {:#x} has length {} (max {})",
                address, len, layout.max_chars
            )));
        }
        if len == 0 {
            return Ok(String::new());
        }

        let mut raw = vec![0u8; len as usize * 2];
        self.read_span(address + layout.chars_offset, &mut raw, use_cache)?;
        let mut units = vec![0u16; len as usize];
        LittleEndian::read_u16_into(&raw, &mut units);
        Ok(String::from_utf16_lossy(&units))
    }

    /// Periodic maintenance: drop expired cache entries
    pub fn maintain(&self) -> usize {
        self.cache.purge_expired()
    }
}
