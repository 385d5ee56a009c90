//! Mock Memory Source
//!
//! A sparse, writable fake address space for exercising the engine without a
//! live target. Memory is tracked in 4K pages; reading any unmapped page
//! fails like an unmapped read on real hardware would.

use super::{MemoryRegion, MemorySource, ScatterSlot};
use crate::error::{ChannelError, ReadError, Result};

use bytemuck::Pod;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const PAGE_SIZE: u64 = 0x1000;

/// A mock memory source for testing reads, chains, collections and registries
#[derive(Default)]
pub struct MockMemorySource {
    pages: RwLock<HashMap<u64, Box<[u8]>>>,
    regions: RwLock<Vec<MemoryRegion>>,
    dead: AtomicBool,
    broken: AtomicBool,
    reads: AtomicUsize,
    scatters: AtomicUsize,
    bytes_read: AtomicUsize,
}

impl MockMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module region and map its pages
    pub fn add_module(&self, name: &str, base: u64, size: u64) {
        self.map(base, size as usize);
        self.regions.write().push(MemoryRegion {
            start: base,
            end: base + size,
            perms: "r-xp".to_string(),
            offset: 0,
            path: Some(format!("C:\\Game\\{}", name)),
        });
    }

    /// Map zeroed pages covering `[address, address + len)`
    pub fn map(&self, address: u64, len: usize) {
        let mut pages = self.pages.write();
        let first = address / PAGE_SIZE;
        let last = (address + len.max(1) as u64 - 1) / PAGE_SIZE;
        for page in first..=last {
            pages
                .entry(page)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize].into_boxed_slice());
        }
    }

    /// Remove every page touching `[address, address + len)`
    pub fn unmap(&self, address: u64, len: usize) {
        let mut pages = self.pages.write();
        let first = address / PAGE_SIZE;
        let last = (address + len.max(1) as u64 - 1) / PAGE_SIZE;
        for page in first..=last {
            pages.remove(&page);
        }
    }

    /// Write bytes, mapping pages on demand
    pub fn write_bytes(&self, address: u64, data: &[u8]) {
        self.map(address, data.len());
        let mut pages = self.pages.write();
        for (i, byte) in data.iter().enumerate() {
            let addr = address + i as u64;
            if let Some(page) = pages.get_mut(&(addr / PAGE_SIZE)) {
                page[(addr % PAGE_SIZE) as usize] = *byte;
            }
        }
    }

    pub fn write_value<T: Pod>(&self, address: u64, value: T) {
        self.write_bytes(address, bytemuck::bytes_of(&value));
    }

    pub fn write_u64(&self, address: u64, value: u64) {
        self.write_value(address, value);
    }

    pub fn write_i32(&self, address: u64, value: i32) {
        self.write_value(address, value);
    }

    /// Write a managed UTF-16 string object (length at +0x10, chars at +0x14)
    pub fn write_managed_string(&self, address: u64, text: &str) {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.write_i32(address + 0x10, units.len() as i32);
        let bytes: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
        self.write_bytes(address + 0x14, &bytes);
    }

    pub fn set_alive(&self, alive: bool) {
        self.dead.store(!alive, Ordering::SeqCst);
    }

    /// Make every scatter round trip fail at the transport level
    pub fn set_transport_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// Number of single-span transactions issued
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of scatter round trips issued
    pub fn scatter_count(&self) -> usize {
        self.scatters.load(Ordering::SeqCst)
    }

    /// Total bytes moved by single-span reads
    pub fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.scatters.store(0, Ordering::SeqCst);
        self.bytes_read.store(0, Ordering::SeqCst);
    }

    fn copy_out(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let pages = self.pages.read();
        for (i, out) in buf.iter_mut().enumerate() {
            let addr = address + i as u64;
            let page = pages
                .get(&(addr / PAGE_SIZE))
                .ok_or_else(|| ReadError::access(addr, "unmapped page"))?;
            *out = page[(addr % PAGE_SIZE) as usize];
        }
        Ok(())
    }
}

impl MemorySource for MockMemorySource {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        if !self.is_alive() {
            return Err(ChannelError::ProcessGone.into());
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.bytes_read.fetch_add(buf.len(), Ordering::SeqCst);
        self.copy_out(address, buf)
    }

    fn is_alive(&self) -> bool {
        !self.dead.load(Ordering::SeqCst)
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        self.regions.read().clone()
    }

    fn read_scatter(&self, slots: &mut [ScatterSlot<'_>]) -> Result<()> {
        if !self.is_alive() {
            return Err(ChannelError::ProcessGone.into());
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(ChannelError::Transport("scatter round trip failed".into()).into());
        }
        self.scatters.fetch_add(1, Ordering::SeqCst);
        for slot in slots.iter_mut() {
            slot.ok = self.copy_out(slot.address, slot.buf).is_ok();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_round_trips_writes() {
        let source = MockMemorySource::new();
        source.write_u64(0x10ff8, 0x0807060504030201);

        // Straddles a page boundary
        let bytes = source.read_bytes(0x10ff8, 8).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(source.read_count(), 1);
    }

    #[test]
    fn test_mock_source_unmapped_read_fails() {
        let source = MockMemorySource::new();
        source.map(0x20000, 0x10);
        assert!(source.read_bytes(0x20000, 16).is_ok());
        assert!(matches!(
            source.read_bytes(0x30000, 4),
            Err(ReadError::Access { .. })
        ));

        source.unmap(0x20000, 0x10);
        assert!(source.read_bytes(0x20000, 16).is_err());
    }

    #[test]
    fn test_mock_source_dead_process() {
        let source = MockMemorySource::new();
        source.map(0x20000, 0x10);
        source.set_alive(false);
        assert_eq!(
            source.read_bytes(0x20000, 4).unwrap_err(),
            ReadError::Channel(ChannelError::ProcessGone)
        );
    }

    #[test]
    fn test_mock_source_scatter_marks_each_slot() {
        let source = MockMemorySource::new();
        source.write_u64(0x20000, 7);

        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        let mut slots = [
            ScatterSlot::new(0x20000, &mut a),
            ScatterSlot::new(0x90000, &mut b),
        ];
        source.read_scatter(&mut slots).unwrap();
        assert!(slots[0].ok);
        assert!(!slots[1].ok);
        assert_eq!(source.scatter_count(), 1);
        assert_eq!(source.read_count(), 0);
        assert_eq!(u64::from_le_bytes(a), 7);
    }

    #[test]
    fn test_mock_source_find_module() {
        let source = MockMemorySource::new();
        source.add_module("GameAssembly.dll", 0x7ff0_0000_0000, 0x2000);
        let module = source.find_module("gameassembly.dll").unwrap();
        assert_eq!(module.start, 0x7ff0_0000_0000);
        assert!(source.find_module("UnityPlayer.dll").is_none());
    }

    #[test]
    fn test_managed_string_layout() {
        let source = MockMemorySource::new();
        source.write_managed_string(0x40000, "Hi");
        let bytes = source.read_bytes(0x40010, 8).unwrap();
        assert_eq!(bytes, vec![2, 0, 0, 0, b'H', 0, b'i', 0]);
    }
}
