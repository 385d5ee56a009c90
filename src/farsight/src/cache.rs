//! Short-TTL read cache
//!
//! Memoizes span reads for fields that tolerate staleness (type pointers,
//! static roots, names). Keyed by `(address, size)` so two reads of different
//! widths at one address never alias. Safe for concurrent use by every
//! subsystem thread.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Default time a cached span stays valid
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Box<[u8]>,
    stored_at: Instant,
}

/// Concurrent `(address, size) -> (bytes, timestamp)` cache
#[derive(Debug)]
pub struct ReadCache {
    ttl: Duration,
    entries: DashMap<(u64, usize), CacheEntry>,
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Copy a fresh cached span into `buf`. Returns false on miss or expiry.
    pub fn get(&self, address: u64, buf: &mut [u8]) -> bool {
        let key = (address, buf.len());
        let hit = match self.entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                buf.copy_from_slice(&entry.bytes);
                true
            }
            Some(_) => false,
            None => return false,
        };
        if !hit {
            self.entries
                .remove_if(&key, |_, e| e.stored_at.elapsed() > self.ttl);
        }
        hit
    }

    pub fn insert(&self, address: u64, bytes: &[u8]) {
        self.entries.insert(
            (address, bytes.len()),
            CacheEntry {
                bytes: bytes.into(),
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop all entries older than the TTL, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.stored_at.elapsed() <= ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
