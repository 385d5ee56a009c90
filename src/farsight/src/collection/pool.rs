//! Pooled byte buffers for bulk collection reads
//!
//! Decoding a collection every tick would otherwise allocate a fresh buffer
//! per collection per tick. Released buffers are kept and handed back out to
//! any later request they are large enough for.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default number of idle buffers kept for reuse
pub const DEFAULT_MAX_IDLE_BUFFERS: usize = 64;

/// Shared pool of reusable byte buffers
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    /// Capacity of every buffer the pool owns, leased or idle
    retained: AtomicUsize,
    leased: AtomicUsize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE_BUFFERS)
    }
}

impl BufferPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            retained: AtomicUsize::new(0),
            leased: AtomicUsize::new(0),
        }
    }

    /// Lease a zeroed buffer of exactly `len` bytes.
    ///
    /// The smallest idle buffer that fits is reused; a new one is allocated
    /// only when none fits. The buffer returns to the pool when dropped.
    pub fn acquire(self: &Arc<Self>, len: usize) -> PooledBuffer {
        let reused = {
            let mut idle = self.idle.lock();
            let best = idle
                .iter()
                .enumerate()
                .filter(|(_, b)| b.capacity() >= len)
                .min_by_key(|(_, b)| b.capacity())
                .map(|(i, _)| i);
            best.map(|i| idle.swap_remove(i))
        };

        let buf = match reused {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, 0);
                buf
            }
            None => {
                let buf = vec![0u8; len];
                self.retained.fetch_add(buf.capacity(), Ordering::SeqCst);
                buf
            }
        };

        self.leased.fetch_add(1, Ordering::SeqCst);
        PooledBuffer {
            buf,
            pool: Arc::clone(self),
        }
    }

    fn release(&self, buf: Vec<u8>) {
        self.leased.fetch_sub(1, Ordering::SeqCst);
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        } else {
            self.retained.fetch_sub(buf.capacity(), Ordering::SeqCst);
        }
    }

    /// Total bytes of memory owned by the pool (leased and idle)
    pub fn retained_bytes(&self) -> usize {
        self.retained.load(Ordering::SeqCst)
    }

    /// Buffers currently leased out
    pub fn outstanding(&self) -> usize {
        self.leased.load(Ordering::SeqCst)
    }

    pub fn idle_buffers(&self) -> usize {
        self.idle.lock().len()
    }

    /// Free every idle buffer. Leased buffers are freed when their owners
    /// drop them.
    pub fn clear(&self) {
        let mut idle = self.idle.lock();
        let freed: usize = idle.iter().map(Vec::capacity).sum();
        idle.clear();
        self.retained.fetch_sub(freed, Ordering::SeqCst);
    }
}

/// A leased buffer, returned to its pool on drop
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.release(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_exact_and_zeroed() {
        let pool = Arc::new(BufferPool::default());
        {
            let mut buf = pool.acquire(16);
            assert_eq!(buf.len(), 16);
            buf.fill(0xAA);
        }
        let buf = pool.acquire(8);
        assert_eq!(&*buf, &[0u8; 8]);
    }

    #[test]
    fn test_release_then_smaller_acquire_does_not_grow() {
        let pool = Arc::new(BufferPool::default());
        let first = pool.acquire(4096);
        let retained = pool.retained_bytes();
        drop(first);

        let again = pool.acquire(4096);
        assert_eq!(pool.retained_bytes(), retained);
        drop(again);

        let smaller = pool.acquire(100);
        assert_eq!(pool.retained_bytes(), retained);
        assert_eq!(pool.outstanding(), 1);
        drop(smaller);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_larger_acquire_allocates() {
        let pool = Arc::new(BufferPool::default());
        drop(pool.acquire(64));
        let before = pool.retained_bytes();
        let big = pool.acquire(1024);
        assert!(pool.retained_bytes() >= before + 1024);
        drop(big);
        assert_eq!(pool.idle_buffers(), 2);
    }

    #[test]
    fn test_best_fit_reuse() {
        let pool = Arc::new(BufferPool::default());
        let a = pool.acquire(1024);
        let b = pool.acquire(128);
        drop(a);
        drop(b);

        let c = pool.acquire(100);
        // The 128-byte buffer is the best fit, leaving the 1K one idle
        assert_eq!(pool.idle_buffers(), 1);
        let d = pool.acquire(1000);
        assert_eq!(pool.idle_buffers(), 0);
        drop((c, d));
    }

    #[test]
    fn test_idle_limit_frees_excess() {
        let pool = Arc::new(BufferPool::new(1));
        let a = pool.acquire(64);
        let b = pool.acquire(64);
        let both = pool.retained_bytes();
        drop(a);
        drop(b);
        assert_eq!(pool.idle_buffers(), 1);
        assert!(pool.retained_bytes() < both);
    }

    #[test]
    fn test_clear_releases_idle_memory() {
        let pool = Arc::new(BufferPool::default());
        drop(pool.acquire(512));
        pool.clear();
        assert_eq!(pool.retained_bytes(), 0);
        assert_eq!(pool.idle_buffers(), 0);
    }
}
