//! Remote collection decoding
//!
//! Reconstructs foreign runtime collections (arrays, lists, dictionaries, hash
//! sets) from a count read plus one bulk read, using the shapes recorded in the
//! layout table.
//!
//! Layout summary (64-bit managed runtime):
//!
//! | kind       | count    | storage                          | entry                        |
//! |------------|----------|----------------------------------|------------------------------|
//! | array      | +0x18    | inline at +0x20                  | value                        |
//! | list       | +0x18    | `*(+0x10)` array, data at +0x20  | value                        |
//! | dictionary | +0x40    | `*(+0x18)` entries, data at +0x20| hash, next, key, value       |
//! | hash set   | +0x3C    | `*(+0x18)` slots, data at +0x20  | hash, next, value            |
//!
//! Hashed containers are read as their first `count` raw slots. Slots freed
//! by removals can sit inside that range, so a decoded entry may be stale or
//! zero; callers filter out invalid addresses.

mod pool;

pub use pool::{BufferPool, PooledBuffer, DEFAULT_MAX_IDLE_BUFFERS};

use crate::address::is_valid;
use crate::channel::MemoryChannel;
use crate::error::{ReadError, Result};

use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Shape family of a foreign collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Array,
    List,
    Dictionary,
    HashSet,
}

/// Fixed layout of one collection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLayout {
    pub kind: CollectionKind,
    /// Offset of the `i32` element count from the collection base
    pub count_offset: u64,
    /// Offset of the pointer to the backing storage object; absent for
    /// arrays, whose entries are inline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_offset: Option<u64>,
    /// Offset of the first entry from the storage object
    pub data_offset: u64,
    /// Bytes per raw entry
    pub entry_stride: usize,
    /// Offset of the value sub-field within an entry
    #[serde(default)]
    pub value_offset: usize,
}

impl CollectionLayout {
    pub fn is_hashed(&self) -> bool {
        matches!(
            self.kind,
            CollectionKind::Dictionary | CollectionKind::HashSet
        )
    }
}

/// Locally owned, point-in-time copy of a foreign collection.
///
/// Holds the raw entries in a pooled buffer and projects the value sub-field
/// of each entry on access. Dropping the snapshot returns the buffer.
#[derive(Debug)]
pub struct RemoteSnapshot<T: Pod> {
    raw: Option<PooledBuffer>,
    count: usize,
    stride: usize,
    value_offset: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> RemoteSnapshot<T> {
    fn empty() -> Self {
        Self {
            raw: None,
            count: 0,
            stride: 0,
            value_offset: 0,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.count {
            return None;
        }
        let raw = self.raw.as_ref()?;
        let start = index * self.stride + self.value_offset;
        let bytes = raw.get(start..start + std::mem::size_of::<T>())?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Raw bytes backing the snapshot (`len() * stride`)
    pub fn raw_bytes(&self) -> &[u8] {
        self.raw.as_deref().unwrap_or(&[])
    }

    /// Return the buffer to its pool now
    pub fn release(self) {}
}

/// Decodes collections through a channel into pooled snapshots
pub struct CollectionReader<'a> {
    channel: &'a MemoryChannel,
    pool: &'a Arc<BufferPool>,
    ceiling: usize,
}

impl<'a> CollectionReader<'a> {
    pub fn new(channel: &'a MemoryChannel, pool: &'a Arc<BufferPool>, ceiling: usize) -> Self {
        Self {
            channel,
            pool,
            ceiling,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Read and sanity-check the declared element count
    pub fn read_count(&self, layout: &CollectionLayout, base: u64) -> Result<usize> {
        let raw = self
            .channel
            .read_value::<i32>(offset_address(base, layout.count_offset)?, false)?;
        if raw < 0 {
            return Err(ReadError::decode(format!(
                "collection at {:#x} has negative count {}",
                base, raw
            )));
        }
        let count = raw as usize;
        if count > self.ceiling {
            return Err(ReadError::Range {
                count,
                ceiling: self.ceiling,
            });
        }
        Ok(count)
    }

    /// Address of the first raw entry
    fn storage_address(&self, layout: &CollectionLayout, base: u64, use_cache: bool) -> Result<u64> {
        match layout.storage_offset {
            None => offset_address(base, layout.data_offset),
            Some(offset) => {
                let storage = self
                    .channel
                    .read_valid_ptr(offset_address(base, offset)?, use_cache)?;
                offset_address(storage, layout.data_offset)
            }
        }
    }

    /// Decode a collection into a snapshot of `T` values.
    ///
    /// `use_cache` applies to the storage-pointer hop only; the count and the
    /// bulk entry read are always fresh.
    pub fn read<T: Pod>(
        &self,
        layout: &CollectionLayout,
        base: u64,
        use_cache: bool,
    ) -> Result<RemoteSnapshot<T>> {
        let value_size = std::mem::size_of::<T>();
        let value_end = layout.value_offset.checked_add(value_size);
        if value_end.map_or(true, |end| end > layout.entry_stride) {
            return Err(ReadError::decode(format!(
                "{}-byte value at +{:#x} does not fit {:#x}-byte entries",
                value_size, layout.value_offset, layout.entry_stride
            )));
        }

        let count = self.read_count(layout, base)?;
        if count == 0 {
            return Ok(RemoteSnapshot::empty());
        }

        let storage = self.storage_address(layout, base, use_cache)?;
        let len = count
            .checked_mul(layout.entry_stride)
            .ok_or_else(|| ReadError::decode("collection byte length overflows"))?;

        let mut raw = self.pool.acquire(len);
        self.channel.read_span(storage, &mut raw, false)?;

        Ok(RemoteSnapshot {
            raw: Some(raw),
            count,
            stride: layout.entry_stride,
            value_offset: layout.value_offset,
            _marker: PhantomData,
        })
    }

    /// Decode a collection of object references, keeping only plausible
    /// addresses in their original order
    pub fn read_addresses(&self, layout: &CollectionLayout, base: u64) -> Result<Vec<u64>> {
        let snapshot = self.read::<u64>(layout, base, true)?;
        Ok(snapshot.iter().filter(|&addr| is_valid(addr)).collect())
    }
}

/// `base + offset`, rejecting sums that wrap
fn offset_address(base: u64, offset: u64) -> Result<u64> {
    base.checked_add(offset)
        .ok_or_else(|| ReadError::access(base, format!("offset {:#x} overflows", offset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutTable;
    use crate::source::MockMemorySource;
    use proptest::prelude::*;
    use std::time::Duration;

    const CEILING: usize = 16_384;

    struct Fixture {
        source: Arc<MockMemorySource>,
        channel: MemoryChannel,
        pool: Arc<BufferPool>,
        layouts: LayoutTable,
    }

    impl Fixture {
        fn new() -> Self {
            let source = Arc::new(MockMemorySource::new());
            Self {
                channel: MemoryChannel::new(source.clone(), Duration::from_secs(60)),
                source,
                pool: Arc::new(BufferPool::default()),
                layouts: LayoutTable::builtin().unwrap(),
            }
        }

        fn reader(&self) -> CollectionReader<'_> {
            CollectionReader::new(&self.channel, &self.pool, CEILING)
        }

        fn layout(&self, name: &str) -> CollectionLayout {
            *self.layouts.collection(name).unwrap()
        }

        /// Managed list of pointers: list object at `list`, items array at `items`
        fn write_list(&self, list: u64, items: u64, values: &[u64]) {
            self.source.write_u64(list + 0x10, items);
            self.source.write_i32(list + 0x18, values.len() as i32);
            for (i, v) in values.iter().enumerate() {
                self.source.write_u64(items + 0x20 + i as u64 * 8, *v);
            }
        }
    }

    #[test]
    fn test_array_inline_storage() {
        let fx = Fixture::new();
        let base = 0x20000;
        fx.source.write_i32(base + 0x18, 3);
        for (i, v) in [0x30000u64, 0x31000, 0x32000].iter().enumerate() {
            fx.source.write_u64(base + 0x20 + i as u64 * 8, *v);
        }

        let snap = fx
            .reader()
            .read::<u64>(&fx.layout("object_array"), base, false)
            .unwrap();
        assert_eq!(snap.to_vec(), vec![0x30000, 0x31000, 0x32000]);
        assert_eq!(snap.raw_bytes().len(), 24);
    }

    #[test]
    fn test_list_follows_items_pointer() {
        let fx = Fixture::new();
        fx.write_list(0x20000, 0x50000, &[0x60000, 0x61000]);

        let snap = fx
            .reader()
            .read::<u64>(&fx.layout("registered_players"), 0x20000, false)
            .unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get(1), Some(0x61000));
        assert_eq!(snap.get(2), None);
    }

    #[test]
    fn test_dictionary_projects_values() {
        let fx = Fixture::new();
        let dict = 0x20000;
        let entries = 0x50000;
        fx.source.write_u64(dict + 0x18, entries);
        fx.source.write_i32(dict + 0x40, 2);
        for i in 0..2u64 {
            let entry = entries + 0x20 + i * 0x18;
            fx.source.write_i32(entry, 0x1234); // hash code
            fx.source.write_i32(entry + 4, -1); // next
            fx.source.write_u64(entry + 8, 0x70000 + i); // key
            fx.source.write_u64(entry + 0x10, 0x80000 + i * 0x100); // value
        }

        let snap = fx
            .reader()
            .read::<u64>(&fx.layout("quests"), dict, false)
            .unwrap();
        assert_eq!(snap.to_vec(), vec![0x80000, 0x80100]);
    }

    #[test]
    fn test_hash_set_projects_values() {
        let fx = Fixture::new();
        let set = 0x20000;
        let slots = 0x50000;
        fx.source.write_u64(set + 0x18, slots);
        fx.source.write_i32(set + 0x3C, 3);
        for i in 0..3u64 {
            let slot = slots + 0x20 + i * 0x10;
            fx.source.write_i32(slot, 99);
            fx.source.write_i32(slot + 4, i as i32 - 1);
            fx.source.write_u64(slot + 8, 0x90000 + i * 0x10);
        }

        let snap = fx
            .reader()
            .read::<u64>(&fx.layout("tripwires"), set, false)
            .unwrap();
        assert_eq!(snap.to_vec(), vec![0x90000, 0x90010, 0x90020]);
    }

    #[test]
    fn test_empty_collection_skips_storage() {
        let fx = Fixture::new();
        fx.source.write_u64(0x20010, 0); // null items pointer is fine when empty
        fx.source.write_i32(0x20018, 0);

        let snap = fx
            .reader()
            .read::<u64>(&fx.layout("registered_players"), 0x20000, false)
            .unwrap();
        assert!(snap.is_empty());
        assert_eq!(fx.source.read_count(), 1);
        assert_eq!(fx.pool.outstanding(), 0);
    }

    #[test]
    fn test_count_above_ceiling_is_range_error_without_bulk_read() {
        let fx = Fixture::new();
        fx.write_list(0x20000, 0x50000, &[]);
        fx.source.write_i32(0x20018, CEILING as i32 + 1);
        fx.source.reset_counters();

        let err = fx
            .reader()
            .read::<u64>(&fx.layout("registered_players"), 0x20000, false)
            .unwrap_err();
        assert_eq!(
            err,
            ReadError::Range {
                count: CEILING + 1,
                ceiling: CEILING
            }
        );
        // Only the count was read
        assert_eq!(fx.source.read_count(), 1);
        assert_eq!(fx.pool.outstanding(), 0);
    }

    #[test]
    fn test_negative_count_is_decode_error() {
        let fx = Fixture::new();
        fx.source.write_i32(0x20018, -5);
        let err = fx
            .reader()
            .read::<u64>(&fx.layout("object_array"), 0x20000, false)
            .unwrap_err();
        assert!(matches!(err, ReadError::Decode(_)));
    }

    #[test]
    fn test_null_storage_pointer_is_access_error() {
        let fx = Fixture::new();
        fx.source.write_u64(0x20010, 0);
        fx.source.write_i32(0x20018, 4);
        let err = fx
            .reader()
            .read::<u64>(&fx.layout("registered_players"), 0x20000, false)
            .unwrap_err();
        assert!(matches!(err, ReadError::Access { .. }));
    }

    #[test]
    fn test_failed_bulk_read_releases_buffer() {
        let fx = Fixture::new();
        // Items pointer is plausible but unmapped
        fx.source.write_u64(0x20010, 0x7000_0000);
        fx.source.write_i32(0x20018, 4);

        assert!(fx
            .reader()
            .read::<u64>(&fx.layout("registered_players"), 0x20000, false)
            .is_err());
        assert_eq!(fx.pool.outstanding(), 0);
        assert_eq!(fx.pool.idle_buffers(), 1);
    }

    #[test]
    fn test_base_near_top_of_address_space_is_access_error() {
        let fx = Fixture::new();
        let layout = fx.layouts.collection("quests").unwrap();
        assert!(matches!(
            fx.reader().read::<u64>(layout, u64::MAX, false),
            Err(ReadError::Access { .. })
        ));
        assert_eq!(fx.source.read_count(), 0);
    }

    #[test]
    fn test_value_wider_than_entry_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .reader()
            .read::<[u64; 2]>(&fx.layout("object_array"), 0x20000, false)
            .unwrap_err();
        assert!(matches!(err, ReadError::Decode(_)));
    }

    #[test]
    fn test_read_addresses_drops_null_slots() {
        let fx = Fixture::new();
        fx.write_list(0x20000, 0x50000, &[0x60000, 0, 0x61000, 0x10]);

        let addrs = fx
            .reader()
            .read_addresses(&fx.layout("registered_players"), 0x20000)
            .unwrap();
        assert_eq!(addrs, vec![0x60000, 0x61000]);
    }

    #[test]
    fn test_snapshot_release_reuses_pool_memory() {
        let fx = Fixture::new();
        fx.write_list(0x20000, 0x50000, &[0x60000; 32]);
        let layout = fx.layout("registered_players");

        let snap = fx.reader().read::<u64>(&layout, 0x20000, false).unwrap();
        let retained = fx.pool.retained_bytes();
        snap.release();

        fx.source.write_i32(0x20018, 16);
        let smaller = fx.reader().read::<u64>(&layout, 0x20000, false).unwrap();
        assert_eq!(smaller.len(), 16);
        assert_eq!(fx.pool.retained_bytes(), retained);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_decode_yields_exactly_declared_count(count in 0usize..=CEILING) {
            let fx = Fixture::new();
            let base = 0x20000u64;
            fx.source.write_i32(base + 0x18, count as i32);
            fx.source.map(base + 0x20, count.max(1) * 8);

            let snap = fx
                .reader()
                .read::<u64>(&fx.layout("object_array"), base, false)
                .unwrap();
            prop_assert_eq!(snap.len(), count);
            prop_assert_eq!(snap.iter().count(), count);
        }

        #[test]
        fn prop_decode_over_ceiling_never_bulk_reads(excess in 1usize..1_000_000) {
            let fx = Fixture::new();
            let base = 0x20000u64;
            fx.source.write_i32(base + 0x18, (CEILING + excess) as i32);
            fx.source.reset_counters();

            let result = fx.reader().read::<u64>(&fx.layout("object_array"), base, false);
            let is_range = matches!(result, Err(ReadError::Range { .. }));
            prop_assert!(is_range);
            prop_assert_eq!(fx.source.bytes_read(), 4);
        }
    }
}
