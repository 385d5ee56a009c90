//! Fake target world for entity tests

use crate::channel::MemoryChannel;
use crate::collection::BufferPool;
use crate::context::ReadContext;
use crate::entity::Vector3;
use crate::layout::LayoutTable;
use crate::source::MockMemorySource;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MODULE_BASE: u64 = 0x7ff6_1000_0000;

/// Builtin layout over a mock address space with the world root linked
pub struct TestWorld {
    pub source: Arc<MockMemorySource>,
    pub layout: Arc<LayoutTable>,
    pub ctx: ReadContext,
    pub world: u64,
    next: AtomicU64,
}

impl TestWorld {
    pub fn new() -> Self {
        let source = Arc::new(MockMemorySource::new());
        let layout = Arc::new(LayoutTable::builtin().unwrap());
        source.add_module(&layout.module, MODULE_BASE, 0x1000);

        let channel = Arc::new(MemoryChannel::new(source.clone(), Duration::from_millis(1)));
        let ctx = ReadContext::new(channel, layout.clone(), Arc::new(BufferPool::default())).unwrap();
        let mut world = Self {
            source,
            layout,
            ctx,
            world: 0,
            next: AtomicU64::new(0x1000_0000),
        };
        world.world = world.link(MODULE_BASE, "game_world");
        world
    }

    /// Fresh zeroed object of `size` bytes, page aligned
    pub fn alloc(&self, size: u64) -> u64 {
        let size = (size.max(1) + 0xFFF) & !0xFFF;
        let address = self.next.fetch_add(size, Ordering::SeqCst);
        self.source.map(address, size as usize);
        address
    }

    /// Build the named chain from `base`, allocating every hop; returns the end
    pub fn link(&self, base: u64, chain: &str) -> u64 {
        let target = self.alloc(0x1000);
        self.link_to(base, chain, target);
        target
    }

    /// Build the named chain from `base` so that it ends at `target`
    pub fn link_to(&self, base: u64, chain: &str, target: u64) {
        let offsets = self.layout.chain(chain).unwrap().to_vec();
        let mut address = base;
        for (i, offset) in offsets.iter().enumerate() {
            let next = if i + 1 == offsets.len() {
                target
            } else {
                self.alloc(0x1000)
            };
            self.source.write_u64(address + offset, next);
            address = next;
        }
    }

    pub fn field(&self, name: &str) -> u64 {
        self.layout.field(name).unwrap()
    }

    /// Lay out `values` at `object` using the named collection shape
    pub fn write_collection(&self, object: u64, name: &str, values: &[u64]) {
        let layout = *self.layout.collection(name).unwrap();
        self.source
            .write_i32(object + layout.count_offset, values.len() as i32);
        let entries = match layout.storage_offset {
            Some(offset) => {
                let storage = self.alloc(layout.data_offset + (values.len() * layout.entry_stride) as u64);
                self.source.write_u64(object + offset, storage);
                storage + layout.data_offset
            }
            None => object + layout.data_offset,
        };
        for (i, value) in values.iter().enumerate() {
            let slot = entries + (i * layout.entry_stride + layout.value_offset) as u64;
            self.source.write_u64(slot, *value);
        }
    }

    pub fn write_vector(&self, address: u64, v: Vector3) {
        self.source.write_value(address, v);
    }

    /// Quest object with an id string and status
    pub fn add_quest(&self, id: &str, status: i32) -> u64 {
        let quest = self.alloc(0x100);
        let id_object = self.link(quest, "quest.id");
        self.source.write_managed_string(id_object, id);
        self.source.write_i32(quest + self.field("quest.status"), status);
        quest
    }

    /// Replace the quest dictionary hanging off the world
    pub fn set_quests(&self, quests: &[u64]) {
        let dictionary = self.link(self.world, "world.quests");
        self.write_collection(dictionary, "quests", quests);
    }
}
