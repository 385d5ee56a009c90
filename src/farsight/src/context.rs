//! Shared read context handed to every refresh loop.

use crate::address::ensure_valid;
use crate::chain::PointerChain;
use crate::channel::MemoryChannel;
use crate::collection::{BufferPool, CollectionReader};
use crate::error::{ReadError, Result};
use crate::layout::LayoutTable;

use std::sync::{Arc, OnceLock};

/// Channel, layout table and buffer pool for one attached process
pub struct ReadContext {
    pub channel: Arc<MemoryChannel>,
    pub layout: Arc<LayoutTable>,
    pub pool: Arc<BufferPool>,
    module_base: OnceLock<u64>,
    world_chain: PointerChain,
}

impl ReadContext {
    pub fn new(
        channel: Arc<MemoryChannel>,
        layout: Arc<LayoutTable>,
        pool: Arc<BufferPool>,
    ) -> Result<Self> {
        let world_chain = PointerChain::from_layout(&layout, "game_world")?;
        Ok(Self {
            channel,
            layout,
            pool,
            module_base: OnceLock::new(),
            world_chain,
        })
    }

    pub fn collections(&self) -> CollectionReader<'_> {
        CollectionReader::new(&self.channel, &self.pool, self.layout.max_collection_count)
    }

    /// Base address of the anchor module, looked up once per process
    pub fn module_base(&self) -> Result<u64> {
        if let Some(base) = self.module_base.get() {
            return Ok(*base);
        }
        let module = self
            .channel
            .source()
            .find_module(&self.layout.module)
            .ok_or_else(|| ReadError::access(0, format!("module {} not mapped", self.layout.module)))?;
        let base = ensure_valid(module.start)?;
        Ok(*self.module_base.get_or_init(|| base))
    }

    /// Root object every subsystem starts from. Fails while no session is
    /// loaded in the target; loops retry next cycle.
    pub fn game_world(&self) -> Result<u64> {
        let base = self.module_base()?;
        self.world_chain.resolve(&self.channel, base, true)
    }
}
