//! Process info command handler

use crate::process::ProcessSource;

use anyhow::Result;
use farsight::{BufferPool, LayoutTable, MemoryChannel, ReadContext};
use std::sync::Arc;

/// Handle the Info command
///
/// Prints the process summary and whether the layout's root chain resolves.
pub fn handle(source: Arc<ProcessSource>, layout: LayoutTable) -> Result<()> {
    println!("{}", source.info(&layout.module));
    println!(
        "Layout: {} ({} chains, {} collections)",
        layout.version,
        layout.chains.len(),
        layout.collections.len()
    );

    let channel = Arc::new(MemoryChannel::new(source, farsight::DEFAULT_CACHE_TTL));
    let ctx = ReadContext::new(channel, Arc::new(layout), Arc::new(BufferPool::default()))?;
    match ctx.game_world() {
        Ok(world) => println!("Game world: {:#x}", world),
        Err(err) => println!("Game world: unavailable ({})", err),
    }

    Ok(())
}
