//! Concrete tracked object kinds

pub mod explosive;
pub mod player;
pub mod quest;

#[cfg(test)]
pub(crate) mod testing;

pub use explosive::{Explosive, ExplosiveSeed, Grenade, Tripwire, TripwireState};
pub use player::{Player, PlayerSide};
pub use quest::{QuestEntry, QuestStatus};

use crate::chain::PointerChain;
use crate::collection::CollectionLayout;
use crate::context::ReadContext;
use crate::error::Result;
use crate::layout::LayoutTable;

/// A collection hanging off the world root
#[derive(Debug, Clone)]
pub struct WorldCollection {
    pub chain: PointerChain,
    pub layout: CollectionLayout,
}

impl WorldCollection {
    pub fn from_layout(table: &LayoutTable, chain: &str, collection: &str) -> Result<Self> {
        Ok(Self {
            chain: PointerChain::from_layout(table, chain)?,
            layout: *table.collection(collection)?,
        })
    }

    /// Valid element addresses, in collection order
    pub fn read(&self, ctx: &ReadContext) -> Result<Vec<u64>> {
        let world = ctx.game_world()?;
        let base = self.chain.resolve(&ctx.channel, world, true)?;
        ctx.collections().read_addresses(&self.layout, base)
    }
}
