//! Players registered in the current world

use super::WorldCollection;
use crate::chain::PointerChain;
use crate::context::ReadContext;
use crate::entity::{Tracked, Vector3};
use crate::error::{ReadError, Result};
use crate::layout::LayoutTable;
use crate::scatter::{ScatterRequest, ScatterResults};

use serde::Serialize;

/// Faction a player spawned as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSide {
    Usec,
    Bear,
    Scav,
    Unknown(i32),
}

impl From<i32> for PlayerSide {
    fn from(raw: i32) -> Self {
        match raw {
            1 => PlayerSide::Usec,
            2 => PlayerSide::Bear,
            4 => PlayerSide::Scav,
            other => PlayerSide::Unknown(other),
        }
    }
}

impl std::fmt::Display for PlayerSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerSide::Usec => write!(f, "USEC"),
            PlayerSide::Bear => write!(f, "BEAR"),
            PlayerSide::Scav => write!(f, "SCAV"),
            PlayerSide::Unknown(raw) => write!(f, "side {}", raw),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerOffsets {
    registered: WorldCollection,
    info: PointerChain,
    nickname: PointerChain,
    transform: PointerChain,
    side: u64,
    is_alive: u64,
    position: u64,
}

/// A player model. Name and side are read once; position and liveness are
/// refreshed every tick.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    #[serde(serialize_with = "crate::serde_hex")]
    pub address: u64,
    pub name: String,
    pub side: PlayerSide,
    /// First entry of the registered list is the local player
    pub is_local: bool,
    pub alive: bool,
    pub position: Option<Vector3>,
    #[serde(skip)]
    position_address: u64,
    #[serde(skip)]
    alive_address: u64,
}

impl Tracked for Player {
    type Offsets = PlayerOffsets;
    /// Index in the registered list
    type Seed = usize;
    const KIND: &'static str = "player";

    fn offsets(layout: &LayoutTable) -> Result<PlayerOffsets> {
        Ok(PlayerOffsets {
            registered: WorldCollection::from_layout(
                layout,
                "world.registered_players",
                "registered_players",
            )?,
            info: PointerChain::from_layout(layout, "player.info")?,
            nickname: PointerChain::from_layout(layout, "player.nickname")?,
            transform: PointerChain::from_layout(layout, "player.transform")?,
            side: layout.field("player_info.side")?,
            is_alive: layout.field("player.is_alive")?,
            position: layout.field("transform.position")?,
        })
    }

    fn discover(ctx: &ReadContext, offsets: &PlayerOffsets) -> Result<Vec<(u64, usize)>> {
        let players = offsets.registered.read(ctx)?;
        Ok(players.into_iter().enumerate().map(|(i, a)| (a, i)).collect())
    }

    fn create(
        ctx: &ReadContext,
        offsets: &PlayerOffsets,
        address: u64,
        index: usize,
    ) -> Result<Self> {
        let channel = &ctx.channel;
        let info = offsets.info.resolve(channel, address, true)?;
        let name_object = offsets.nickname.resolve(channel, address, true)?;
        let name = channel.read_string(name_object, &ctx.layout.strings, true)?;
        let side = channel.read_value::<i32>(info + offsets.side, true)?;
        let transform = offsets.transform.resolve(channel, address, true)?;

        Ok(Self {
            address,
            name,
            side: side.into(),
            is_local: index == 0,
            alive: true,
            position: None,
            position_address: transform + offsets.position,
            alive_address: address + offsets.is_alive,
        })
    }

    fn prepare(&self, request: &mut ScatterRequest<'_>) {
        request.prepare_read::<Vector3>(self.position_address);
        request.prepare_read::<u8>(self.alive_address);
    }

    fn apply(&mut self, results: &ScatterResults) -> Result<()> {
        if let Some(alive) = results.try_read::<u8>(self.alive_address) {
            self.alive = alive != 0;
        }
        if let Some(position) = results.try_read::<Vector3>(self.position_address) {
            if !position.is_finite() {
                return Err(ReadError::decode(format!(
                    "player {} position {:?} is not finite",
                    self.name, position
                )));
            }
            self.position = Some(position);
        }
        Ok(())
    }

    fn address(&self) -> u64 {
        self.address
    }

    fn position(&self) -> Option<Vector3> {
        self.position
    }
}
