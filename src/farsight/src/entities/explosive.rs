//! Live explosives: thrown grenades and placed tripwires

use super::WorldCollection;
use crate::chain::PointerChain;
use crate::context::ReadContext;
use crate::entity::{Tracked, Vector3};
use crate::error::{ReadError, Result};
use crate::layout::LayoutTable;
use crate::scatter::{ScatterRequest, ScatterResults};

use serde::Serialize;

/// Which world collection an explosive was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplosiveSeed {
    Grenade,
    Tripwire,
}

/// Arming state of a tripwire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripwireState {
    None,
    Wait,
    Active,
    Exploding,
    Exploded,
    Inert,
}

impl TryFrom<i32> for TripwireState {
    type Error = ReadError;

    fn try_from(raw: i32) -> Result<Self> {
        Ok(match raw {
            0 => TripwireState::None,
            1 => TripwireState::Wait,
            2 => TripwireState::Active,
            3 => TripwireState::Exploding,
            4 => TripwireState::Exploded,
            5 => TripwireState::Inert,
            other => return Err(ReadError::decode(format!("tripwire state {}", other))),
        })
    }
}

impl TripwireState {
    pub fn is_spent(&self) -> bool {
        matches!(self, TripwireState::Exploded | TripwireState::Inert)
    }
}

#[derive(Debug, Clone)]
pub struct ExplosiveOffsets {
    grenades: WorldCollection,
    tripwires: WorldCollection,
    grenade_transform: PointerChain,
    position: u64,
    destroyed: u64,
    tripwire_state: u64,
    tripwire_from: u64,
    tripwire_to: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Grenade {
    #[serde(serialize_with = "crate::serde_hex")]
    pub address: u64,
    pub position: Option<Vector3>,
    pub destroyed: bool,
    #[serde(skip)]
    position_address: u64,
    #[serde(skip)]
    destroyed_address: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tripwire {
    #[serde(serialize_with = "crate::serde_hex")]
    pub address: u64,
    /// Anchor points never move once placed
    pub from: Vector3,
    pub to: Vector3,
    pub state: TripwireState,
    #[serde(skip)]
    state_address: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Explosive {
    Grenade(Grenade),
    Tripwire(Tripwire),
}

impl Explosive {
    fn create_grenade(
        ctx: &ReadContext,
        offsets: &ExplosiveOffsets,
        address: u64,
    ) -> Result<Grenade> {
        let transform = offsets.grenade_transform.resolve(&ctx.channel, address, true)?;
        Ok(Grenade {
            address,
            position: None,
            destroyed: false,
            position_address: transform + offsets.position,
            destroyed_address: address + offsets.destroyed,
        })
    }

    fn create_tripwire(
        ctx: &ReadContext,
        offsets: &ExplosiveOffsets,
        address: u64,
    ) -> Result<Tripwire> {
        let channel = &ctx.channel;
        let from = channel.read_value::<Vector3>(address + offsets.tripwire_from, false)?;
        let to = channel.read_value::<Vector3>(address + offsets.tripwire_to, false)?;
        if !from.is_finite() || !to.is_finite() {
            return Err(ReadError::decode(format!(
                "tripwire at {:#x} has non-finite anchors",
                address
            )));
        }
        let state_address = address + offsets.tripwire_state;
        let state = channel.read_value::<i32>(state_address, false)?;
        Ok(Tripwire {
            address,
            from,
            to,
            state: state.try_into()?,
            state_address,
        })
    }

    pub fn is_grenade(&self) -> bool {
        matches!(self, Explosive::Grenade(_))
    }
}

impl Tracked for Explosive {
    type Offsets = ExplosiveOffsets;
    type Seed = ExplosiveSeed;
    const KIND: &'static str = "explosive";

    fn offsets(layout: &LayoutTable) -> Result<ExplosiveOffsets> {
        Ok(ExplosiveOffsets {
            grenades: WorldCollection::from_layout(layout, "world.grenades", "grenades")?,
            tripwires: WorldCollection::from_layout(layout, "world.tripwires", "tripwires")?,
            grenade_transform: PointerChain::from_layout(layout, "grenade.transform")?,
            position: layout.field("transform.position")?,
            destroyed: layout.field("grenade.destroyed")?,
            tripwire_state: layout.field("tripwire.state")?,
            tripwire_from: layout.field("tripwire.from")?,
            tripwire_to: layout.field("tripwire.to")?,
        })
    }

    fn discover(
        ctx: &ReadContext,
        offsets: &ExplosiveOffsets,
    ) -> Result<Vec<(u64, ExplosiveSeed)>> {
        let grenades = offsets.grenades.read(ctx)?;
        let tripwires = offsets.tripwires.read(ctx)?;
        Ok(grenades
            .into_iter()
            .map(|a| (a, ExplosiveSeed::Grenade))
            .chain(tripwires.into_iter().map(|a| (a, ExplosiveSeed::Tripwire)))
            .collect())
    }

    fn create(
        ctx: &ReadContext,
        offsets: &ExplosiveOffsets,
        address: u64,
        seed: ExplosiveSeed,
    ) -> Result<Self> {
        Ok(match seed {
            ExplosiveSeed::Grenade => {
                Explosive::Grenade(Self::create_grenade(ctx, offsets, address)?)
            }
            ExplosiveSeed::Tripwire => {
                Explosive::Tripwire(Self::create_tripwire(ctx, offsets, address)?)
            }
        })
    }

    fn prepare(&self, request: &mut ScatterRequest<'_>) {
        match self {
            Explosive::Grenade(g) => {
                request.prepare_read::<Vector3>(g.position_address);
                request.prepare_read::<u8>(g.destroyed_address);
            }
            Explosive::Tripwire(t) => request.prepare_read::<i32>(t.state_address),
        }
    }

    fn apply(&mut self, results: &ScatterResults) -> Result<()> {
        match self {
            Explosive::Grenade(g) => {
                if let Some(flag) = results.try_read::<u8>(g.destroyed_address) {
                    g.destroyed = flag != 0;
                }
                if let Some(position) = results.try_read::<Vector3>(g.position_address) {
                    if !position.is_finite() {
                        return Err(ReadError::decode(format!(
                            "grenade at {:#x} has non-finite position",
                            g.address
                        )));
                    }
                    g.position = Some(position);
                }
            }
            Explosive::Tripwire(t) => {
                if let Some(raw) = results.try_read::<i32>(t.state_address) {
                    t.state = raw.try_into()?;
                }
            }
        }
        Ok(())
    }

    fn address(&self) -> u64 {
        match self {
            Explosive::Grenade(g) => g.address,
            Explosive::Tripwire(t) => t.address,
        }
    }

    fn position(&self) -> Option<Vector3> {
        match self {
            Explosive::Grenade(g) => g.position,
            Explosive::Tripwire(t) => Some(t.from),
        }
    }

    fn is_destroyed(&self) -> bool {
        match self {
            Explosive::Grenade(g) => g.destroyed,
            Explosive::Tripwire(t) => t.state.is_spent(),
        }
    }
}
