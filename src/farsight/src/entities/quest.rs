//! Quest progress of the local profile

use super::WorldCollection;
use crate::chain::PointerChain;
use crate::context::ReadContext;
use crate::entity::Tracked;
use crate::error::Result;
use crate::layout::LayoutTable;
use crate::scatter::{ScatterRequest, ScatterResults};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Locked,
    AvailableForStart,
    Started,
    AvailableForFinish,
    Success,
    Fail,
    FailRestartable,
    MarkedAsFailed,
    Expired,
    AvailableAfter,
    Unknown(i32),
}

impl From<i32> for QuestStatus {
    fn from(raw: i32) -> Self {
        match raw {
            0 => QuestStatus::Locked,
            1 => QuestStatus::AvailableForStart,
            2 => QuestStatus::Started,
            3 => QuestStatus::AvailableForFinish,
            4 => QuestStatus::Success,
            5 => QuestStatus::Fail,
            6 => QuestStatus::FailRestartable,
            7 => QuestStatus::MarkedAsFailed,
            8 => QuestStatus::Expired,
            9 => QuestStatus::AvailableAfter,
            other => QuestStatus::Unknown(other),
        }
    }
}

impl QuestStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, QuestStatus::Started | QuestStatus::AvailableForFinish)
    }
}

#[derive(Debug, Clone)]
pub struct QuestOffsets {
    quests: WorldCollection,
    id: PointerChain,
    status: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestEntry {
    #[serde(serialize_with = "crate::serde_hex")]
    pub address: u64,
    pub id: String,
    pub status: QuestStatus,
    #[serde(skip)]
    status_address: u64,
}

impl Tracked for QuestEntry {
    type Offsets = QuestOffsets;
    type Seed = ();
    const KIND: &'static str = "quest";

    fn offsets(layout: &LayoutTable) -> Result<QuestOffsets> {
        Ok(QuestOffsets {
            quests: WorldCollection::from_layout(layout, "world.quests", "quests")?,
            id: PointerChain::from_layout(layout, "quest.id")?,
            status: layout.field("quest.status")?,
        })
    }

    fn discover(ctx: &ReadContext, offsets: &QuestOffsets) -> Result<Vec<(u64, ())>> {
        Ok(offsets
            .quests
            .read(ctx)?
            .into_iter()
            .map(|a| (a, ()))
            .collect())
    }

    fn create(ctx: &ReadContext, offsets: &QuestOffsets, address: u64, _: ()) -> Result<Self> {
        let id_object = offsets.id.resolve(&ctx.channel, address, true)?;
        let id = ctx.channel.read_string(id_object, &ctx.layout.strings, true)?;
        let status_address = address + offsets.status;
        let status = ctx.channel.read_value::<i32>(status_address, false)?;
        Ok(Self {
            address,
            id,
            status: status.into(),
            status_address,
        })
    }

    fn prepare(&self, request: &mut ScatterRequest<'_>) {
        request.prepare_read::<i32>(self.status_address);
    }

    fn apply(&mut self, results: &ScatterResults) -> Result<()> {
        if let Some(raw) = results.try_read::<i32>(self.status_address) {
            self.status = raw.into();
        }
        Ok(())
    }

    fn address(&self) -> u64 {
        self.address
    }
}
