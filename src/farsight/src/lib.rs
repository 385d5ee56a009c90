//! # farsight
//!
//! Remote memory acquisition and structure reconstruction.
//!
//! Reads a foreign process's address space through a [`MemorySource`],
//! follows pointer chains, decodes the target runtime's collections and keeps
//! registries of live objects converged with what the target holds.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use farsight::{LayoutTable, MemorySource, Session, SessionConfig};
//!
//! # fn run(source: Arc<dyn MemorySource>) -> Result<(), Box<dyn std::error::Error>> {
//! let layout = LayoutTable::builtin()?;
//! let session = Session::start(source, layout, SessionConfig::default())?;
//!
//! for player in session.players().entities() {
//!     let player = player.read();
//!     println!("{} at {:?}", player.name, player.position);
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod cache;
pub mod chain;
pub mod channel;
pub mod collection;
pub mod context;
pub mod entities;
pub mod entity;
pub mod error;
pub mod layout;
pub mod registry;
pub mod scatter;
pub mod scheduler;
pub mod session;
pub mod source;

pub use address::{is_valid, MAX_VALID_ADDRESS, MIN_VALID_ADDRESS};
pub use cache::{ReadCache, DEFAULT_CACHE_TTL};
pub use chain::PointerChain;
pub use channel::MemoryChannel;
pub use collection::{
    BufferPool, CollectionKind, CollectionLayout, CollectionReader, PooledBuffer, RemoteSnapshot,
};
pub use context::ReadContext;
pub use entities::{
    Explosive, Grenade, Player, PlayerSide, QuestEntry, QuestStatus, Tripwire, TripwireState,
};
pub use entity::{Tracked, Vector3};
pub use error::{ChannelError, ReadError, Result, SessionError};
pub use layout::{LayoutTable, StringLayout};
pub use registry::{RefreshStats, Registry, Shared};
pub use scatter::{ScatterRequest, ScatterResults, ScatterSummary};
pub use scheduler::{Cadence, CancelToken, Worker};
pub use session::{Session, SessionConfig, SessionSnapshot};
pub use source::{MemoryRegion, MemorySource, ScatterSlot};

/// Serialize an address as a `0x`-prefixed hex string
pub(crate) fn serde_hex<S>(value: &u64, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(&format_args!("{:#x}", value))
}
