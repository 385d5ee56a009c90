//! Entity registry
//!
//! A registry converges a local address-keyed map onto the authoritative set
//! of live remote objects. Each refresh tick:
//!
//! 1. discovers the current address set,
//! 2. creates models for addresses not yet tracked (failures are retried on
//!    a later tick),
//! 3. batches realtime reads for every tracked entity into one scatter,
//! 4. applies the results,
//! 5. drops entities that left the set or report themselves destroyed.
//!
//! An address that reported itself destroyed is not rebuilt while it stays
//! listed; it becomes eligible again once it leaves the set.
//!
//! Entity models are shared as `Arc<RwLock<E>>` so a consumer holding one
//! keeps seeing the same object for as long as it stays tracked.

use crate::context::ReadContext;
use crate::entity::Tracked;
use crate::error::Result;
use crate::layout::LayoutTable;
use crate::scatter::ScatterRequest;
use crate::scheduler::CancelToken;

use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde::Serialize;
use std::cell::Cell;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Shared handle to a tracked entity
pub type Shared<E> = Arc<RwLock<E>>;

/// Outcome of one refresh tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub added: usize,
    pub removed: usize,
    /// Creations or applies that failed this tick
    pub failed: usize,
    pub tracked: usize,
    pub cancelled: bool,
}

/// Address-keyed set of tracked entities of one kind
pub struct Registry<E: Tracked> {
    entities: DashMap<u64, Shared<E>>,
    /// Destroyed addresses still present in the authoritative set
    destroyed: DashSet<u64>,
    offsets: E::Offsets,
}

impl<E: Tracked> Registry<E> {
    pub fn new(layout: &LayoutTable) -> Result<Self> {
        Ok(Self {
            entities: DashMap::new(),
            destroyed: DashSet::new(),
            offsets: E::offsets(layout)?,
        })
    }

    pub fn offsets(&self) -> &E::Offsets {
        &self.offsets
    }

    /// Run one convergence tick.
    ///
    /// A failure to discover the address set or to execute the batch aborts
    /// the tick without touching the map; objects created during an aborted
    /// tick are discarded and created again on the next one. Per-entity
    /// failures are logged and skipped.
    pub fn refresh(&self, ctx: &ReadContext, cancel: &CancelToken) -> Result<RefreshStats> {
        let mut stats = RefreshStats::default();
        let discovered = E::discover(ctx, &self.offsets)?;

        let mut live = HashSet::with_capacity(discovered.len());
        let mut fresh: Vec<(u64, Shared<E>)> = Vec::new();
        for (address, seed) in discovered {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                stats.tracked = self.entities.len();
                return Ok(stats);
            }
            if !live.insert(address)
                || self.entities.contains_key(&address)
                || self.destroyed.contains(&address)
            {
                continue;
            }
            match E::create(ctx, &self.offsets, address, seed) {
                Ok(entity) => fresh.push((address, Arc::new(RwLock::new(entity)))),
                Err(err) => {
                    debug!(
                        kind = E::KIND,
                        address = format_args!("{:#x}", address),
                        error = %err,
                        "create failed"
                    );
                    stats.failed += 1;
                }
            }
        }

        let mut tracked: Vec<Shared<E>> = self
            .entities
            .iter()
            .filter(|entry| live.contains(entry.key()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        tracked.extend(fresh.iter().map(|(_, entity)| Arc::clone(entity)));

        let apply_failures = Cell::new(0usize);
        let mut request = ScatterRequest::new();
        for entity in &tracked {
            entity.read().prepare(&mut request);
        }
        request.on_completed(|results| {
            for entity in &tracked {
                let mut entity = entity.write();
                if let Err(err) = entity.apply(results) {
                    debug!(
                        kind = E::KIND,
                        address = format_args!("{:#x}", entity.address()),
                        error = %err,
                        "apply failed"
                    );
                    apply_failures.set(apply_failures.get() + 1);
                }
            }
        });
        request.execute(&ctx.channel)?;
        stats.failed += apply_failures.get();

        for (address, entity) in fresh {
            trace!(kind = E::KIND, address = format_args!("{:#x}", address), "tracked");
            self.entities.insert(address, entity);
            stats.added += 1;
        }

        self.entities.retain(|address, entity| {
            if !live.contains(address) {
                trace!(kind = E::KIND, address = format_args!("{:#x}", address), "dropped");
                stats.removed += 1;
                return false;
            }
            if entity.read().is_destroyed() {
                trace!(kind = E::KIND, address = format_args!("{:#x}", address), "destroyed");
                self.destroyed.insert(*address);
                stats.removed += 1;
                return false;
            }
            true
        });
        self.destroyed.retain(|address| live.contains(address));
        stats.tracked = self.entities.len();
        Ok(stats)
    }

    pub fn get(&self, address: u64) -> Option<Shared<E>> {
        self.entities.get(&address).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, address: u64) -> bool {
        self.entities.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Tracked addresses in ascending order
    pub fn addresses(&self) -> Vec<u64> {
        let mut addresses: Vec<u64> = self.entities.iter().map(|e| *e.key()).collect();
        addresses.sort_unstable();
        addresses
    }

    /// Handles to every tracked entity, ordered by address
    pub fn entities(&self) -> Vec<Shared<E>> {
        let mut entries: Vec<(u64, Shared<E>)> = self
            .entities
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();
        entries.sort_unstable_by_key(|(address, _)| *address);
        entries.into_iter().map(|(_, e)| e).collect()
    }

    /// Map every tracked entity through `f` under its read lock
    pub fn collect<R>(&self, f: impl Fn(&E) -> R) -> Vec<R> {
        self.entities().iter().map(|e| f(&e.read())).collect()
    }

    pub fn clear(&self) {
        self.entities.clear();
        self.destroyed.clear();
    }
}
