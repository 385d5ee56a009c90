//! Tracked entity abstraction
//!
//! Every remote object kind the engine follows implements [`Tracked`]: how to
//! find the authoritative address set, how to build a local model the first
//! time an address appears, and which realtime fields to refresh each tick.

use crate::context::ReadContext;
use crate::error::Result;
use crate::layout::LayoutTable;
use crate::scatter::{ScatterRequest, ScatterResults};

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

/// World-space position as laid out in the target
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn distance(&self, other: &Vector3) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Vector3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// A remote object kind kept in a [`Registry`](crate::registry::Registry)
pub trait Tracked: Sized + Send + Sync + 'static {
    /// Offsets resolved from the layout table once per session
    type Offsets: Send + Sync;
    /// Per-address data discovery hands to `create`
    type Seed: Send;

    /// Short name used in logs
    const KIND: &'static str;

    fn offsets(layout: &LayoutTable) -> Result<Self::Offsets>;

    /// Enumerate the authoritative set of live addresses
    fn discover(ctx: &ReadContext, offsets: &Self::Offsets) -> Result<Vec<(u64, Self::Seed)>>;

    /// Read the one-time fields of a newly seen object
    fn create(
        ctx: &ReadContext,
        offsets: &Self::Offsets,
        address: u64,
        seed: Self::Seed,
    ) -> Result<Self>;

    /// Register this tick's realtime reads
    fn prepare(&self, request: &mut ScatterRequest<'_>);

    /// Fold completed realtime reads into the model.
    ///
    /// Missing values leave the previous value in place. Data that cannot be
    /// right (non-finite positions, impossible states) is an error.
    fn apply(&mut self, results: &ScatterResults) -> Result<()>;

    fn address(&self) -> u64;

    fn position(&self) -> Option<Vector3> {
        None
    }

    /// Whether the object reports itself gone while still listed
    fn is_destroyed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_layout_matches_target() {
        assert_eq!(std::mem::size_of::<Vector3>(), 12);
        let raw = [1.0f32, -2.5, 3.0];
        let v: Vector3 = bytemuck::pod_read_unaligned(bytemuck::cast_slice(&raw));
        assert_eq!(v, Vector3::new(1.0, -2.5, 3.0));
    }

    #[test]
    fn test_vector_finite_and_distance() {
        assert!(Vector3::new(0.0, 1.0, 2.0).is_finite());
        assert!(!Vector3::new(f32::NAN, 1.0, 2.0).is_finite());
        assert!(!Vector3::new(0.0, f32::INFINITY, 2.0).is_finite());
        let d = Vector3::new(0.0, 0.0, 0.0).distance(&Vector3::new(3.0, 4.0, 0.0));
        assert!((d - 5.0).abs() < f32::EPSILON);
    }
}
