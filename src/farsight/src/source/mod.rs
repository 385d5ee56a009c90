//! Memory Source Abstraction
//!
//! The primitive transport every higher layer reads through:
//! - `MemorySource` - type-agnostic byte reads, batched scatter reads, liveness
//! - `MemoryRegion` - mapped region descriptors used for module lookup
//! - `MockMemorySource` - sparse in-memory address space for tests

#[cfg(test)]
mod mock;
mod region;
mod traits;

#[cfg(test)]
pub use mock::MockMemorySource;
pub use region::MemoryRegion;
pub use traits::{MemorySource, ScatterSlot};
