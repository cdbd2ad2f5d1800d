//! Memory regions and mod/ref summaries
//!
//! Regions group abstract objects from the points-to analysis; memory SSA
//! versions one region at a time.

pub mod mod_ref;
pub mod region;
pub mod union_find;

pub use mod_ref::ModRefAnalysis;
pub use region::{MemoryRegions, Region, RegionId};
pub use union_find::UnionFind;
