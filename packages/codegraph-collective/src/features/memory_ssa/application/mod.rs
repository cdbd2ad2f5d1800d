//! Application layer for memory SSA

pub mod memory_ssa;

pub use memory_ssa::{MemorySsa, MemorySsaStats};
