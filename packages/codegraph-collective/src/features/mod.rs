//! Feature modules, in pipeline order
//!
//! collectives -> points_to -> call_graph -> memory_region -> memory_ssa
//! -> dep_graph -> taint -> divergence

/// Collective registry, identity sources, external call summaries
pub mod collectives;

/// Andersen points-to analysis
pub mod points_to;

/// Direct and resolved indirect call edges
pub mod call_graph;

/// Memory regions and interprocedural mod/ref
pub mod memory_region;

/// Region-based memory SSA (chi, mu, phi)
pub mod memory_ssa;

/// Value/memory dependency graph and phi elimination
pub mod dep_graph;

/// Participant-identity taint propagation
pub mod taint;

/// Collective divergence detection
pub mod divergence;
