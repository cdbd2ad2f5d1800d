//! # Dependency graph
//!
//! Interprocedural def-use graph over IR values and memory SSA variables,
//! the substrate taint flooding runs on.
//!
//! - `graph`: storage, node identity and queries
//! - `builder`: intra-procedural edges and the five call-site rules
//! - `phi_elimination`: collapse of memory phis with equivalent operands
//! - `dot`: Graphviz export
//!
//! ```text
//! let graph = DependencyGraph::build(&module, &cfgs, &mssa, &cg, &registry, &config);
//! for source in graph.sources() { /* participant identity */ }
//! ```

mod builder;
mod dot;
mod graph;
mod phi_elimination;

pub use graph::{DepGraphStats, DepNode, DepNodeData, DependencyGraph};
