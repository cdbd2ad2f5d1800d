//! # Taint
//!
//! Floods participant identity from the dependency graph's sources.
//!
//! - context-insensitive: one breadth-first flood over the whole graph
//! - context-sensitive: one call-graph traversal per entry point, run on
//!   the rayon pool when enabled
//!
//! Reset nodes (buffers made uniform by a collective) become tainted but
//! never pass taint on.

mod analysis;
mod context_sensitive;
mod taint_set;
mod trace;

pub use analysis::{TaintAnalysis, TaintStats};
pub use context_sensitive::EntryTaint;
pub use taint_set::TaintSet;
pub use trace::TraceStep;
