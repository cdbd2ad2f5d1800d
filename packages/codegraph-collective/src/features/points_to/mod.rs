//! Andersen points-to analysis
//!
//! Inclusion-based, field-insensitive, context-insensitive. Value nodes
//! stand for pointer-typed values, object nodes for abstract memory:
//! allocas, globals, functions and heap-allocating call sites.
//!
//! ```text
//! use codegraph_collective::features::points_to::PointsToAnalysis;
//!
//! let pta = PointsToAnalysis::run(&module, &PointsToConfig::default());
//! let sites = pta.points_to_sites(value);
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::PointsToAnalysis;
pub use domain::{Constraint, ConstraintKind, ConstraintSet, NodeFactory, NodeId, NodeKind};
pub use infrastructure::{AndersenSolver, AndersenStats, ConstraintCollector};
