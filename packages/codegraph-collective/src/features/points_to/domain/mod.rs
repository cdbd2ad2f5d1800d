//! Domain models for points-to analysis

pub mod constraint;
pub mod node;

pub use constraint::{Constraint, ConstraintKind, ConstraintSet};
pub use node::{Node, NodeFactory, NodeId, NodeKind};
