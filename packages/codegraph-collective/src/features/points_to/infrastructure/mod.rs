//! Constraint collection and solving

pub mod andersen_solver;
pub mod collector;

pub use andersen_solver::{AndersenSolver, AndersenStats};
pub use collector::{call_constraints, fold_constant, CollectedConstraints, ConstraintCollector};
