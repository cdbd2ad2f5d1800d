//! Application layer for points-to analysis

pub mod analysis;

pub use analysis::PointsToAnalysis;
