//! Analysis report and statistics

use crate::features::dep_graph::DepGraphStats;
use crate::features::divergence::{LoopAdvisory, Warning};
use crate::features::memory_ssa::MemorySsaStats;
use crate::features::points_to::AndersenStats;
use crate::features::taint::TaintStats;
use serde::Serialize;
use std::fmt::Write;

/// Wall time per pipeline phase, milliseconds
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseTimings {
    pub cfg_ms: f64,
    pub points_to_ms: f64,
    pub regions_ms: f64,
    pub call_graph_ms: f64,
    pub mod_ref_ms: f64,
    pub memory_ssa_ms: f64,
    pub dep_graph_ms: f64,
    pub taint_ms: f64,
    pub detection_ms: f64,
}

impl PhaseTimings {
    pub fn total_ms(&self) -> f64 {
        self.cfg_ms
            + self.points_to_ms
            + self.regions_ms
            + self.call_graph_ms
            + self.mod_ref_ms
            + self.memory_ssa_ms
            + self.dep_graph_ms
            + self.taint_ms
            + self.detection_ms
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisStats {
    pub functions: usize,
    pub collectives: usize,
    pub warnings: usize,
    pub conditions: usize,
    pub warnings_without_dataflow: usize,
    pub conditions_without_dataflow: usize,
    pub loop_advisories: usize,
    pub regions: usize,
    pub points_to: AndersenStats,
    pub memory_ssa: MemorySsaStats,
    pub dep_graph: DepGraphStats,
    pub taint: TaintStats,
    pub timings: PhaseTimings,
}

impl AnalysisStats {
    /// Multi-line human summary
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "functions analyzed:          {}", self.functions);
        let _ = writeln!(out, "collectives found:           {}", self.collectives);
        let _ = writeln!(out, "warnings:                    {}", self.warnings);
        let _ = writeln!(out, "conditions:                  {}", self.conditions);
        let _ = writeln!(
            out,
            "warnings without data flow:  {}",
            self.warnings_without_dataflow
        );
        let _ = writeln!(
            out,
            "conditions without data flow: {}",
            self.conditions_without_dataflow
        );
        let _ = writeln!(out, "loop advisories:             {}", self.loop_advisories);
        let _ = writeln!(
            out,
            "dependency graph:            {} nodes, {} edges, {} phis eliminated",
            self.dep_graph.nodes, self.dep_graph.edges, self.dep_graph.phis_eliminated
        );
        let _ = write!(out, "total time:                  {:.2} ms", self.timings.total_ms());
        out
    }
}

/// Result of [`analyze`](crate::pipeline::analyze)
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub module: String,
    pub warnings: Vec<Warning>,
    pub loop_advisories: Vec<LoopAdvisory>,
    pub stats: AnalysisStats,
}

impl AnalysisReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// One line per warning, in report order
    pub fn warning_lines(&self) -> Vec<String> {
        self.warnings.iter().map(Warning::to_string).collect()
    }

    pub fn to_json(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
