//! Pipeline orchestration
//!
//! cfg -> points-to -> regions -> call graph -> mod/ref -> memory SSA
//! -> dependency graph -> taint -> divergence detection

pub mod report;
pub mod session;

pub use report::{AnalysisReport, AnalysisStats, PhaseTimings};
pub use session::AnalysisSession;

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::collectives::CollectiveRegistry;
use crate::ir::Module;
use tracing::info;

/// Analyze one module end to end
///
/// Fails only on a structurally invalid module or configuration; every
/// well-formed module yields a report, possibly without warnings.
pub fn analyze(
    module: &Module,
    config: &AnalysisConfig,
    registry: &CollectiveRegistry,
) -> Result<AnalysisReport> {
    let session = AnalysisSession::new(module, config.clone(), registry.clone())?;
    let report = session.report();
    info!(
        module = %module.name,
        warnings = report.stats.warnings,
        conditions = report.stats.conditions,
        total_ms = report.stats.timings.total_ms(),
        "analysis complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preset, TaintMode};
    use crate::errors::CollectiveError;
    use crate::features::dep_graph::DepNode;
    use crate::ir::{ModuleBuilder, Type, ValueId};

    /// `MPI_Comm_rank(.., &rank); if (rank == 0) MPI_Barrier(..);`
    fn rank_gated() -> (Module, ValueId) {
        let mut mb = ModuleBuilder::new("gate").source_file("gate.c");
        let rank_fn = mb.declare("MPI_Comm_rank", &[Type::Int, Type::Ptr], Type::Int);
        let barrier_fn = mb.declare("MPI_Barrier", &[Type::Int], Type::Int);
        let main = mb.define("main", &[], Type::Int);
        let barrier = {
            let mut b = mb.body(main);
            let rank = b.alloca("rank");
            let zero = b.const_int(0);
            b.at_line(3).call(rank_fn, &[zero, rank]);
            let value = b.at_line(4).load(Type::Int, rank);
            let cond = b.cmp(value, zero);
            let then = b.block("then");
            let join = b.block("join");
            b.cond_br(cond, then, join);
            b.switch_to(then);
            let barrier = b.at_line(5).call(barrier_fn, &[zero]);
            b.br(join);
            b.switch_to(join);
            b.ret(Some(zero));
            barrier
        };
        (mb.finish(), barrier)
    }

    /// `x = input(); if (x) MPI_Barrier(..);` with no identity source
    fn input_gated() -> (Module, ValueId) {
        let mut mb = ModuleBuilder::new("input");
        let input_fn = mb.declare("input", &[], Type::Int);
        let barrier_fn = mb.declare("MPI_Barrier", &[Type::Int], Type::Int);
        let main = mb.define("main", &[], Type::Int);
        let cond = {
            let mut b = mb.body(main);
            let zero = b.const_int(0);
            let x = b.call(input_fn, &[]);
            let cond = b.cmp(x, zero);
            let then = b.block("then");
            let join = b.block("join");
            b.cond_br(cond, then, join);
            b.switch_to(then);
            b.call(barrier_fn, &[zero]);
            b.br(join);
            b.switch_to(join);
            b.ret(Some(zero));
            x
        };
        (mb.finish(), cond)
    }

    #[test]
    fn test_analyze_reports_rank_gated_barrier() {
        let (module, barrier) = rank_gated();
        let report = analyze(
            &module,
            &AnalysisConfig::default(),
            &CollectiveRegistry::standard(),
        )
        .unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].call, barrier);
        assert_eq!(report.stats.collectives, 1);
        assert_eq!(report.stats.warnings_without_dataflow, 1);
        assert!(report.warning_lines()[0].starts_with("MPI_Barrier line 5"));
    }

    #[test]
    fn test_context_sensitive_preset_agrees_on_single_entry() {
        let (module, _) = rank_gated();
        let registry = CollectiveRegistry::standard();
        let ci = analyze(&module, &AnalysisConfig::default(), &registry).unwrap();
        let cs = analyze(&module, &AnalysisConfig::preset(Preset::Thorough), &registry).unwrap();
        assert_eq!(ci.warning_lines(), cs.warning_lines());
    }

    #[test]
    fn test_disable_dataflow_reports_untainted_condition() {
        let (module, _) = input_gated();
        let registry = CollectiveRegistry::standard();
        let filtered = analyze(&module, &AnalysisConfig::default(), &registry).unwrap();
        assert!(!filtered.has_warnings());

        let config = AnalysisConfig::default().taint(|t| t.disable_dataflow(true));
        let unfiltered = analyze(&module, &config, &registry).unwrap();
        assert_eq!(unfiltered.warnings.len(), 1);
    }

    #[test]
    fn test_session_extra_source_taints_condition() {
        let (module, input) = input_gated();
        let mut session = AnalysisSession::new(
            &module,
            AnalysisConfig::default(),
            CollectiveRegistry::standard(),
        )
        .unwrap();
        assert!(session.divergence().warnings.is_empty());

        assert!(session.add_source(DepNode::Value(input)));
        assert_eq!(session.divergence().warnings.len(), 1);
        assert!(session.dep_graph_dot().contains("orange"));
    }

    #[test]
    fn test_session_stages_are_cached() {
        let (module, _) = rank_gated();
        let config = AnalysisConfig::default()
            .taint(|t| t.mode(TaintMode::ContextSensitive).parallel_entries(false));
        let session =
            AnalysisSession::new(&module, config, CollectiveRegistry::standard()).unwrap();
        let first = session.dep_graph();
        let _ = session.report();
        assert!(std::ptr::eq(first, session.dep_graph()));
        assert!(session.report().stats.timings.dep_graph_ms >= 0.0);
    }

    #[test]
    fn test_invalid_module_is_rejected() {
        let mut mb = ModuleBuilder::new("broken");
        let main = mb.define("main", &[], Type::Void);
        {
            let mut b = mb.body(main);
            b.alloca("x");
        }
        let module = mb.finish();
        let err = analyze(
            &module,
            &AnalysisConfig::default(),
            &CollectiveRegistry::standard(),
        )
        .unwrap_err();
        assert!(matches!(err, CollectiveError::InvalidModule(_)));
    }
}
