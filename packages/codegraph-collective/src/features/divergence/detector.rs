//! Divergence detection over collective call sites

use super::pdf::call_pdf_plus;
use super::sequence::{CollectiveSequences, Communicator};
use super::warning::{ConditionSite, LoopAdvisory, Warning};
use crate::config::DetectorConfig;
use crate::features::call_graph::CallGraph;
use crate::features::collectives::{Collective, CollectiveRegistry};
use crate::features::dep_graph::{DepNode, DependencyGraph};
use crate::features::memory_ssa::MemorySsa;
use crate::features::taint::TaintAnalysis;
use crate::ir::{BlockId, FuncId, Function, Module, ModuleCfg, Opcode, ValueId, ValueKind};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct DivergenceStats {
    pub functions: usize,
    pub collectives: usize,
    pub warnings: usize,
    pub conditions: usize,
    /// Counted before consulting taint
    pub warnings_without_dataflow: usize,
    pub conditions_without_dataflow: usize,
    pub loop_advisories: usize,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DivergenceReport {
    pub warnings: Vec<Warning>,
    pub loop_advisories: Vec<LoopAdvisory>,
    pub stats: DivergenceStats,
}

/// Everything the detector reads
pub struct DivergenceDetector<'a> {
    pub module: &'a Module,
    pub cfgs: &'a ModuleCfg,
    pub call_graph: &'a CallGraph,
    pub mssa: &'a MemorySsa,
    pub graph: &'a DependencyGraph,
    pub taint: &'a TaintAnalysis,
    pub registry: &'a CollectiveRegistry,
    pub config: &'a DetectorConfig,
    /// Report every conditional collective
    pub disable_dataflow: bool,
}

impl<'a> DivergenceDetector<'a> {
    pub fn run(&self) -> DivergenceReport {
        let start = Instant::now();
        let sequences = self.config.sequence_filter.then(|| {
            CollectiveSequences::build(self.module, self.cfgs, self.call_graph, self.registry)
        });

        let mut report = DivergenceReport::default();
        for func in self.module.defined_functions() {
            if !self.call_graph.is_reachable_from_entry(func.id) {
                debug!(function = %func.name, "skipping function unreachable from entry points");
                continue;
            }
            report.stats.functions += 1;
            for block in &func.blocks {
                for &inst in &block.insts {
                    let Some(collective) = self.collective_of(inst) else {
                        continue;
                    };
                    self.check_call(func, inst, collective, sequences.as_ref(), &mut report);
                }
            }
        }

        report.stats.warnings = report.warnings.len();
        report.stats.loop_advisories = report.loop_advisories.len();
        report.stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            collectives = report.stats.collectives,
            warnings = report.stats.warnings,
            conditions = report.stats.conditions,
            loop_advisories = report.stats.loop_advisories,
            "divergence detection done"
        );
        report
    }

    /// First registered collective among the call's callees
    fn collective_of(&self, inst: ValueId) -> Option<&'a Collective> {
        let (module, registry) = (self.module, self.registry);
        if !module.opcode(inst).map_or(false, Opcode::is_call) {
            return None;
        }
        let callees = self.call_graph.callees_of_site(inst);
        if callees.is_empty() && module.called_function(inst).is_none() {
            warn!(call = %inst, "indirect call without resolved callee");
        }
        callees
            .iter()
            .find_map(|&f| registry.collective(&module.function(f).name))
    }

    /// Sequence filter for a PDF+ block of a call on `comm`
    ///
    /// Blocks of callers only know a parameter communicator by the actual
    /// bound at their call, so any NAVS communicator counts there.
    fn is_navs_for(
        &self,
        seqs: &CollectiveSequences,
        func: &Function,
        owner: FuncId,
        block: BlockId,
        comm: Communicator,
    ) -> bool {
        let is_param = comm.map_or(false, |v| {
            matches!(self.module.value(v).kind, ValueKind::Argument { .. })
        });
        if owner == func.id || !is_param {
            seqs.is_navs(owner, block, comm)
        } else {
            seqs.is_navs_on_any(owner, block)
        }
    }

    fn check_call(
        &self,
        func: &Function,
        call: ValueId,
        collective: &Collective,
        sequences: Option<&CollectiveSequences>,
        report: &mut DivergenceReport,
    ) {
        let module = self.module;
        report.stats.collectives += 1;

        let comm = collective.comm_arg.and_then(|index| {
            let arg = module.call_args(call).get(index).copied();
            if arg.is_none() {
                warn!(
                    collective = %collective.name,
                    call = %call,
                    "collective call has fewer arguments than its communicator index"
                );
            }
            arg
        });

        let location = module.location(call).cloned();
        let block = module.instruction(call).map(|i| i.block);

        if self.config.loop_advisories {
            let in_loop = block
                .zip(self.cfgs.get(func.id))
                .map_or(false, |(b, cfg)| cfg.in_loop(b));
            if in_loop {
                report.loop_advisories.push(LoopAdvisory {
                    call,
                    collective: collective.name.clone(),
                    function: func.name.clone(),
                    location: location.clone(),
                });
            }
        }

        let mut candidates = Vec::new();
        let mut tainted = Vec::new();
        for (owner, pdf_block) in call_pdf_plus(
            module,
            self.cfgs,
            self.call_graph,
            call,
            self.config.interprocedural_pdf,
        ) {
            let owner_fn = module.function(owner);
            let Some(term) = owner_fn.terminator(pdf_block) else {
                continue;
            };
            let Some(cond) = module.opcode(term).and_then(Opcode::branch_condition) else {
                continue;
            };
            if let Some(seqs) = sequences {
                if !self.is_navs_for(seqs, func, owner, pdf_block, comm) {
                    continue;
                }
            }
            let site = ConditionSite {
                value: cond,
                function: owner_fn.name.clone(),
                block: pdf_block,
                location: module.location(term).cloned(),
            };
            if self.disable_dataflow || self.taint.is_tainted_condition(cond) {
                tainted.push(site.clone());
            }
            candidates.push(site);
        }

        if !candidates.is_empty() {
            report.stats.warnings_without_dataflow += 1;
            report.stats.conditions_without_dataflow += candidates.len();
        }
        if tainted.is_empty() {
            return;
        }

        let trace = self.taint.trace(
            module,
            self.mssa,
            self.graph,
            DepNode::Value(tainted[0].value),
            self.config.max_trace_len,
        );
        report.stats.conditions += tainted.len();

        let warning = Warning {
            call,
            collective: collective.name.clone(),
            function: func.name.clone(),
            location,
            conditions: tainted,
            trace,
        };
        debug!(warning = %warning, "collective may diverge");
        report.warnings.push(warning);
    }
}
