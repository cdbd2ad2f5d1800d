//! Staged analysis session
//!
//! Each phase is computed on first access and cached, so tooling can stop
//! at any layer (points-to, regions, memory SSA, dependency graph, taint)
//! and inspect it read-only. Later phases force earlier ones.

use super::report::{AnalysisReport, AnalysisStats, PhaseTimings};
use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::call_graph::CallGraph;
use crate::features::collectives::CollectiveRegistry;
use crate::features::dep_graph::{DepNode, DependencyGraph};
use crate::features::divergence::{DivergenceDetector, DivergenceReport};
use crate::features::memory_region::{MemoryRegions, ModRefAnalysis};
use crate::features::memory_ssa::MemorySsa;
use crate::features::points_to::PointsToAnalysis;
use crate::features::taint::TaintAnalysis;
use crate::ir::{Module, ModuleCfg};
use once_cell::sync::OnceCell;
use std::time::Instant;
use tracing::{debug, warn};

/// A phase result and the time it took
#[derive(Debug)]
struct Timed<T> {
    value: T,
    ms: f64,
}

fn timed<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = f();
    Timed {
        value,
        ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

pub struct AnalysisSession<'m> {
    module: &'m Module,
    config: AnalysisConfig,
    registry: CollectiveRegistry,
    extra_sources: Vec<DepNode>,
    cfgs: OnceCell<Timed<ModuleCfg>>,
    points_to: OnceCell<Timed<PointsToAnalysis>>,
    regions: OnceCell<Timed<MemoryRegions>>,
    call_graph: OnceCell<Timed<CallGraph>>,
    mod_ref: OnceCell<Timed<ModRefAnalysis>>,
    memory_ssa: OnceCell<Timed<MemorySsa>>,
    dep_graph: OnceCell<Timed<DependencyGraph>>,
    taint: OnceCell<Timed<TaintAnalysis>>,
    divergence: OnceCell<Timed<DivergenceReport>>,
}

impl<'m> AnalysisSession<'m> {
    /// Validate the module and configuration; no phase runs yet
    pub fn new(module: &'m Module, config: AnalysisConfig, registry: CollectiveRegistry) -> Result<Self> {
        config.validate()?;
        module.validate()?;
        debug!(
            module = %module.name,
            functions = module.functions.len(),
            values = module.values.len(),
            "analysis session created"
        );
        Ok(Self {
            module,
            config,
            registry,
            extra_sources: Vec::new(),
            cfgs: OnceCell::new(),
            points_to: OnceCell::new(),
            regions: OnceCell::new(),
            call_graph: OnceCell::new(),
            mod_ref: OnceCell::new(),
            memory_ssa: OnceCell::new(),
            dep_graph: OnceCell::new(),
            taint: OnceCell::new(),
            divergence: OnceCell::new(),
        })
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn registry(&self) -> &CollectiveRegistry {
        &self.registry
    }

    /// Mark an extra taint source
    ///
    /// Discards taint and detection results computed so far. Returns false
    /// when the node does not exist in an already built graph.
    pub fn add_source(&mut self, node: DepNode) -> bool {
        self.taint.take();
        self.divergence.take();
        match self.dep_graph.get_mut() {
            Some(graph) => {
                let added = graph.value.add_source(node);
                if added {
                    self.extra_sources.push(node);
                }
                added
            }
            None => {
                self.extra_sources.push(node);
                true
            }
        }
    }

    pub fn cfgs(&self) -> &ModuleCfg {
        &self
            .cfgs
            .get_or_init(|| timed(|| ModuleCfg::build(self.module)))
            .value
    }

    pub fn points_to(&self) -> &PointsToAnalysis {
        &self
            .points_to
            .get_or_init(|| timed(|| PointsToAnalysis::run(self.module, &self.config.points_to)))
            .value
    }

    pub fn regions(&self) -> &MemoryRegions {
        let pta = self.points_to();
        &self
            .regions
            .get_or_init(|| timed(|| MemoryRegions::build(self.module, pta, &self.config.regions)))
            .value
    }

    pub fn call_graph(&self) -> &CallGraph {
        let pta = self.points_to();
        &self
            .call_graph
            .get_or_init(|| timed(|| CallGraph::build(self.module, pta)))
            .value
    }

    pub fn mod_ref(&self) -> &ModRefAnalysis {
        let (pta, regions, cg) = (self.points_to(), self.regions(), self.call_graph());
        &self
            .mod_ref
            .get_or_init(|| timed(|| ModRefAnalysis::build(self.module, pta, regions, cg)))
            .value
    }

    pub fn memory_ssa(&self) -> &MemorySsa {
        let cfgs = self.cfgs();
        let (pta, regions, cg, modref) = (
            self.points_to(),
            self.regions(),
            self.call_graph(),
            self.mod_ref(),
        );
        &self
            .memory_ssa
            .get_or_init(|| {
                timed(|| {
                    MemorySsa::build(
                        self.module,
                        cfgs,
                        pta,
                        regions,
                        modref,
                        cg,
                        &self.config.memory_ssa,
                    )
                })
            })
            .value
    }

    pub fn dep_graph(&self) -> &DependencyGraph {
        let (cfgs, mssa, cg) = (self.cfgs(), self.memory_ssa(), self.call_graph());
        &self
            .dep_graph
            .get_or_init(|| {
                timed(|| {
                    let mut graph = DependencyGraph::build(
                        self.module,
                        cfgs,
                        mssa,
                        cg,
                        &self.registry,
                        &self.config.dep_graph,
                    );
                    for &node in &self.extra_sources {
                        if !graph.add_source(node) {
                            warn!(node = %node, "extra source is not in the dependency graph");
                        }
                    }
                    graph
                })
            })
            .value
    }

    pub fn taint(&self) -> &TaintAnalysis {
        let (graph, cg) = (self.dep_graph(), self.call_graph());
        &self
            .taint
            .get_or_init(|| timed(|| TaintAnalysis::run(self.module, graph, cg, &self.config.taint)))
            .value
    }

    pub fn divergence(&self) -> &DivergenceReport {
        let cfgs = self.cfgs();
        let (cg, mssa, graph, taint) = (
            self.call_graph(),
            self.memory_ssa(),
            self.dep_graph(),
            self.taint(),
        );
        &self
            .divergence
            .get_or_init(|| {
                timed(|| {
                    DivergenceDetector {
                        module: self.module,
                        cfgs,
                        call_graph: cg,
                        mssa,
                        graph,
                        taint,
                        registry: &self.registry,
                        config: &self.config.detector,
                        disable_dataflow: self.config.taint.disable_dataflow,
                    }
                    .run()
                })
            })
            .value
    }

    /// DOT rendering of the dependency graph with taint highlighted
    pub fn dep_graph_dot(&self) -> String {
        self.dep_graph()
            .to_dot(self.module, self.memory_ssa(), Some(self.taint()))
    }

    fn timings(&self) -> PhaseTimings {
        fn ms<T>(cell: &OnceCell<Timed<T>>) -> f64 {
            cell.get().map_or(0.0, |t| t.ms)
        }
        PhaseTimings {
            cfg_ms: ms(&self.cfgs),
            points_to_ms: ms(&self.points_to),
            regions_ms: ms(&self.regions),
            call_graph_ms: ms(&self.call_graph),
            mod_ref_ms: ms(&self.mod_ref),
            memory_ssa_ms: ms(&self.memory_ssa),
            dep_graph_ms: ms(&self.dep_graph),
            taint_ms: ms(&self.taint),
            detection_ms: ms(&self.divergence),
        }
    }

    /// Run every remaining phase and assemble the report
    pub fn report(&self) -> AnalysisReport {
        let divergence = self.divergence();
        let d = &divergence.stats;
        let stats = AnalysisStats {
            functions: d.functions,
            collectives: d.collectives,
            warnings: d.warnings,
            conditions: d.conditions,
            warnings_without_dataflow: d.warnings_without_dataflow,
            conditions_without_dataflow: d.conditions_without_dataflow,
            loop_advisories: d.loop_advisories,
            regions: self.regions().len(),
            points_to: self.points_to().stats().clone(),
            memory_ssa: self.memory_ssa().stats().clone(),
            dep_graph: self.dep_graph().stats().clone(),
            taint: self.taint().stats().clone(),
            timings: self.timings(),
        };
        AnalysisReport {
            module: self.module.name.clone(),
            warnings: divergence.warnings.clone(),
            loop_advisories: divergence.loop_advisories.clone(),
            stats,
        }
    }
}
