//! Taint flooding over the dependency graph

use super::context_sensitive::{EntryTaint, EntryWalker, Membership};
use super::taint_set::TaintSet;
use super::trace::{backward_path, TraceStep};
use crate::config::{TaintConfig, TaintMode};
use crate::features::call_graph::CallGraph;
use crate::features::dep_graph::{DepNode, DependencyGraph};
use crate::features::memory_ssa::MemorySsa;
use crate::ir::{FuncId, Module, ValueId};
use petgraph::stable_graph::NodeIndex;
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::time::Instant;
use tracing::{info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaintStats {
    pub mode: TaintMode,
    pub entries: usize,
    pub sources: usize,
    pub tainted_nodes: usize,
    pub tainted_conditions: usize,
    pub duration_ms: f64,
}

/// Nodes reachable from participant-identity sources
#[derive(Debug, Clone)]
pub struct TaintAnalysis {
    mode: TaintMode,
    /// Union over every context
    tainted: TaintSet,
    /// Per entry point, context-sensitive mode only
    contexts: Vec<EntryTaint>,
    conditions: BTreeSet<ValueId>,
    stats: TaintStats,
}

impl TaintAnalysis {
    pub fn run(
        module: &Module,
        graph: &DependencyGraph,
        call_graph: &CallGraph,
        config: &TaintConfig,
    ) -> Self {
        let start = Instant::now();
        let mut analysis = match config.mode {
            TaintMode::ContextInsensitive => Self::flood_all(graph),
            TaintMode::ContextSensitive => Self::per_entry(module, graph, call_graph, config),
        };
        analysis.stats.mode = config.mode;
        analysis.stats.sources = graph.sources().count();
        analysis.stats.tainted_nodes = analysis.tainted.len();
        analysis.stats.tainted_conditions = analysis.conditions.len();
        analysis.stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            mode = ?config.mode,
            entries = analysis.stats.entries,
            sources = analysis.stats.sources,
            tainted = analysis.stats.tainted_nodes,
            duration_ms = analysis.stats.duration_ms,
            "taint flooding done"
        );
        analysis
    }

    fn flood_all(graph: &DependencyGraph) -> Self {
        let mut tainted = TaintSet::new(graph.node_bound());
        let mut queue: VecDeque<NodeIndex> = graph
            .sources()
            .filter_map(|s| graph.index_of(s))
            .filter(|&ix| tainted.insert(ix))
            .collect();

        while let Some(ix) = queue.pop_front() {
            if graph.is_reset(ix) {
                continue;
            }
            for succ in graph.successors(ix) {
                if tainted.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }

        let conditions = tainted
            .iter()
            .filter_map(|ix| match graph.node(ix) {
                DepNode::Value(v) => Some(v),
                DepNode::Var(..) => None,
            })
            .collect();

        Self {
            mode: TaintMode::ContextInsensitive,
            tainted,
            contexts: Vec::new(),
            conditions,
            stats: TaintStats::default(),
        }
    }

    fn per_entry(
        module: &Module,
        graph: &DependencyGraph,
        call_graph: &CallGraph,
        config: &TaintConfig,
    ) -> Self {
        let entries: Vec<FuncId> = call_graph
            .entries()
            .iter()
            .copied()
            .filter(|&f| !module.function(f).is_declaration())
            .collect();
        if entries.is_empty() {
            warn!("no defined entry point, context-sensitive taint is empty");
        }

        let membership = Membership::new(graph, module);
        let walk = |&entry: &FuncId| EntryWalker::new(graph, call_graph, module, &membership).run(entry);

        #[cfg(feature = "parallel")]
        let contexts: Vec<EntryTaint> = if config.parallel_entries {
            entries.par_iter().map(walk).collect()
        } else {
            entries.iter().map(walk).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let contexts: Vec<EntryTaint> = {
            let _ = config.parallel_entries;
            entries.iter().map(walk).collect()
        };

        let mut tainted = TaintSet::new(graph.node_bound());
        let mut conditions = BTreeSet::new();
        for ctx in &contexts {
            tainted.union_with(&ctx.tainted);
            conditions.extend(ctx.conditions.iter().copied());
        }

        Self {
            mode: TaintMode::ContextSensitive,
            tainted,
            stats: TaintStats {
                entries: contexts.len(),
                ..TaintStats::default()
            },
            contexts,
            conditions,
        }
    }

    pub fn mode(&self) -> TaintMode {
        self.mode
    }

    /// Tainted in some context
    pub fn is_tainted(&self, graph: &DependencyGraph, node: DepNode) -> bool {
        graph
            .index_of(node)
            .map_or(false, |ix| self.tainted.contains(ix))
    }

    /// The branch condition may differ between participants
    pub fn is_tainted_condition(&self, cond: ValueId) -> bool {
        self.conditions.contains(&cond)
    }

    /// Entry contexts, empty in context-insensitive mode
    pub fn contexts(&self) -> &[EntryTaint] {
        &self.contexts
    }

    pub fn tainted_conditions(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.conditions.iter().copied()
    }

    pub fn tainted_count(&self) -> usize {
        self.tainted.len()
    }

    /// Chain of tainted nodes from a source to `node`, source first
    ///
    /// In context-sensitive mode the first context in which the node was
    /// tainted is used. `max_len` of zero keeps the whole chain.
    pub fn trace(
        &self,
        module: &Module,
        mssa: &MemorySsa,
        graph: &DependencyGraph,
        node: DepNode,
        max_len: usize,
    ) -> Vec<TraceStep> {
        let Some(target) = graph.index_of(node) else {
            return Vec::new();
        };
        let set = match self.mode {
            TaintMode::ContextInsensitive => &self.tainted,
            TaintMode::ContextSensitive => match self
                .contexts
                .iter()
                .find(|ctx| ctx.tainted.contains(target))
            {
                Some(ctx) => &ctx.tainted,
                None => return Vec::new(),
            },
        };
        backward_path(graph, set, target, max_len)
            .into_iter()
            .map(|ix| TraceStep::describe(module, mssa, graph.node(ix)))
            .collect()
    }

    pub fn stats(&self) -> &TaintStats {
        &self.stats
    }
}
