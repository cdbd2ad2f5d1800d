//! Call graph over direct and points-to resolved calls
//!
//! Nodes are functions, edges are call sites. Strongly connected
//! components come out callees-first, which is the order bottom-up
//! summaries need.

use crate::features::points_to::PointsToAnalysis;
use crate::ir::{FuncId, Linkage, Module, Opcode, ValueId, ValueKind};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct CallGraph {
    graph: DiGraph<FuncId, ValueId>,
    /// Callees per call site, sorted
    site_callees: BTreeMap<ValueId, Vec<FuncId>>,
    /// Call sites per callee, in id order
    callers: BTreeMap<FuncId, Vec<ValueId>>,
    address_taken: BTreeSet<FuncId>,
    entries: Vec<FuncId>,
    /// Functions some entry point may call, entries included
    reachable: BTreeSet<FuncId>,
    sccs: Vec<Vec<FuncId>>,
}

impl CallGraph {
    pub fn build(module: &Module, pta: &PointsToAnalysis) -> Self {
        let mut graph = DiGraph::with_capacity(module.functions.len(), 0);
        for func in &module.functions {
            graph.add_node(func.id);
        }

        let mut site_callees = BTreeMap::new();
        let mut callers: BTreeMap<FuncId, Vec<ValueId>> = BTreeMap::new();
        for (call, callees) in pta.call_sites() {
            let Some(caller) = module.instruction(call).map(|inst| inst.func) else {
                continue;
            };
            for &callee in callees {
                graph.add_edge(
                    NodeIndex::new(caller.index()),
                    NodeIndex::new(callee.index()),
                    call,
                );
                callers.entry(callee).or_default().push(call);
            }
            site_callees.insert(call, callees.to_vec());
        }

        let address_taken = address_taken_functions(module);
        let entries = entry_points(module, &address_taken);

        let mut reachable = BTreeSet::new();
        let mut dfs = Dfs::empty(&graph);
        for &entry in &entries {
            dfs.move_to(NodeIndex::new(entry.index()));
            while let Some(ix) = dfs.next(&graph) {
                reachable.insert(graph[ix]);
            }
        }

        let sccs = tarjan_scc(&graph)
            .into_iter()
            .map(|scc| {
                let mut funcs: Vec<FuncId> = scc.into_iter().map(|ix| graph[ix]).collect();
                funcs.sort_unstable();
                funcs
            })
            .collect();

        tracing::debug!(
            functions = module.functions.len(),
            edges = graph.edge_count(),
            entries = entries.len(),
            reachable = reachable.len(),
            "call graph built"
        );

        Self {
            graph,
            site_callees,
            callers,
            address_taken,
            entries,
            reachable,
            sccs,
        }
    }

    /// Callees of one call site
    pub fn callees_of_site(&self, call: ValueId) -> &[FuncId] {
        self.site_callees.get(&call).map_or(&[], Vec::as_slice)
    }

    /// Call sites that may invoke `func`
    pub fn call_sites_of(&self, func: FuncId) -> &[ValueId] {
        self.callers.get(&func).map_or(&[], Vec::as_slice)
    }

    /// Distinct callees of a function, sorted
    pub fn callees(&self, func: FuncId) -> Vec<FuncId> {
        let mut out: Vec<FuncId> = self
            .graph
            .edges(NodeIndex::new(func.index()))
            .map(|e| self.graph[e.target()])
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Outgoing (call site, callee) pairs of a function, by call site
    pub fn call_edges(&self, func: FuncId) -> Vec<(ValueId, FuncId)> {
        let mut out: Vec<(ValueId, FuncId)> = self
            .graph
            .edges(NodeIndex::new(func.index()))
            .map(|e| (*e.weight(), self.graph[e.target()]))
            .collect();
        out.sort_unstable();
        out
    }

    /// Strongly connected components, callees before callers
    pub fn sccs_bottom_up(&self) -> &[Vec<FuncId>] {
        &self.sccs
    }

    pub fn is_address_taken(&self, func: FuncId) -> bool {
        self.address_taken.contains(&func)
    }

    /// `main` when defined, otherwise every externally visible or
    /// address-taken defined function
    pub fn entries(&self) -> &[FuncId] {
        &self.entries
    }

    /// Some entry point may transitively call `func`
    pub fn is_reachable_from_entry(&self, func: FuncId) -> bool {
        self.reachable.contains(&func)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Functions whose address is used other than as a direct callee
fn address_taken_functions(module: &Module) -> BTreeSet<FuncId> {
    let mut taken = BTreeSet::new();
    let mut note = |id: ValueId| {
        if let ValueKind::Function { func } = module.value(id).kind {
            taken.insert(func);
        }
    };

    for value in &module.values {
        match &value.kind {
            ValueKind::Global {
                initializer: Some(init),
            } => note(*init),
            ValueKind::ConstExpr { operands, .. } => operands.iter().copied().for_each(&mut note),
            ValueKind::Instruction(inst) => {
                let operands = inst.op.operands();
                let skip_callee = matches!(inst.op, Opcode::Call { .. });
                for (i, op) in operands.into_iter().enumerate() {
                    if skip_callee && i == 0 {
                        continue;
                    }
                    note(op);
                }
            }
            _ => {}
        }
    }
    taken
}

fn entry_points(module: &Module, address_taken: &BTreeSet<FuncId>) -> Vec<FuncId> {
    if let Some(main) = module.function_by_name("main").filter(|f| !f.is_declaration()) {
        return vec![main.id];
    }

    tracing::warn!("no main function; analyzing from every visible function");
    module
        .defined_functions()
        .filter(|f| f.linkage == Linkage::External || address_taken.contains(&f.id))
        .map(|f| f.id)
        .collect()
}
