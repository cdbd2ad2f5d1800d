//! Whole-module points-to analysis
//!
//! Collect, solve, then bind indirect calls against the callee operand's
//! points-to set and solve again until no new callee shows up.

use crate::config::PointsToConfig;
use crate::features::points_to::domain::{NodeFactory, NodeId, NodeKind};
use crate::features::points_to::infrastructure::{
    call_constraints, AndersenSolver, AndersenStats, ConstraintCollector,
};
use crate::ir::{FuncId, Module, Opcode, ValueId, ValueKind};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Solved points-to information for one module
#[derive(Debug, Clone)]
pub struct PointsToAnalysis {
    factory: NodeFactory,
    points_to: Vec<BTreeSet<NodeId>>,
    /// Callees of every call site, direct and resolved indirect
    callees: BTreeMap<ValueId, Vec<FuncId>>,
    indirect_calls: Vec<ValueId>,
    stats: AndersenStats,
}

impl PointsToAnalysis {
    pub fn run(module: &Module, config: &PointsToConfig) -> Self {
        let start = Instant::now();
        let collected = ConstraintCollector::collect(module);

        let mut callees: BTreeMap<ValueId, Vec<FuncId>> = BTreeMap::new();
        for &(call, func) in &collected.direct_calls {
            callees.entry(call).or_default().push(func);
        }
        for &call in &collected.indirect_calls {
            callees.entry(call).or_default();
        }

        let mut solver = AndersenSolver::new(
            collected.factory,
            &collected.constraints,
            config.collapse_cycles,
        );
        solver.solve();

        let indirect_calls = collected.indirect_calls;
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut new_constraints = Vec::new();
            let mut bound = 0;

            for &call in &indirect_calls {
                for func in resolve_targets(module, &solver, call) {
                    let entry = callees.entry(call).or_default();
                    if entry.contains(&func) {
                        continue;
                    }
                    entry.push(func);
                    bound += 1;
                    call_constraints(module, solver.factory_mut(), call, func, &mut new_constraints);
                }
            }

            if bound == 0 {
                break;
            }
            debug!(round = rounds, bound, "bound indirect callees");
            solver.stats_mut().indirect_bindings += bound;
            for constraint in new_constraints {
                solver.add_constraint(constraint);
            }
            solver.solve();

            if rounds >= config.max_resolution_rounds {
                warn!(
                    rounds,
                    "indirect call resolution stopped before reaching a fixpoint"
                );
                break;
            }
        }

        for &call in &indirect_calls {
            if callees.get(&call).map_or(true, Vec::is_empty) {
                warn!(
                    call = %module.display_name(call),
                    "indirect call has no resolved callee"
                );
            }
        }

        for targets in callees.values_mut() {
            targets.sort_unstable();
        }

        solver.stats_mut().resolution_rounds = rounds;
        let (factory, points_to, mut stats) = solver.into_parts();
        stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            nodes = stats.nodes,
            constraints = stats.constraints_total,
            iterations = stats.iterations,
            collapsed = stats.scc_collapsed,
            rounds = stats.resolution_rounds,
            "points-to analysis solved"
        );

        Self {
            factory,
            points_to,
            callees,
            indirect_calls,
            stats,
        }
    }

    /// Object nodes a value may point to
    ///
    /// `None` when the value has no node or is the universal pointer. The
    /// null object and objects without an allocation site are left out.
    pub fn points_to(&self, value: ValueId) -> Option<BTreeSet<NodeId>> {
        let node = self.factory.value_node(value)?;
        if node == NodeFactory::UNIVERSAL_PTR {
            return None;
        }
        Some(
            self.node_points_to(node)
                .iter()
                .copied()
                .filter(|&obj| self.factory.site_of(obj).is_some())
                .collect(),
        )
    }

    /// Allocation sites a value may point to
    pub fn points_to_sites(&self, value: ValueId) -> Option<Vec<ValueId>> {
        self.points_to(value).map(|objs| {
            objs.into_iter()
                .filter_map(|obj| self.factory.site_of(obj))
                .collect()
        })
    }

    /// Raw set of any node, through its representative
    pub fn node_points_to(&self, node: NodeId) -> &BTreeSet<NodeId> {
        &self.points_to[self.factory.find(node).index()]
    }

    pub fn may_alias(&self, a: ValueId, b: ValueId) -> bool {
        match (self.points_to(a), self.points_to(b)) {
            (Some(pa), Some(pb)) => !pa.is_disjoint(&pb),
            _ => true,
        }
    }

    /// Callees of a call site, sorted
    pub fn callees(&self, call: ValueId) -> &[FuncId] {
        self.callees.get(&call).map_or(&[], Vec::as_slice)
    }

    /// Every call site with its callees, in id order
    pub fn call_sites(&self) -> impl Iterator<Item = (ValueId, &[FuncId])> + '_ {
        self.callees.iter().map(|(&call, funcs)| (call, funcs.as_slice()))
    }

    pub fn indirect_calls(&self) -> &[ValueId] {
        &self.indirect_calls
    }

    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    /// Object nodes that carry an allocation site
    pub fn objects(&self) -> impl Iterator<Item = (NodeId, ValueId)> + '_ {
        self.factory.object_sites()
    }

    pub fn stats(&self) -> &AndersenStats {
        &self.stats
    }
}

/// Functions the callee operand of an indirect call may designate,
/// filtered by arity
fn resolve_targets(module: &Module, solver: &AndersenSolver, call: ValueId) -> Vec<FuncId> {
    let Some(Opcode::Call { callee, args }) = module.opcode(call) else {
        return Vec::new();
    };
    let Some(node) = solver.factory().value_node(*callee) else {
        return Vec::new();
    };

    solver
        .points_to_node(node)
        .iter()
        .filter_map(|&obj| match solver.factory().kind(obj) {
            NodeKind::Object { site } => match module.value(site).kind {
                ValueKind::Function { func } => Some(func),
                _ => None,
            },
            _ => None,
        })
        .filter(|&func| {
            let f = module.function(func);
            f.params.len() == args.len() || (f.is_vararg && args.len() >= f.params.len())
        })
        .collect()
}
