/*
 * Context-sensitive flooding
 *
 * One traversal per call-graph entry point. The call graph is walked depth
 * first; taint moves between functions only along the call edge being
 * traversed, so a callee reached from an untainted context stays clean
 * even when another caller passes it participant-dependent data.
 *
 *   down  (caller -> callee): copy one step, flood callee, record conditions
 *   up    (callee -> caller): copy one step, flood caller, record conditions,
 *                             clear the callee
 */

use super::taint_set::TaintSet;
use crate::features::call_graph::CallGraph;
use crate::features::dep_graph::{DepNode, DependencyGraph};
use crate::ir::{FuncId, Module, ValueId};
use petgraph::stable_graph::NodeIndex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeSet, VecDeque};

/// Taint observed from one entry point
#[derive(Debug, Clone)]
pub struct EntryTaint {
    pub entry: FuncId,
    /// Every node tainted at some point of the traversal
    pub tainted: TaintSet,
    /// Call-site conditions recorded tainted in this context
    pub conditions: BTreeSet<ValueId>,
}

/// Graph nodes grouped by owning function; `None` holds constants,
/// globals and function addresses
pub(crate) struct Membership {
    members: FxHashMap<Option<FuncId>, Vec<NodeIndex>>,
    /// Calls with conditions, per containing function
    calls: FxHashMap<FuncId, Vec<ValueId>>,
}

impl Membership {
    pub(crate) fn new(graph: &DependencyGraph, module: &Module) -> Self {
        let mut members: FxHashMap<Option<FuncId>, Vec<NodeIndex>> = FxHashMap::default();
        for ix in graph.node_indices() {
            members.entry(graph.func_of(ix)).or_default().push(ix);
        }
        let mut calls: FxHashMap<FuncId, Vec<ValueId>> = FxHashMap::default();
        for (call, _) in graph.call_sites_with_conditions() {
            if let Some(inst) = module.instruction(call) {
                calls.entry(inst.func).or_default().push(call);
            }
        }
        Self { members, calls }
    }

    fn of(&self, func: Option<FuncId>) -> &[NodeIndex] {
        self.members.get(&func).map_or(&[], Vec::as_slice)
    }
}

pub(crate) struct EntryWalker<'a> {
    graph: &'a DependencyGraph,
    call_graph: &'a CallGraph,
    module: &'a Module,
    membership: &'a Membership,
    current: TaintSet,
    ever: TaintSet,
    conditions: BTreeSet<ValueId>,
}

impl<'a> EntryWalker<'a> {
    pub(crate) fn new(
        graph: &'a DependencyGraph,
        call_graph: &'a CallGraph,
        module: &'a Module,
        membership: &'a Membership,
    ) -> Self {
        let bound = graph.node_bound();
        Self {
            graph,
            call_graph,
            module,
            membership,
            current: TaintSet::new(bound),
            ever: TaintSet::new(bound),
            conditions: BTreeSet::new(),
        }
    }

    pub(crate) fn run(mut self, entry: FuncId) -> EntryTaint {
        let membership = self.membership;
        for &ix in membership.of(None) {
            if self.is_source(ix) {
                self.taint(ix);
            }
        }

        self.enter(entry);

        let mut visited: FxHashSet<(ValueId, FuncId)> = FxHashSet::default();
        let mut stack: Vec<(FuncId, Vec<(ValueId, FuncId)>, usize)> =
            vec![(entry, self.defined_edges(entry), 0)];

        while let Some((func, edges, pos)) = stack.last_mut() {
            if let Some(&(call, callee)) = edges.get(*pos) {
                *pos += 1;
                if !visited.insert((call, callee)) {
                    continue;
                }
                let caller = *func;
                self.copy_across(caller, callee);
                self.enter(callee);
                let callee_edges = self.defined_edges(callee);
                stack.push((callee, callee_edges, 0));
            } else {
                let done = *func;
                stack.pop();
                if let Some((caller, ..)) = stack.last() {
                    let caller = *caller;
                    self.copy_across(done, caller);
                    self.flood(caller);
                    self.record(caller);
                    // recursive frames of `done` still need its taint
                    if !stack.iter().any(|(f, ..)| *f == done) {
                        self.clear(done);
                    }
                }
            }
        }

        EntryTaint {
            entry,
            tainted: self.ever,
            conditions: self.conditions,
        }
    }

    fn defined_edges(&self, func: FuncId) -> Vec<(ValueId, FuncId)> {
        self.call_graph
            .call_edges(func)
            .into_iter()
            .filter(|&(_, callee)| !self.module.function(callee).is_declaration())
            .collect()
    }

    fn is_source(&self, ix: NodeIndex) -> bool {
        self.graph.sources.contains(&self.graph.node(ix))
    }

    fn taint(&mut self, ix: NodeIndex) -> bool {
        self.ever.insert(ix);
        self.current.insert(ix)
    }

    /// Seed the function's own sources, flood it, record its conditions
    fn enter(&mut self, func: FuncId) {
        let membership = self.membership;
        for &ix in membership.of(Some(func)) {
            if self.is_source(ix) {
                self.taint(ix);
            }
        }
        self.flood(func);
        self.record(func);
    }

    /// One step from `from`'s tainted nodes into nodes owned by `to`
    fn copy_across(&mut self, from: FuncId, to: FuncId) {
        let (graph, membership) = (self.graph, self.membership);
        let members = membership.of(Some(from));

        for &ix in members {
            if self.current.contains(ix) && graph.is_reset(ix) {
                for succ in graph.successors(ix) {
                    if graph.func_of(succ) == Some(to) {
                        self.current.remove(succ);
                    }
                }
            }
        }
        for &ix in members {
            if !self.current.contains(ix) || graph.is_reset(ix) {
                continue;
            }
            for succ in graph.successors(ix) {
                if graph.func_of(succ) == Some(to) {
                    self.taint(succ);
                }
            }
        }
    }

    /// Propagate inside `func` only
    fn flood(&mut self, func: FuncId) {
        let (graph, membership) = (self.graph, self.membership);
        let mut queue: VecDeque<NodeIndex> = membership
            .of(Some(func))
            .iter()
            .chain(membership.of(None))
            .copied()
            .filter(|&ix| self.current.contains(ix))
            .collect();

        while let Some(ix) = queue.pop_front() {
            if graph.is_reset(ix) {
                continue;
            }
            for succ in graph.successors(ix) {
                if graph.func_of(succ) == Some(func) && self.taint(succ) {
                    queue.push_back(succ);
                }
            }
        }
    }

    fn record(&mut self, func: FuncId) {
        let (graph, membership) = (self.graph, self.membership);
        let Some(calls) = membership.calls.get(&func) else {
            return;
        };
        for &call in calls {
            for &cond in graph.call_conditions(call) {
                let tainted = graph
                    .index_of(DepNode::Value(cond))
                    .map_or(false, |ix| self.current.contains(ix));
                if tainted {
                    self.conditions.insert(cond);
                }
            }
        }
    }

    fn clear(&mut self, func: FuncId) {
        let membership = self.membership;
        for &ix in membership.of(Some(func)) {
            self.current.remove(ix);
        }
    }
}
