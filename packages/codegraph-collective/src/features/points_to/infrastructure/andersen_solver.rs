//! Andersen's points-to analysis solver
//!
//! Inclusion-based worklist solver:
//! - copy-constraint cycles collapsed up front through the node arena
//! - LOAD/STORE constraints turned into copy edges as points-to sets grow
//! - constraints may be added after a fixpoint; solving resumes from them

use crate::features::points_to::domain::{
    Constraint, ConstraintKind, ConstraintSet, NodeFactory, NodeId,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, VecDeque};
use std::time::Instant;

/// Statistics for Andersen's analysis
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AndersenStats {
    pub nodes: usize,
    pub constraints_total: usize,
    pub constraints_addr_of: usize,
    pub constraints_copy: usize,
    pub constraints_complex: usize,
    pub scc_collapsed: usize,
    pub iterations: usize,
    pub propagations: usize,
    pub resolution_rounds: usize,
    pub indirect_bindings: usize,
    pub duration_ms: f64,
    pub duration_scc_ms: f64,
    pub duration_solve_ms: f64,
}

pub struct AndersenSolver {
    factory: NodeFactory,

    /// Points-to sets, meaningful at representatives only
    points_to: Vec<BTreeSet<NodeId>>,

    /// Copy edges (src → {dst}) between representatives
    copy_edges: Vec<BTreeSet<NodeId>>,

    /// LOAD constraints by source pointer: dst = *src
    loads: Vec<Vec<NodeId>>,

    /// STORE constraints by destination pointer: *dst = src
    stores: Vec<Vec<NodeId>>,

    worklist: VecDeque<NodeId>,
    in_worklist: Vec<bool>,
    stats: AndersenStats,
}

impl AndersenSolver {
    pub fn new(factory: NodeFactory, constraints: &ConstraintSet, collapse_cycles: bool) -> Self {
        let mut solver = Self {
            factory,
            points_to: Vec::new(),
            copy_edges: Vec::new(),
            loads: Vec::new(),
            stores: Vec::new(),
            worklist: VecDeque::new(),
            in_worklist: Vec::new(),
            stats: AndersenStats::default(),
        };

        solver.stats.constraints_addr_of = constraints.addr_of_count;
        solver.stats.constraints_copy = constraints.copy_count;
        solver.stats.constraints_complex = constraints.load_count + constraints.store_count;

        let scc_start = Instant::now();
        if collapse_cycles {
            solver.collapse_copy_cycles(constraints);
        }
        solver.stats.duration_scc_ms = scc_start.elapsed().as_secs_f64() * 1000.0;

        for constraint in constraints.iter() {
            solver.add_constraint(*constraint);
        }
        solver
    }

    /// Merge every strongly connected component of the copy graph into
    /// one representative. Object nodes keep their identity.
    fn collapse_copy_cycles(&mut self, constraints: &ConstraintSet) {
        let n = self.factory.len();
        let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(n, constraints.copy_count);
        for _ in 0..n {
            graph.add_node(());
        }
        for c in constraints.copies() {
            if c.src != c.dst {
                graph.add_edge(NodeIndex::new(c.src.index()), NodeIndex::new(c.dst.index()), ());
            }
        }

        for scc in tarjan_scc(&graph) {
            if scc.len() < 2 {
                continue;
            }
            let mut members: Vec<NodeId> = scc
                .iter()
                .map(|ix| NodeId(ix.index() as u32))
                .filter(|&id| !self.factory.is_object(id))
                .collect();
            members.sort_unstable();
            let Some((&rep, rest)) = members.split_first() else {
                continue;
            };
            for &member in rest {
                self.factory.merge(rep, member);
                self.stats.scc_collapsed += 1;
            }
        }
    }

    fn ensure_capacity(&mut self) {
        let n = self.factory.len();
        if self.points_to.len() < n {
            self.points_to.resize_with(n, BTreeSet::new);
            self.copy_edges.resize_with(n, BTreeSet::new);
            self.loads.resize_with(n, Vec::new);
            self.stores.resize_with(n, Vec::new);
            self.in_worklist.resize(n, false);
        }
    }

    #[inline]
    fn rep(&self, id: NodeId) -> NodeId {
        self.factory.find(id)
    }

    fn push(&mut self, id: NodeId) {
        if !self.in_worklist[id.index()] {
            self.in_worklist[id.index()] = true;
            self.worklist.push_back(id);
        }
    }

    /// Add one constraint; valid before solving and between fixpoints
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.ensure_capacity();
        self.stats.constraints_total += 1;
        let dst = self.rep(constraint.dst);

        match constraint.kind {
            ConstraintKind::AddrOf => {
                if self.points_to[dst.index()].insert(constraint.src) {
                    self.push(dst);
                }
            }
            ConstraintKind::Copy => {
                let src = self.rep(constraint.src);
                self.add_copy_edge(src, dst);
            }
            ConstraintKind::Load => {
                let src = self.rep(constraint.src);
                self.loads[src.index()].push(dst);
                if !self.points_to[src.index()].is_empty() {
                    self.push(src);
                }
            }
            ConstraintKind::Store => {
                let src = self.rep(constraint.src);
                self.stores[dst.index()].push(src);
                if !self.points_to[dst.index()].is_empty() {
                    self.push(dst);
                }
            }
        }
    }

    fn add_copy_edge(&mut self, src: NodeId, dst: NodeId) {
        if src == dst {
            return;
        }
        if self.copy_edges[src.index()].insert(dst) && self.propagate(src, dst) {
            self.push(dst);
        }
    }

    /// pts(dst) ⊇ pts(src); true when dst grew
    fn propagate(&mut self, src: NodeId, dst: NodeId) -> bool {
        let missing: Vec<NodeId> = self.points_to[src.index()]
            .difference(&self.points_to[dst.index()])
            .copied()
            .collect();
        if missing.is_empty() {
            return false;
        }
        self.points_to[dst.index()].extend(missing);
        self.stats.propagations += 1;
        true
    }

    /// Process one worklist entry. Returns false once the worklist is empty.
    pub fn step(&mut self) -> bool {
        let Some(node) = self.worklist.pop_front() else {
            return false;
        };
        self.in_worklist[node.index()] = false;
        self.stats.iterations += 1;

        let objects: Vec<NodeId> = self.points_to[node.index()].iter().copied().collect();

        for dst in self.loads[node.index()].clone() {
            let dst = self.rep(dst);
            for &obj in &objects {
                let obj = self.rep(obj);
                self.add_copy_edge(obj, dst);
            }
        }

        for src in self.stores[node.index()].clone() {
            let src = self.rep(src);
            for &obj in &objects {
                let obj = self.rep(obj);
                self.add_copy_edge(src, obj);
            }
        }

        let succs: Vec<NodeId> = self.copy_edges[node.index()].iter().copied().collect();
        for succ in succs {
            if self.propagate(node, succ) {
                self.push(succ);
            }
        }

        true
    }

    /// Run the worklist to a fixpoint
    pub fn solve(&mut self) {
        let start = Instant::now();
        while self.step() {}
        self.stats.nodes = self.factory.len();
        self.stats.duration_solve_ms += start.elapsed().as_secs_f64() * 1000.0;
    }

    /// Points-to set of a node, read through its representative
    pub fn points_to_node(&self, id: NodeId) -> &BTreeSet<NodeId> {
        &self.points_to[self.rep(id).index()]
    }

    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut NodeFactory {
        &mut self.factory
    }

    pub fn stats(&self) -> &AndersenStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut AndersenStats {
        &mut self.stats
    }

    pub fn is_converged(&self) -> bool {
        self.worklist.is_empty()
    }

    pub fn into_parts(mut self) -> (NodeFactory, Vec<BTreeSet<NodeId>>, AndersenStats) {
        self.stats.nodes = self.factory.len();
        (self.factory, self.points_to, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueId;

    struct Fixture {
        factory: NodeFactory,
        constraints: ConstraintSet,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                factory: NodeFactory::new(),
                constraints: ConstraintSet::new(),
            }
        }

        fn var(&mut self, v: u32) -> NodeId {
            self.factory.create_value_node(ValueId(v))
        }

        fn obj(&mut self, v: u32) -> NodeId {
            self.factory.create_object_node(ValueId(v))
        }

        fn solve(self, collapse: bool) -> AndersenSolver {
            let mut solver = AndersenSolver::new(self.factory, &self.constraints, collapse);
            solver.solve();
            solver
        }
    }

    fn set(ids: &[NodeId]) -> BTreeSet<NodeId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_copy_chain() {
        let mut fx = Fixture::new();
        let (x, y, z, o) = (fx.var(1), fx.var(2), fx.var(3), fx.obj(10));
        fx.constraints.add(Constraint::addr_of(x, o));
        fx.constraints.add(Constraint::copy(y, x));
        fx.constraints.add(Constraint::copy(z, y));

        let solver = fx.solve(true);
        assert_eq!(solver.points_to_node(z), &set(&[o]));
    }

    #[test]
    fn test_store_then_load() {
        // p = &a; q = &b; *p = q; r = *p  =>  r -> {b}
        let mut fx = Fixture::new();
        let (p, q, r) = (fx.var(1), fx.var(2), fx.var(3));
        let (a, b) = (fx.obj(10), fx.obj(11));
        fx.constraints.add(Constraint::addr_of(p, a));
        fx.constraints.add(Constraint::addr_of(q, b));
        fx.constraints.add(Constraint::store(p, q));
        fx.constraints.add(Constraint::load(r, p));

        let solver = fx.solve(false);
        assert_eq!(solver.points_to_node(a), &set(&[b]));
        assert_eq!(solver.points_to_node(r), &set(&[b]));
    }

    #[test]
    fn test_cycle_collapse_merges_values() {
        let mut fx = Fixture::new();
        let (x, y, z, o) = (fx.var(1), fx.var(2), fx.var(3), fx.obj(10));
        fx.constraints.add(Constraint::copy(y, x));
        fx.constraints.add(Constraint::copy(z, y));
        fx.constraints.add(Constraint::copy(x, z));
        fx.constraints.add(Constraint::addr_of(y, o));

        let solver = fx.solve(true);
        assert_eq!(solver.stats().scc_collapsed, 2);
        assert_eq!(solver.factory().find(y), solver.factory().find(z));
        for v in [x, y, z] {
            assert_eq!(solver.points_to_node(v), &set(&[o]));
        }
    }

    #[test]
    fn test_constraints_added_after_fixpoint() {
        let mut fx = Fixture::new();
        let (x, y, o) = (fx.var(1), fx.var(2), fx.obj(10));
        fx.constraints.add(Constraint::addr_of(x, o));
        let mut solver = fx.solve(true);
        assert!(solver.points_to_node(y).is_empty());

        solver.add_constraint(Constraint::copy(y, x));
        solver.solve();
        assert_eq!(solver.points_to_node(y), &set(&[o]));
        assert!(solver.is_converged());
    }

    #[test]
    fn test_sets_only_grow_between_steps() {
        let mut fx = Fixture::new();
        let vars: Vec<NodeId> = (1..6).map(|v| fx.var(v)).collect();
        let objs: Vec<NodeId> = (10..13).map(|v| fx.obj(v)).collect();
        fx.constraints.add(Constraint::addr_of(vars[0], objs[0]));
        fx.constraints.add(Constraint::addr_of(vars[1], objs[1]));
        fx.constraints.add(Constraint::addr_of(vars[2], objs[2]));
        fx.constraints.add(Constraint::store(vars[0], vars[1]));
        fx.constraints.add(Constraint::copy(vars[3], vars[0]));
        fx.constraints.add(Constraint::load(vars[4], vars[3]));
        fx.constraints.add(Constraint::store(vars[3], vars[2]));

        let mut solver = AndersenSolver::new(fx.factory, &fx.constraints, true);
        let snapshot = |s: &AndersenSolver| -> Vec<BTreeSet<NodeId>> {
            (0..s.factory().len() as u32)
                .map(|i| s.points_to_node(NodeId(i)).clone())
                .collect()
        };
        let mut before = snapshot(&solver);
        while solver.step() {
            let after = snapshot(&solver);
            for (old, new) in before.iter().zip(&after) {
                assert!(old.is_subset(new));
            }
            before = after;
        }
        assert_eq!(solver.points_to_node(vars[4]), &set(&[objs[1], objs[2]]));
    }
}
