//! Memory phi elimination
//!
//! A memory phi whose operands are indistinguishable in the graph (same
//! parents, same children, none of them a phi) carries no information about
//! which path was taken. It is collapsed onto its first operand so that
//! branch conditions stop flowing into values that are equal on every path.

use super::graph::{DepNode, DependencyGraph};
use crate::features::memory_ssa::{MemoryEvent, MemorySsa};
use petgraph::stable_graph::NodeIndex;
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::debug;

impl DependencyGraph {
    /// Eliminate redundant memory phis until nothing changes
    ///
    /// Returns the number of phis removed by this call.
    pub fn eliminate_phis(&mut self, mssa: &MemorySsa) -> usize {
        let start = Instant::now();
        let mut removed = 0;

        loop {
            let mut changed = false;
            for ssa in mssa.iter() {
                let f = ssa.func();
                for phi in ssa.phis() {
                    let node = DepNode::Var(f, phi.var);
                    if self.resolve(node) != node || !self.index.contains_key(&node) {
                        continue;
                    }
                    let ops: Vec<DepNode> = phi
                        .ops
                        .values()
                        .map(|&v| self.resolve(DepNode::Var(f, v)))
                        .collect();
                    if self.collapse(mssa, node, ops) {
                        removed += 1;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let sources = std::mem::take(&mut self.sources);
        self.sources = self.remap(sources);
        let resets = std::mem::take(&mut self.resets);
        self.resets = self.remap(resets);

        self.stats.phis_eliminated += removed;
        self.stats.phi_elimination_ms += start.elapsed().as_secs_f64() * 1000.0;
        self.refresh_counts();
        debug!(removed, "memory phis eliminated");
        removed
    }

    fn collapse(&mut self, mssa: &MemorySsa, phi: DepNode, ops: Vec<DepNode>) -> bool {
        if ops.is_empty() || ops.contains(&phi) {
            return false;
        }
        let Some(phi_ix) = self.index.get(&phi).copied() else {
            return false;
        };
        let mut op_ixs = Vec::with_capacity(ops.len());
        for op in &ops {
            if is_memory_phi(mssa, *op) {
                return false;
            }
            match self.index.get(op) {
                Some(&ix) => op_ixs.push(ix),
                None => return false,
            }
        }
        for pair in op_ixs.windows(2) {
            if !self.equivalent(pair[0], pair[1]) {
                return false;
            }
        }

        let mut seen = FxHashSet::default();
        let mut unique = Vec::new();
        for (op, ix) in ops.into_iter().zip(op_ixs) {
            if seen.insert(op) {
                unique.push((op, ix));
            }
        }
        let (keep, keep_ix) = unique[0];

        let parents: Vec<NodeIndex> = self.predecessors(phi_ix).collect();
        for parent in parents {
            self.remove_edge(parent, phi_ix);
        }
        let children: Vec<NodeIndex> = self.successors(phi_ix).collect();
        for child in children {
            self.insert_edge(keep_ix, child);
        }
        self.remove_node(phi_ix);
        self.replaced.insert(phi, keep);

        for &(other, other_ix) in &unique[1..] {
            self.remove_node(other_ix);
            self.replaced.insert(other, keep);
        }
        true
    }

    fn equivalent(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let parents_a: FxHashSet<_> = self.predecessors(a).collect();
        let parents_b: FxHashSet<_> = self.predecessors(b).collect();
        if parents_a != parents_b {
            return false;
        }
        let children_a: FxHashSet<_> = self.successors(a).collect();
        let children_b: FxHashSet<_> = self.successors(b).collect();
        children_a == children_b
    }

    fn remap(&self, nodes: BTreeSet<DepNode>) -> BTreeSet<DepNode> {
        nodes
            .into_iter()
            .map(|n| self.resolve(n))
            .filter(|n| self.index.contains_key(n))
            .collect()
    }
}

fn is_memory_phi(mssa: &MemorySsa, node: DepNode) -> bool {
    let DepNode::Var(f, v) = node else {
        return false;
    };
    mssa.function(f).map_or(false, |ssa| {
        matches!(ssa.event(ssa.var(v).def), MemoryEvent::Phi(_))
    })
}
