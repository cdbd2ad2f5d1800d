//! Dependency graph storage and queries
//!
//! Nodes are IR values and memory SSA variables; an edge `a -> b` means
//! `b` depends on `a`. Storage is a petgraph `StableDiGraph` so phi
//! elimination can remove nodes without invalidating other indices.

use crate::features::memory_ssa::VarId;
use crate::ir::{FuncId, ValueId};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::NodeIndexable;
use petgraph::Direction;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A node of the dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DepNode {
    Value(ValueId),
    /// Memory SSA variable of a function
    Var(FuncId, VarId),
}

impl fmt::Display for DepNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepNode::Value(v) => write!(f, "{}", v),
            DepNode::Var(func, var) => write!(f, "{}:{}", func, var),
        }
    }
}

/// Node weight: the node and the function it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepNodeData {
    pub node: DepNode,
    /// `None` for constants, globals and function addresses
    pub func: Option<FuncId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DepGraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub sources: usize,
    pub resets: usize,
    pub phis_eliminated: usize,
    pub build_ms: f64,
    pub phi_elimination_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub(crate) graph: StableDiGraph<DepNodeData, ()>,
    pub(crate) index: FxHashMap<DepNode, NodeIndex>,
    /// Branch conditions of the PDF+ of each call site's block
    pub(crate) call_conditions: BTreeMap<ValueId, Vec<ValueId>>,
    pub(crate) sources: BTreeSet<DepNode>,
    pub(crate) resets: BTreeSet<DepNode>,
    /// Nodes removed by phi elimination and their replacement
    pub(crate) replaced: FxHashMap<DepNode, DepNode>,
    pub(crate) stats: DepGraphStats,
}

impl DependencyGraph {
    pub(crate) fn insert_node(&mut self, node: DepNode, func: Option<FuncId>) -> NodeIndex {
        if let Some(&ix) = self.index.get(&node) {
            return ix;
        }
        let ix = self.graph.add_node(DepNodeData { node, func });
        self.index.insert(node, ix);
        ix
    }

    /// Add `from -> to` once
    pub(crate) fn insert_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if from != to && self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    pub(crate) fn remove_node(&mut self, ix: NodeIndex) {
        if let Some(data) = self.graph.remove_node(ix) {
            self.index.remove(&data.node);
        }
    }

    pub(crate) fn remove_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if let Some(edge) = self.graph.find_edge(from, to) {
            self.graph.remove_edge(edge);
        }
    }

    pub(crate) fn refresh_counts(&mut self) {
        self.stats.nodes = self.graph.node_count();
        self.stats.edges = self.graph.edge_count();
        self.stats.sources = self.sources.len();
        self.stats.resets = self.resets.len();
    }

    /// Follow phi-elimination replacements to a live node
    pub fn resolve(&self, mut node: DepNode) -> DepNode {
        while let Some(&next) = self.replaced.get(&node) {
            node = next;
        }
        node
    }

    #[inline]
    pub fn index_of(&self, node: DepNode) -> Option<NodeIndex> {
        self.index.get(&self.resolve(node)).copied()
    }

    #[inline]
    pub fn node(&self, ix: NodeIndex) -> DepNode {
        self.graph[ix].node
    }

    #[inline]
    pub fn func_of(&self, ix: NodeIndex) -> Option<FuncId> {
        self.graph[ix].func
    }

    pub fn contains(&self, node: DepNode) -> bool {
        self.index_of(node).is_some()
    }

    pub fn successors(&self, ix: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(ix, Direction::Outgoing)
    }

    pub fn predecessors(&self, ix: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(ix, Direction::Incoming)
    }

    /// `to` depends directly on `from`
    pub fn has_edge(&self, from: DepNode, to: DepNode) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Some(a), Some(b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Upper bound of node indices, for dense per-node tables
    #[inline]
    pub fn node_bound(&self) -> usize {
        self.graph.node_bound()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn sources(&self) -> impl Iterator<Item = DepNode> + '_ {
        self.sources.iter().copied()
    }

    /// Designate an extra taint source; false when the node is absent
    pub fn add_source(&mut self, node: DepNode) -> bool {
        let node = self.resolve(node);
        if !self.index.contains_key(&node) {
            return false;
        }
        self.sources.insert(node);
        self.stats.sources = self.sources.len();
        true
    }

    pub fn resets(&self) -> impl Iterator<Item = DepNode> + '_ {
        self.resets.iter().copied()
    }

    #[inline]
    pub fn is_reset(&self, ix: NodeIndex) -> bool {
        self.resets.contains(&self.graph[ix].node)
    }

    /// Conditions guarding whether a call site executes, not flooded
    pub fn call_conditions(&self, call: ValueId) -> &[ValueId] {
        self.call_conditions.get(&call).map_or(&[], Vec::as_slice)
    }

    pub fn call_sites_with_conditions(&self) -> impl Iterator<Item = (ValueId, &[ValueId])> + '_ {
        self.call_conditions
            .iter()
            .map(|(&call, conds)| (call, conds.as_slice()))
    }

    pub fn stats(&self) -> &DepGraphStats {
        &self.stats
    }
}
