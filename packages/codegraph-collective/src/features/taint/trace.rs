//! Taint traces: why a node is tainted

use super::taint_set::TaintSet;
use crate::features::dep_graph::{DepNode, DependencyGraph};
use crate::features::memory_ssa::{MemoryEvent, MemorySsa};
use crate::ir::{DebugLoc, Module, ValueId};
use petgraph::stable_graph::NodeIndex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// One hop of a taint trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    pub node: DepNode,
    /// IR value of the node, or the instruction its memory event sits on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueId>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<DebugLoc>,
}

impl TraceStep {
    pub fn describe(module: &Module, mssa: &MemorySsa, node: DepNode) -> Self {
        let (value, label) = match node {
            DepNode::Value(v) => {
                let label = match module.opcode(v) {
                    Some(op) => format!("{} = {}", module.display_name(v), op.as_str()),
                    None => module.display_name(v),
                };
                (Some(v), label)
            }
            DepNode::Var(f, var) => match mssa.function(f) {
                Some(ssa) => {
                    let event = ssa.event(ssa.var(var).def);
                    let value = match event {
                        MemoryEvent::Chi(chi) => chi.kind.inst(),
                        MemoryEvent::Mu(mu) => Some(mu.kind.inst()),
                        MemoryEvent::Phi(_) => None,
                    };
                    let kind = match event {
                        MemoryEvent::Chi(chi) => chi.kind.as_str(),
                        MemoryEvent::Mu(_) => "mu",
                        MemoryEvent::Phi(_) => "phi",
                    };
                    let label = format!(
                        "{}: {} {}",
                        module.function(f).name,
                        kind,
                        ssa.var_label(var)
                    );
                    (value, label)
                }
                None => (None, node.to_string()),
            },
        };
        let location = value.and_then(|v| module.location(v)).cloned();
        Self {
            node,
            value,
            label,
            location,
        }
    }
}

impl fmt::Display for TraceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} at line {}", self.label, loc),
            None => write!(f, "{}", self.label),
        }
    }
}

/// Shortest chain of tainted nodes from a source to `target`, source first
///
/// Empty when `target` is not tainted. At most `max_len` nodes are kept,
/// counted from the target.
pub(crate) fn backward_path(
    graph: &DependencyGraph,
    tainted: &TaintSet,
    target: NodeIndex,
    max_len: usize,
) -> Vec<NodeIndex> {
    if !tainted.contains(target) {
        return Vec::new();
    }

    let mut parent: FxHashMap<NodeIndex, NodeIndex> = FxHashMap::default();
    let mut queue = VecDeque::from([target]);
    let mut found = None;
    parent.insert(target, target);

    while let Some(ix) = queue.pop_front() {
        if graph.sources.contains(&graph.node(ix)) {
            found = Some(ix);
            break;
        }
        for pred in graph.predecessors(ix) {
            if tainted.contains(pred) && !parent.contains_key(&pred) {
                parent.insert(pred, ix);
                queue.push_back(pred);
            }
        }
    }

    let Some(mut ix) = found else {
        return vec![target];
    };
    let mut path = vec![ix];
    while ix != target {
        ix = parent[&ix];
        path.push(ix);
    }
    if max_len > 0 && path.len() > max_len {
        path.drain(..path.len() - max_len);
    }
    path
}
