//! Points-to graph nodes
//!
//! All nodes live in one arena indexed by [`NodeId`]. Cycle collapsing
//! merges nodes by redirecting `merge_target`; every points-to set is read
//! through the representative returned by [`NodeFactory::merge_target`].

use crate::ir::{FuncId, ValueId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    UniversalPtr,
    UniversalObj,
    NullPtr,
    NullObj,
    /// A pointer-typed value
    Value { value: ValueId },
    /// Pointer returned by a function
    Return { func: FuncId },
    /// Pointers passed through the variadic part of a function's calls
    Vararg { func: FuncId },
    /// Abstract memory object of an alloca, global, function or heap call site
    Object { site: ValueId },
    /// Intermediate of an external copy summary
    Temp,
}

impl NodeKind {
    #[inline]
    pub fn is_object(self) -> bool {
        matches!(
            self,
            NodeKind::Object { .. } | NodeKind::UniversalObj | NodeKind::NullObj
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    merge_target: NodeId,
}

/// Node arena plus the lookup maps from IR entities to nodes
#[derive(Debug, Clone)]
pub struct NodeFactory {
    nodes: Vec<Node>,
    value_nodes: FxHashMap<ValueId, NodeId>,
    object_nodes: FxHashMap<ValueId, NodeId>,
    return_nodes: FxHashMap<FuncId, NodeId>,
    vararg_nodes: FxHashMap<FuncId, NodeId>,
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory {
    pub const UNIVERSAL_PTR: NodeId = NodeId(0);
    pub const UNIVERSAL_OBJ: NodeId = NodeId(1);
    pub const NULL_PTR: NodeId = NodeId(2);
    pub const NULL_OBJ: NodeId = NodeId(3);

    pub fn new() -> Self {
        let mut factory = Self {
            nodes: Vec::new(),
            value_nodes: FxHashMap::default(),
            object_nodes: FxHashMap::default(),
            return_nodes: FxHashMap::default(),
            vararg_nodes: FxHashMap::default(),
        };
        factory.push(NodeKind::UniversalPtr);
        factory.push(NodeKind::UniversalObj);
        factory.push(NodeKind::NullPtr);
        factory.push(NodeKind::NullObj);
        factory
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            merge_target: id,
        });
        id
    }

    pub fn create_value_node(&mut self, value: ValueId) -> NodeId {
        if let Some(&id) = self.value_nodes.get(&value) {
            return id;
        }
        let id = self.push(NodeKind::Value { value });
        self.value_nodes.insert(value, id);
        id
    }

    pub fn create_object_node(&mut self, site: ValueId) -> NodeId {
        if let Some(&id) = self.object_nodes.get(&site) {
            return id;
        }
        let id = self.push(NodeKind::Object { site });
        self.object_nodes.insert(site, id);
        id
    }

    pub fn create_return_node(&mut self, func: FuncId) -> NodeId {
        if let Some(&id) = self.return_nodes.get(&func) {
            return id;
        }
        let id = self.push(NodeKind::Return { func });
        self.return_nodes.insert(func, id);
        id
    }

    pub fn create_vararg_node(&mut self, func: FuncId) -> NodeId {
        if let Some(&id) = self.vararg_nodes.get(&func) {
            return id;
        }
        let id = self.push(NodeKind::Vararg { func });
        self.vararg_nodes.insert(func, id);
        id
    }

    pub fn create_temp_node(&mut self) -> NodeId {
        self.push(NodeKind::Temp)
    }

    /// Make `value` resolve to an existing node (folded constants)
    pub fn alias_value(&mut self, value: ValueId, node: NodeId) {
        self.value_nodes.insert(value, node);
    }

    #[inline]
    pub fn value_node(&self, value: ValueId) -> Option<NodeId> {
        self.value_nodes.get(&value).copied()
    }

    #[inline]
    pub fn object_node(&self, site: ValueId) -> Option<NodeId> {
        self.object_nodes.get(&site).copied()
    }

    #[inline]
    pub fn return_node(&self, func: FuncId) -> Option<NodeId> {
        self.return_nodes.get(&func).copied()
    }

    #[inline]
    pub fn vararg_node(&self, func: FuncId) -> Option<NodeId> {
        self.vararg_nodes.get(&func).copied()
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    #[inline]
    pub fn is_object(&self, id: NodeId) -> bool {
        self.kind(id).is_object()
    }

    /// Allocation site of an object node
    pub fn site_of(&self, id: NodeId) -> Option<ValueId> {
        match self.kind(id) {
            NodeKind::Object { site } => Some(site),
            _ => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Redirect `from` to `into`; both must already be representatives
    pub fn merge(&mut self, into: NodeId, from: NodeId) {
        assert!(into.index() < self.nodes.len() && from.index() < self.nodes.len());
        self.nodes[from.index()].merge_target = into;
    }

    /// Representative of `id`, compressing the path behind it
    pub fn merge_target(&mut self, id: NodeId) -> NodeId {
        let root = self.find(id);
        let mut current = id;
        while current != root {
            let next = self.nodes[current.index()].merge_target;
            self.nodes[current.index()].merge_target = root;
            current = next;
        }
        root
    }

    /// Representative of `id` without path compression
    pub fn find(&self, id: NodeId) -> NodeId {
        let mut current = id;
        loop {
            let next = self.nodes[current.index()].merge_target;
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// All object nodes that stand for an allocation site, in creation order
    pub fn object_sites(&self) -> impl Iterator<Item = (NodeId, ValueId)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match node.kind {
                NodeKind::Object { site } => Some((NodeId(i as u32), site)),
                _ => None,
            })
    }
}
