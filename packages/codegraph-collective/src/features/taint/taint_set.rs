//! Dense set of dependency-graph nodes

use fixedbitset::FixedBitSet;
use petgraph::stable_graph::NodeIndex;

/// Bit-per-node taint set sized to the graph's index bound
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaintSet {
    bits: FixedBitSet,
}

impl TaintSet {
    pub fn new(bound: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(bound),
        }
    }

    /// Returns true when the node was not tainted before
    #[inline]
    pub fn insert(&mut self, ix: NodeIndex) -> bool {
        !self.bits.put(ix.index())
    }

    #[inline]
    pub fn remove(&mut self, ix: NodeIndex) -> bool {
        let was = self.bits.contains(ix.index());
        if was {
            self.bits.set(ix.index(), false);
        }
        was
    }

    #[inline]
    pub fn contains(&self, ix: NodeIndex) -> bool {
        self.bits.contains(ix.index())
    }

    pub fn union_with(&mut self, other: &TaintSet) {
        self.bits.union_with(&other.bits);
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.bits.ones().map(NodeIndex::new)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.count_ones(..)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.count_ones(..) == 0
    }
}
