//! Control flow facts per function
//!
//! Dominators and post-dominators come from petgraph's Cooper-Harvey-Kennedy
//! implementation. Post-dominance is computed on the reversed graph rooted at
//! a virtual exit node that every returning block flows into. Blocks that can
//! never reach a return (infinite loops, `unreachable` chains) are connected
//! to the virtual exit as well so every block has an immediate post-dominator.
//!
//! Both frontiers use the runner formulation:
//!
//! ```text
//! DF:  for b with >= 2 preds, for p in preds(b):
//!          runner = p; while runner != idom(b) { DF[runner] += b; runner = idom(runner) }
//! PDF: for b with >= 2 succs, for s in succs(b):
//!          runner = s; while runner != ipdom(b) { PDF[runner] += b; runner = ipdom(runner) }
//! ```
//!
//! # References
//! - Cooper, Harvey, Kennedy "A Simple, Fast Dominance Algorithm" (2001)
//! - Cytron et al. "Efficiently Computing Static Single Assignment Form" (TOPLAS 1991)

use super::module::{Function, Module};
use super::types::{BlockId, FuncId};
use super::value::Opcode;
use petgraph::algo::dominators::simple_fast;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Reversed;
use std::collections::VecDeque;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// CFG, dominator tree, post-dominator tree and frontiers of one function
#[derive(Debug, Clone)]
pub struct FunctionCfg {
    succs: Vec<Vec<BlockId>>,
    preds: Vec<Vec<BlockId>>,
    /// Blocks with an edge into the virtual exit
    exit_edges: Vec<bool>,
    reachable: Vec<bool>,
    idom: Vec<Option<BlockId>>,
    dom_children: Vec<Vec<BlockId>>,
    dom_frontier: Vec<Vec<BlockId>>,
    /// `None` means the virtual exit
    ipdom: Vec<Option<BlockId>>,
    pdom_children: Vec<Vec<BlockId>>,
    pdom_roots: Vec<BlockId>,
    pdf: Vec<Vec<BlockId>>,
    return_blocks: Vec<BlockId>,
    loop_member: Vec<bool>,
}

impl FunctionCfg {
    pub fn new(module: &Module, func: &Function) -> Self {
        let n = func.blocks.len();

        let mut succs: Vec<Vec<BlockId>> = vec![Vec::new(); n];
        let mut return_blocks = Vec::new();
        for block in &func.blocks {
            let Some(term) = func.terminator(block.id).and_then(|t| module.opcode(t)) else {
                continue;
            };
            for succ in term.successors() {
                if !succs[block.id.index()].contains(&succ) {
                    succs[block.id.index()].push(succ);
                }
            }
            if matches!(term, Opcode::Ret { .. }) {
                return_blocks.push(block.id);
            }
        }

        let mut preds: Vec<Vec<BlockId>> = vec![Vec::new(); n];
        for (b, list) in succs.iter().enumerate() {
            for s in list {
                preds[s.index()].push(BlockId::new(b));
            }
        }

        let reachable = forward_reachable(&succs);

        // Virtual exit edges: real exits first, then blocks that cannot reach one
        let mut exit_edges: Vec<bool> = succs.iter().map(|s| s.is_empty()).collect();
        let mut reaches_exit = exit_edges.clone();
        let roots: Vec<usize> = (0..n).filter(|&b| exit_edges[b]).collect();
        mark_backward(&preds, &mut reaches_exit, roots);
        while let Some(b) = (0..n).rev().find(|&b| !reaches_exit[b]) {
            exit_edges[b] = true;
            reaches_exit[b] = true;
            mark_backward(&preds, &mut reaches_exit, vec![b]);
        }

        let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(n + 1, n * 2);
        for _ in 0..=n {
            graph.add_node(());
        }
        let exit = NodeIndex::new(n);
        for (b, list) in succs.iter().enumerate() {
            for s in list {
                graph.add_edge(NodeIndex::new(b), NodeIndex::new(s.index()), ());
            }
            if exit_edges[b] {
                graph.add_edge(NodeIndex::new(b), exit, ());
            }
        }

        let mut cfg = Self {
            succs,
            preds,
            exit_edges,
            reachable,
            idom: vec![None; n],
            dom_children: vec![Vec::new(); n],
            dom_frontier: vec![Vec::new(); n],
            ipdom: vec![None; n],
            pdom_children: vec![Vec::new(); n],
            pdom_roots: Vec::new(),
            pdf: vec![Vec::new(); n],
            return_blocks,
            loop_member: vec![false; n],
        };

        if n == 0 {
            return cfg;
        }

        let doms = simple_fast(&graph, NodeIndex::new(0));
        for b in 0..n {
            if b == 0 || !cfg.reachable[b] {
                continue;
            }
            if let Some(parent) = doms.immediate_dominator(NodeIndex::new(b)) {
                if parent.index() < n {
                    cfg.idom[b] = Some(BlockId::new(parent.index()));
                    cfg.dom_children[parent.index()].push(BlockId::new(b));
                }
            }
        }

        let pdoms = simple_fast(Reversed(&graph), exit);
        for b in 0..n {
            let parent = pdoms
                .immediate_dominator(NodeIndex::new(b))
                .filter(|p| p.index() < n)
                .map(|p| BlockId::new(p.index()));
            cfg.ipdom[b] = parent;
            match parent {
                Some(p) => cfg.pdom_children[p.index()].push(BlockId::new(b)),
                None => cfg.pdom_roots.push(BlockId::new(b)),
            }
        }

        cfg.compute_dominance_frontier();
        cfg.compute_post_dominance_frontier();
        cfg.compute_loops();
        cfg
    }

    fn compute_dominance_frontier(&mut self) {
        for b in 0..self.num_blocks() {
            if !self.reachable[b] {
                continue;
            }
            let live_preds: Vec<BlockId> = self.preds[b]
                .iter()
                .copied()
                .filter(|p| self.reachable[p.index()])
                .collect();
            if live_preds.len() < 2 {
                continue;
            }
            let target = self.idom[b];
            for p in live_preds {
                let mut runner = Some(p);
                while let Some(r) = runner {
                    if Some(r) == target {
                        break;
                    }
                    push_unique(&mut self.dom_frontier[r.index()], BlockId::new(b));
                    runner = self.idom[r.index()];
                }
            }
        }
    }

    fn compute_post_dominance_frontier(&mut self) {
        for b in 0..self.num_blocks() {
            let out_degree = self.succs[b].len() + usize::from(self.exit_edges[b]);
            if out_degree < 2 {
                continue;
            }
            let target = self.ipdom[b];
            for s in self.succs[b].clone() {
                let mut runner = Some(s);
                while let Some(r) = runner {
                    if Some(r) == target {
                        break;
                    }
                    push_unique(&mut self.pdf[r.index()], BlockId::new(b));
                    runner = self.ipdom[r.index()];
                }
            }
        }
    }

    fn compute_loops(&mut self) {
        let n = self.num_blocks();
        let mut back_edges = Vec::new();
        for tail in 0..n {
            for &head in &self.succs[tail] {
                if self.dominates(head, BlockId::new(tail)) {
                    back_edges.push((BlockId::new(tail), head));
                }
            }
        }

        // Natural loop: the header plus everything reaching the tail without it
        for (tail, head) in back_edges {
            let mut body = vec![false; n];
            body[head.index()] = true;
            let mut stack = Vec::new();
            if !body[tail.index()] {
                body[tail.index()] = true;
                stack.push(tail);
            }
            while let Some(x) = stack.pop() {
                for &p in &self.preds[x.index()] {
                    if !body[p.index()] && self.reachable[p.index()] {
                        body[p.index()] = true;
                        stack.push(p);
                    }
                }
            }
            for (member, in_body) in self.loop_member.iter_mut().zip(body) {
                *member |= in_body;
            }
        }
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.succs.len()
    }

    #[inline]
    pub fn succs(&self, b: BlockId) -> &[BlockId] {
        &self.succs[b.index()]
    }

    #[inline]
    pub fn preds(&self, b: BlockId) -> &[BlockId] {
        &self.preds[b.index()]
    }

    #[inline]
    pub fn is_reachable(&self, b: BlockId) -> bool {
        self.reachable[b.index()]
    }

    #[inline]
    pub fn idom(&self, b: BlockId) -> Option<BlockId> {
        self.idom[b.index()]
    }

    #[inline]
    pub fn dom_children(&self, b: BlockId) -> &[BlockId] {
        &self.dom_children[b.index()]
    }

    #[inline]
    pub fn dominance_frontier(&self, b: BlockId) -> &[BlockId] {
        &self.dom_frontier[b.index()]
    }

    /// Immediate post-dominator, `None` when it is the virtual exit
    #[inline]
    pub fn ipdom(&self, b: BlockId) -> Option<BlockId> {
        self.ipdom[b.index()]
    }

    #[inline]
    pub fn pdom_children(&self, b: BlockId) -> &[BlockId] {
        &self.pdom_children[b.index()]
    }

    #[inline]
    pub fn post_dominance_frontier(&self, b: BlockId) -> &[BlockId] {
        &self.pdf[b.index()]
    }

    /// Blocks ending in `ret`
    #[inline]
    pub fn return_blocks(&self) -> &[BlockId] {
        &self.return_blocks
    }

    /// Some reachable block returns
    pub fn can_return(&self) -> bool {
        self.return_blocks.iter().any(|b| self.reachable[b.index()])
    }

    #[inline]
    pub fn in_loop(&self, b: BlockId) -> bool {
        self.loop_member[b.index()]
    }

    /// `a` dominates `b` (reflexive). Unreachable blocks are dominated by nothing.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.reachable[a.index()] || !self.reachable[b.index()] {
            return false;
        }
        let mut cursor = Some(b);
        while let Some(c) = cursor {
            if c == a {
                return true;
            }
            cursor = self.idom[c.index()];
        }
        false
    }

    /// `a` post-dominates `b` (reflexive)
    pub fn post_dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut cursor = Some(b);
        while let Some(c) = cursor {
            if c == a {
                return true;
            }
            cursor = self.ipdom[c.index()];
        }
        false
    }

    /// Reachable blocks in dominator-tree pre-order
    pub fn dom_tree_preorder(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.num_blocks());
        if self.num_blocks() == 0 {
            return order;
        }
        let mut stack = vec![BlockId(0)];
        while let Some(b) = stack.pop() {
            order.push(b);
            for &child in self.dom_children[b.index()].iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Iterated dominance frontier of a set of blocks, sorted
    pub fn iterated_dominance_frontier(&self, blocks: impl IntoIterator<Item = BlockId>) -> Vec<BlockId> {
        let mut in_result = vec![false; self.num_blocks()];
        let mut worklist: Vec<BlockId> = blocks.into_iter().collect();
        let mut queued = vec![false; self.num_blocks()];
        for b in &worklist {
            queued[b.index()] = true;
        }
        while let Some(b) = worklist.pop() {
            for &f in &self.dom_frontier[b.index()] {
                if !in_result[f.index()] {
                    in_result[f.index()] = true;
                    if !queued[f.index()] {
                        queued[f.index()] = true;
                        worklist.push(f);
                    }
                }
            }
        }
        (0..self.num_blocks())
            .filter(|&b| in_result[b])
            .map(BlockId::new)
            .collect()
    }

    /// PDF+ of a block, in breadth-first discovery order
    pub fn iterated_post_dominance_frontier(&self, block: BlockId) -> Vec<BlockId> {
        self.iterated_post_dominance_frontier_of(std::iter::once(block))
    }

    /// PDF+ of a set of blocks, in breadth-first discovery order
    pub fn iterated_post_dominance_frontier_of(
        &self,
        blocks: impl IntoIterator<Item = BlockId>,
    ) -> Vec<BlockId> {
        let mut seen = vec![false; self.num_blocks()];
        let mut result = Vec::new();
        let mut queue: VecDeque<BlockId> = VecDeque::new();
        for b in blocks {
            queue.extend(self.pdf[b.index()].iter().copied());
        }
        while let Some(b) = queue.pop_front() {
            if seen[b.index()] {
                continue;
            }
            seen[b.index()] = true;
            result.push(b);
            queue.extend(self.pdf[b.index()].iter().copied());
        }
        result
    }

    /// Post-dominance frontier table from the local/up decomposition over
    /// the post-dominator tree. Agrees with the runner table.
    pub fn cytron_post_dominance_frontier(&self) -> Vec<Vec<BlockId>> {
        let n = self.num_blocks();
        let mut table: Vec<Vec<BlockId>> = vec![Vec::new(); n];

        // Post-order over the post-dominator tree, children first
        let mut order = Vec::with_capacity(n);
        let mut stack: Vec<(BlockId, bool)> = self.pdom_roots.iter().map(|&r| (r, false)).collect();
        while let Some((b, expanded)) = stack.pop() {
            if expanded {
                order.push(b);
                continue;
            }
            stack.push((b, true));
            for &child in &self.pdom_children[b.index()] {
                stack.push((child, false));
            }
        }

        for b in order {
            let mut frontier = Vec::new();
            for &x in &self.preds[b.index()] {
                if self.ipdom[x.index()] != Some(b) {
                    push_unique(&mut frontier, x);
                }
            }
            for &child in &self.pdom_children[b.index()] {
                for &z in &table[child.index()] {
                    if self.ipdom[z.index()] != Some(b) {
                        push_unique(&mut frontier, z);
                    }
                }
            }
            table[b.index()] = frontier;
        }
        table
    }
}

#[inline]
fn push_unique(list: &mut Vec<BlockId>, b: BlockId) {
    if !list.contains(&b) {
        list.push(b);
    }
}

fn forward_reachable(succs: &[Vec<BlockId>]) -> Vec<bool> {
    let mut seen = vec![false; succs.len()];
    if succs.is_empty() {
        return seen;
    }
    let mut stack = vec![0usize];
    seen[0] = true;
    while let Some(b) = stack.pop() {
        for s in &succs[b] {
            if !seen[s.index()] {
                seen[s.index()] = true;
                stack.push(s.index());
            }
        }
    }
    seen
}

fn mark_backward(preds: &[Vec<BlockId>], seen: &mut [bool], mut stack: Vec<usize>) {
    while let Some(b) = stack.pop() {
        for p in &preds[b] {
            if !seen[p.index()] {
                seen[p.index()] = true;
                stack.push(p.index());
            }
        }
    }
}

/// Control flow facts for every defined function of a module
#[derive(Debug, Clone, Default)]
pub struct ModuleCfg {
    cfgs: Vec<Option<FunctionCfg>>,
}

impl ModuleCfg {
    pub fn build(module: &Module) -> Self {
        let build_one = |func: &Function| {
            if func.is_declaration() {
                None
            } else {
                Some(FunctionCfg::new(module, func))
            }
        };

        #[cfg(feature = "parallel")]
        let cfgs = module.functions.par_iter().map(build_one).collect();
        #[cfg(not(feature = "parallel"))]
        let cfgs = module.functions.iter().map(build_one).collect();

        Self { cfgs }
    }

    #[inline]
    pub fn get(&self, func: FuncId) -> Option<&FunctionCfg> {
        self.cfgs.get(func.index()).and_then(Option::as_ref)
    }

    /// CFG of a defined function; panics for declarations
    #[inline]
    pub fn of(&self, func: FuncId) -> &FunctionCfg {
        self.get(func)
            .unwrap_or_else(|| panic!("no CFG for declaration {}", func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ModuleBuilder, Type};

    /// entry -> (then | else) -> join -> ret
    fn diamond() -> (Module, FuncId) {
        let mut mb = ModuleBuilder::new("diamond");
        let f = mb.define("f", &[Type::Int], Type::Void);
        {
            let mut fb = mb.body(f);
            let then_bb = fb.block("then");
            let else_bb = fb.block("else");
            let join = fb.block("join");
            let c = fb.param(0);
            fb.cond_br(c, then_bb, else_bb);
            fb.switch_to(then_bb);
            fb.br(join);
            fb.switch_to(else_bb);
            fb.br(join);
            fb.switch_to(join);
            fb.ret(None);
        }
        (mb.finish(), f)
    }

    #[test]
    fn test_diamond_dominators() {
        let (module, f) = diamond();
        let cfg = FunctionCfg::new(&module, module.function(f));
        assert_eq!(cfg.idom(BlockId(3)), Some(BlockId(0)));
        assert_eq!(cfg.ipdom(BlockId(0)), Some(BlockId(3)));
        assert_eq!(cfg.ipdom(BlockId(3)), None);
        assert_eq!(cfg.dominance_frontier(BlockId(1)), &[BlockId(3)]);
        assert!(cfg.dominates(BlockId(0), BlockId(2)));
        assert!(!cfg.dominates(BlockId(1), BlockId(3)));
        assert!(cfg.post_dominates(BlockId(3), BlockId(1)));
    }

    #[test]
    fn test_diamond_post_dominance_frontier() {
        let (module, f) = diamond();
        let cfg = FunctionCfg::new(&module, module.function(f));
        assert_eq!(cfg.post_dominance_frontier(BlockId(1)), &[BlockId(0)]);
        assert_eq!(cfg.post_dominance_frontier(BlockId(2)), &[BlockId(0)]);
        assert!(cfg.post_dominance_frontier(BlockId(3)).is_empty());
        assert_eq!(cfg.iterated_post_dominance_frontier(BlockId(1)), vec![BlockId(0)]);
    }

    #[test]
    fn test_self_loop_is_in_own_frontier() {
        let mut mb = ModuleBuilder::new("spin");
        let f = mb.define("f", &[Type::Int], Type::Void);
        {
            let mut fb = mb.body(f);
            let body = fb.block("body");
            let exit = fb.block("exit");
            fb.br(body);
            fb.switch_to(body);
            let c = fb.param(0);
            fb.cond_br(c, body, exit);
            fb.switch_to(exit);
            fb.ret(None);
        }
        let module = mb.finish();
        let cfg = FunctionCfg::new(&module, module.function(f));
        assert_eq!(cfg.post_dominance_frontier(BlockId(1)), &[BlockId(1)]);
        assert!(cfg.in_loop(BlockId(1)));
        assert!(!cfg.in_loop(BlockId(2)));
    }

    #[test]
    fn test_infinite_loop_still_has_post_dominators() {
        let mut mb = ModuleBuilder::new("forever");
        let f = mb.define("f", &[], Type::Void);
        {
            let mut fb = mb.body(f);
            let body = fb.block("body");
            fb.br(body);
            fb.switch_to(body);
            fb.br(body);
        }
        let module = mb.finish();
        let cfg = FunctionCfg::new(&module, module.function(f));
        assert!(!cfg.can_return());
        assert_eq!(cfg.ipdom(BlockId(0)), Some(BlockId(1)));
        assert_eq!(cfg.cytron_post_dominance_frontier(), vec![vec![], vec![BlockId(1)]]);
    }

    #[test]
    fn test_runner_and_cytron_tables_agree_on_diamond() {
        let (module, f) = diamond();
        let cfg = FunctionCfg::new(&module, module.function(f));
        let cytron = cfg.cytron_post_dominance_frontier();
        for b in 0..cfg.num_blocks() {
            let mut direct = cfg.post_dominance_frontier(BlockId::new(b)).to_vec();
            let mut other = cytron[b].clone();
            direct.sort();
            other.sort();
            assert_eq!(direct, other, "block {}", b);
        }
    }

    #[test]
    fn test_unreachable_block_is_not_dominated() {
        let mut mb = ModuleBuilder::new("dead");
        let f = mb.define("f", &[], Type::Void);
        {
            let mut fb = mb.body(f);
            let dead = fb.block("dead");
            fb.ret(None);
            fb.switch_to(dead);
            fb.ret(None);
        }
        let module = mb.finish();
        let cfg = FunctionCfg::new(&module, module.function(f));
        assert!(!cfg.is_reachable(BlockId(1)));
        assert!(!cfg.dominates(BlockId(0), BlockId(1)));
        assert_eq!(cfg.dom_tree_preorder(), vec![BlockId(0)]);
    }
}
