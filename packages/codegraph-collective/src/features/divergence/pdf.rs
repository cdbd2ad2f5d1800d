//! Interprocedural iterated post-dominance frontier of a call site
//!
//! PDF+ of the call's block in its own function, then PDF+ of the block of
//! every call site of the containing function, transitively. A call site is
//! expanded once.

use crate::features::call_graph::CallGraph;
use crate::ir::{BlockId, FuncId, Module, ModuleCfg, ValueId};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Blocks controlling whether `call` executes, in discovery order
pub fn call_pdf_plus(
    module: &Module,
    cfgs: &ModuleCfg,
    call_graph: &CallGraph,
    call: ValueId,
    interprocedural: bool,
) -> Vec<(FuncId, BlockId)> {
    let mut out = Vec::new();
    let mut seen_blocks: FxHashSet<(FuncId, BlockId)> = FxHashSet::default();
    let mut visited: FxHashSet<ValueId> = FxHashSet::default();
    let mut queue = VecDeque::from([call]);

    while let Some(site) = queue.pop_front() {
        if !visited.insert(site) {
            continue;
        }
        let Some(inst) = module.instruction(site) else {
            continue;
        };
        let Some(cfg) = cfgs.get(inst.func) else {
            continue;
        };
        for block in cfg.iterated_post_dominance_frontier(inst.block) {
            if seen_blocks.insert((inst.func, block)) {
                out.push((inst.func, block));
            }
        }
        if interprocedural {
            for &caller_site in call_graph.call_sites_of(inst.func) {
                if !visited.contains(&caller_site) {
                    queue.push_back(caller_site);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PointsToConfig;
    use crate::features::points_to::PointsToAnalysis;
    use crate::ir::{ModuleBuilder, Type};

    #[test]
    fn test_frontier_extends_through_callers() {
        let mut mb = ModuleBuilder::new("t");
        let barrier = mb.declare("MPI_Barrier", &[Type::Int], Type::Int);
        let sync = mb.define("sync", &[], Type::Void);
        let main = mb.define("main", &[Type::Int], Type::Void);
        let inner = {
            let mut b = mb.body(sync);
            let zero = b.const_int(0);
            let call = b.call(barrier, &[zero]);
            b.ret(None);
            call
        };
        {
            let mut b = mb.body(main);
            let x = b.param(0);
            let zero = b.const_int(0);
            let cond = b.cmp(x, zero);
            let then = b.block("then");
            let join = b.block("join");
            b.cond_br(cond, then, join);
            b.switch_to(then);
            b.call(sync, &[]);
            b.br(join);
            b.switch_to(join);
            b.ret(None);
        }
        let module = mb.finish();
        let cfgs = ModuleCfg::build(&module);
        let pta = PointsToAnalysis::run(&module, &PointsToConfig::default());
        let cg = CallGraph::build(&module, &pta);

        assert!(call_pdf_plus(&module, &cfgs, &cg, inner, false).is_empty());
        assert_eq!(
            call_pdf_plus(&module, &cfgs, &cg, inner, true),
            vec![(main, BlockId(0))]
        );
    }
}
