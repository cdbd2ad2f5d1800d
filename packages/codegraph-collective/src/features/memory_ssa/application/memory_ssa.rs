//! Module-wide memory SSA
//!
//! Every defined function is built independently, in parallel when the
//! `parallel` feature and [`MemorySsaConfig::parallel`] are both on. The
//! result is complete before any consumer reads it.

use crate::config::MemorySsaConfig;
use crate::features::call_graph::CallGraph;
use crate::features::memory_region::{MemoryRegions, ModRefAnalysis};
use crate::features::memory_ssa::domain::FunctionMemorySsa;
use crate::features::memory_ssa::infrastructure::MemorySsaBuilder;
use crate::features::points_to::PointsToAnalysis;
use crate::ir::{FuncId, Function, Module, ModuleCfg};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemorySsaStats {
    pub functions: usize,
    pub chis: usize,
    pub mus: usize,
    pub phis: usize,
    pub vars: usize,
    pub duration_ms: f64,
}

#[derive(Debug, Clone)]
pub struct MemorySsa {
    functions: Vec<Option<FunctionMemorySsa>>,
    stats: MemorySsaStats,
}

impl MemorySsa {
    pub fn build(
        module: &Module,
        cfgs: &ModuleCfg,
        pta: &PointsToAnalysis,
        regions: &MemoryRegions,
        modref: &ModRefAnalysis,
        call_graph: &CallGraph,
        config: &MemorySsaConfig,
    ) -> Self {
        let start = Instant::now();
        let builder = MemorySsaBuilder::new(module, pta, regions, modref, call_graph, config);

        let build_one = |func: &Function| -> Option<FunctionMemorySsa> {
            let cfg = cfgs.get(func.id)?;
            Some(builder.build(func, cfg))
        };

        #[cfg(feature = "parallel")]
        let functions: Vec<Option<FunctionMemorySsa>> = if config.parallel {
            module.functions.par_iter().map(build_one).collect()
        } else {
            module.functions.iter().map(build_one).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let functions: Vec<Option<FunctionMemorySsa>> =
            module.functions.iter().map(build_one).collect();

        let mut stats = MemorySsaStats::default();
        for ssa in functions.iter().flatten() {
            stats.functions += 1;
            stats.chis += ssa.chi_count();
            stats.mus += ssa.mu_count();
            stats.phis += ssa.phi_count();
            stats.vars += ssa.var_count();
        }
        stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            functions = stats.functions,
            chis = stats.chis,
            mus = stats.mus,
            phis = stats.phis,
            duration_ms = stats.duration_ms,
            "memory SSA built"
        );

        Self { functions, stats }
    }

    /// Memory SSA of a defined function
    #[inline]
    pub fn function(&self, func: FuncId) -> Option<&FunctionMemorySsa> {
        self.functions.get(func.index()).and_then(Option::as_ref)
    }

    /// Memory SSA of a defined function; panics for declarations
    #[inline]
    pub fn of(&self, func: FuncId) -> &FunctionMemorySsa {
        self.function(func)
            .unwrap_or_else(|| panic!("no memory SSA for declaration {}", func))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionMemorySsa> + '_ {
        self.functions.iter().flatten()
    }

    pub fn stats(&self) -> &MemorySsaStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PointsToConfig, RegionConfig};
    use crate::features::memory_region::RegionId;
    use crate::features::memory_ssa::domain::{ChiKind, MemoryEvent, MuKind};
    use crate::ir::{BlockId, FunctionCfg, ModuleBuilder, Type, ValueId};
    use pretty_assertions::assert_eq;

    struct Built {
        module: Module,
        cfgs: ModuleCfg,
        pta: PointsToAnalysis,
        regions: MemoryRegions,
        ssa: MemorySsa,
    }

    fn build_with(module: Module, config: &MemorySsaConfig) -> Built {
        let cfgs = ModuleCfg::build(&module);
        let pta = PointsToAnalysis::run(&module, &PointsToConfig::default());
        let regions = MemoryRegions::build(&module, &pta, &RegionConfig::default());
        let cg = CallGraph::build(&module, &pta);
        let modref = ModRefAnalysis::build(&module, &pta, &regions, &cg);
        let ssa = MemorySsa::build(&module, &cfgs, &pta, &regions, &modref, &cg, config);
        Built {
            module,
            cfgs,
            pta,
            regions,
            ssa,
        }
    }

    fn build(module: Module) -> Built {
        build_with(module, &MemorySsaConfig::default())
    }

    impl Built {
        fn region(&self, site: ValueId) -> RegionId {
            self.regions.region_of_site(&self.pta, site).unwrap()
        }
    }

    /// entry: if (x < 0) store 1 else store 2; join: load
    fn diamond() -> (Module, FuncId, ValueId, ValueId, ValueId) {
        let mut mb = ModuleBuilder::new("t");
        let main = mb.define("main", &[Type::Int], Type::Int);
        let (p, cond, load) = {
            let mut b = mb.body(main);
            let p = b.alloca("p");
            let x = b.param(0);
            let zero = b.const_int(0);
            let cond = b.cmp(x, zero);
            let then = b.block("then");
            let other = b.block("else");
            let join = b.block("join");
            b.cond_br(cond, then, other);
            b.switch_to(then);
            let one = b.const_int(1);
            b.store(one, p);
            b.br(join);
            b.switch_to(other);
            let two = b.const_int(2);
            b.store(two, p);
            b.br(join);
            b.switch_to(join);
            let load = b.load(Type::Int, p);
            b.ret(Some(load));
            (p, cond, load)
        };
        (mb.finish(), main, p, cond, load)
    }

    #[test]
    fn test_diamond_places_gated_phi() {
        let (module, main, p, cond, load) = diamond();
        let built = build(module);
        let ssa = built.ssa.of(main);
        let region = built.region(p);

        let phis: Vec<_> = ssa.phis().collect();
        assert_eq!(phis.len(), 1);
        let phi = phis[0];
        assert_eq!(phi.region, region);
        assert_eq!(phi.block, BlockId(3));
        assert_eq!(phi.ops.len(), 2);
        assert_eq!(phi.preds, vec![cond]);

        let mu = ssa.load_mus(load).next().unwrap();
        assert_eq!(mu.var, Some(phi.var));

        let entry = ssa.entry_chi(region).unwrap();
        assert_eq!(ssa.var(entry.var).version, 0);
        for inst in built.module.function(main).instructions() {
            for chi in ssa.store_chis(inst) {
                assert_eq!(chi.op_var, Some(entry.var));
            }
        }
    }

    #[test]
    fn test_phi_predicates_can_be_disabled() {
        let (module, main, ..) = diamond();
        let built = build_with(module, &MemorySsaConfig::default().phi_predicates(false));
        let phi = built.ssa.of(main).phis().next().unwrap();
        assert!(phi.preds.is_empty());
    }

    #[test]
    fn test_mu_reaching_definitions_dominate() {
        let mut mb = ModuleBuilder::new("t");
        let g = mb.global("g", None);
        let main = mb.define("main", &[Type::Int], Type::Void);
        {
            let mut b = mb.body(main);
            let header = b.block("header");
            let body = b.block("body");
            let exit = b.block("exit");
            b.br(header);
            b.switch_to(header);
            let v = b.load(Type::Int, g);
            let n = b.param(0);
            let c = b.cmp(v, n);
            b.cond_br(c, body, exit);
            b.switch_to(body);
            let one = b.const_int(1);
            let next = b.binary(v, one);
            b.store(next, g);
            b.br(header);
            b.switch_to(exit);
            b.load(Type::Int, g);
            b.ret(None);
        }
        let built = build(mb.finish());
        let ssa = built.ssa.of(main);
        let cfg: &FunctionCfg = built.cfgs.of(main);

        let mut checked = 0;
        for (_, event) in ssa.events() {
            let MemoryEvent::Mu(mu) = event else {
                continue;
            };
            let use_block = built.module.instruction(mu.kind.inst()).unwrap().block;
            let var = mu.var.expect("reachable mu has a reaching definition");
            let def_block = ssa.var(var).block.unwrap();
            assert!(cfg.dominates(def_block, use_block));
            checked += 1;
        }
        assert!(checked >= 3);

        let phi = ssa.phis().next().unwrap();
        for (&pred_index, &var) in &phi.ops {
            let pred = cfg.preds(phi.block)[pred_index];
            assert!(cfg.dominates(ssa.var(var).block.unwrap(), pred));
        }
    }

    #[test]
    fn test_external_call_summaries() {
        let mut mb = ModuleBuilder::new("t");
        let rank_fn = mb.declare("MPI_Comm_rank", &[Type::Int, Type::Ptr], Type::Int);
        let main = mb.define("main", &[], Type::Void);
        let (rank, call) = {
            let mut b = mb.body(main);
            let rank = b.alloca("rank");
            let comm = b.const_int(0);
            let call = b.call(rank_fn, &[comm, rank]);
            b.ret(None);
            (rank, call)
        };
        let built = build(mb.finish());
        let ssa = built.ssa.of(main);
        let region = built.region(rank);

        let summary = ssa.ext_summary(call, rank_fn).unwrap();
        assert_eq!(summary.arg_entry.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert!(summary.ret.is_none());
        assert!(summary.vararg_entry.is_none());

        let exit = summary.arg_exit[&1];
        assert_eq!(ssa.var(exit).version, 1);
        let exit_chi = ssa.event(ssa.var(exit).def).as_chi().unwrap();
        assert_eq!(exit_chi.op_var, Some(summary.arg_entry[&1]));
        assert!(ssa.is_summary_var(exit));

        let mus: Vec<_> = ssa.call_mus(call).collect();
        assert_eq!(mus.len(), 1);
        assert_eq!(
            mus[0].kind,
            MuKind::ExtCall {
                inst: call,
                callee: rank_fn,
                arg: 1
            }
        );
        let chis: Vec<_> = ssa.call_chis(call).collect();
        assert_eq!(chis.len(), 1);
        assert_eq!(chis[0].region, Some(region));
    }

    #[test]
    fn test_defined_callee_gets_entry_and_return_events() {
        let mut mb = ModuleBuilder::new("t");
        let g = mb.global("g", None);
        let set = mb.define("set", &[], Type::Void);
        let main = mb.define("main", &[], Type::Void);
        {
            let mut b = mb.body(set);
            let one = b.const_int(1);
            b.store(one, g);
            b.ret(None);
        }
        let call = {
            let mut b = mb.body(main);
            let call = b.call(set, &[]);
            b.ret(None);
            call
        };
        let built = build(mb.finish());
        let region = built.region(g);

        let callee = built.ssa.of(set);
        assert!(callee.entry_chi(region).is_some());
        assert_eq!(callee.all_return_mus().count(), 1);

        let caller = built.ssa.of(main);
        let chi = caller.call_chis(call).next().unwrap();
        assert!(matches!(chi.kind, ChiKind::Call { callee, .. } if callee == set));
        assert_eq!(chi.op_var, Some(caller.entry_chi(region).unwrap().var));
    }

    #[test]
    fn test_sequential_and_parallel_builds_agree() {
        let (module, main, ..) = diamond();
        let parallel = build(module.clone());
        let sequential = build_with(module, &MemorySsaConfig::default().parallel(false));
        assert_eq!(
            parallel.ssa.of(main).events().map(|(_, e)| e.clone()).collect::<Vec<_>>(),
            sequential.ssa.of(main).events().map(|(_, e)| e.clone()).collect::<Vec<_>>()
        );
        assert_eq!(parallel.ssa.stats().phis, 1);
    }
}
