//! Mod/ref summaries
//!
//! `mod(F)`: regions F or its callees may write. `ref(F)`: regions they
//! may read. Local effects first, then a bottom-up fixpoint over the call
//! graph's strongly connected components.

use super::region::{MemoryRegions, RegionId};
use crate::features::call_graph::CallGraph;
use crate::features::collectives::ext_info;
use crate::features::points_to::PointsToAnalysis;
use crate::ir::{FuncId, Module, Opcode};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct ModRefAnalysis {
    mod_sets: Vec<BTreeSet<RegionId>>,
    ref_sets: Vec<BTreeSet<RegionId>>,
}

impl ModRefAnalysis {
    pub fn build(
        module: &Module,
        pta: &PointsToAnalysis,
        regions: &MemoryRegions,
        call_graph: &CallGraph,
    ) -> Self {
        let n = module.functions.len();
        let mut analysis = Self {
            mod_sets: vec![BTreeSet::new(); n],
            ref_sets: vec![BTreeSet::new(); n],
        };

        for func in module.defined_functions() {
            analysis.collect_local(module, pta, regions, call_graph, func.id);
        }

        for scc in call_graph.sccs_bottom_up() {
            loop {
                let mut changed = false;
                for &func in scc {
                    for callee in call_graph.callees(func) {
                        if callee == func || module.function(callee).is_declaration() {
                            continue;
                        }
                        changed |= analysis.absorb(func, callee);
                    }
                }
                if !changed {
                    break;
                }
            }
        }

        tracing::debug!(functions = n, "mod/ref summaries computed");
        analysis
    }

    fn collect_local(
        &mut self,
        module: &Module,
        pta: &PointsToAnalysis,
        regions: &MemoryRegions,
        call_graph: &CallGraph,
        func: FuncId,
    ) {
        let f = func.index();
        for inst in module.function(func).instructions() {
            match module.opcode(inst) {
                Some(Opcode::Load { ptr }) => {
                    self.ref_sets[f].extend(regions.regions_of_pointer(pta, *ptr));
                }
                Some(Opcode::Store { ptr, .. }) => {
                    self.mod_sets[f].extend(regions.regions_of_pointer(pta, *ptr));
                }
                Some(Opcode::Call { args, .. }) => {
                    for &callee in call_graph.callees_of_site(inst) {
                        let callee_fn = module.function(callee);
                        if !callee_fn.is_declaration() {
                            continue;
                        }
                        let info = ext_info(&callee_fn.name);
                        for (i, &arg) in args.iter().enumerate() {
                            if !module.is_pointer(arg) || module.is_int_to_ptr_constant(arg) {
                                continue;
                            }
                            let arg_regions = regions.regions_of_pointer(pta, arg);
                            if info.map_or(true, |info| info.arg_modified(i)) {
                                self.mod_sets[f].extend(arg_regions.iter().copied());
                            }
                            self.ref_sets[f].extend(arg_regions);
                        }
                        if module.is_pointer(inst) {
                            self.mod_sets[f].extend(regions.regions_of_pointer(pta, inst));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Fold a callee's summary into its caller; true when the caller grew
    fn absorb(&mut self, caller: FuncId, callee: FuncId) -> bool {
        let (c, e) = (caller.index(), callee.index());
        let before = self.mod_sets[c].len() + self.ref_sets[c].len();
        let callee_mod = self.mod_sets[e].clone();
        let callee_ref = self.ref_sets[e].clone();
        self.mod_sets[c].extend(callee_mod);
        self.ref_sets[c].extend(callee_ref);
        self.mod_sets[c].len() + self.ref_sets[c].len() != before
    }

    pub fn mod_of(&self, func: FuncId) -> &BTreeSet<RegionId> {
        &self.mod_sets[func.index()]
    }

    pub fn ref_of(&self, func: FuncId) -> &BTreeSet<RegionId> {
        &self.ref_sets[func.index()]
    }
}
