/*
 * Memory SSA construction for one function
 *
 * Phases:
 * 1. Mu/Chi placement from points-to regions and mod/ref summaries
 * 2. EntryChi per used region, ReturnMu per used region and `ret`
 * 3. Phi placement at the iterated dominance frontier of definition blocks
 * 4. Renaming over the dominator tree (counter C, stack S per region)
 * 5. Gating predicates of memory and IR phis from PDF+
 * 6. Per-call-site summary variables for external callees
 *
 * References:
 * - Cytron et al. "Efficiently Computing Static Single Assignment Form" (1991)
 * - Chow et al. "Effective Representation of Aliases and Indirect Memory
 *   Operations in SSA Form" (CC 1996)
 * - Tu, Padua "Efficient Building and Placing of Gating Functions" (PLDI 1995)
 */

use crate::config::MemorySsaConfig;
use crate::features::call_graph::CallGraph;
use crate::features::collectives::ext_info;
use crate::features::memory_region::{MemoryRegions, ModRefAnalysis, RegionId};
use crate::features::memory_ssa::domain::{
    Chi, ChiKind, EventId, ExtCallSummary, FunctionMemorySsa, MemoryEvent, Mu, MuKind, Phi,
    VarId,
};
use crate::features::points_to::PointsToAnalysis;
use crate::ir::{BlockId, Function, FunctionCfg, Module, Opcode, ValueId};
use ahash::AHashMap as HashMap;
use std::collections::{BTreeMap, BTreeSet};

/// Shared, read-only inputs of the per-function construction
pub struct MemorySsaBuilder<'a> {
    module: &'a Module,
    pta: &'a PointsToAnalysis,
    regions: &'a MemoryRegions,
    modref: &'a ModRefAnalysis,
    call_graph: &'a CallGraph,
    config: &'a MemorySsaConfig,
}

/// Walk step of the renaming pass
enum Visit {
    Enter(BlockId),
    /// Pop the listed regions once every dominated block is done
    Leave(Vec<RegionId>),
}

impl<'a> MemorySsaBuilder<'a> {
    pub fn new(
        module: &'a Module,
        pta: &'a PointsToAnalysis,
        regions: &'a MemoryRegions,
        modref: &'a ModRefAnalysis,
        call_graph: &'a CallGraph,
        config: &'a MemorySsaConfig,
    ) -> Self {
        Self {
            module,
            pta,
            regions,
            modref,
            call_graph,
            config,
        }
    }

    pub fn build(&self, func: &Function, cfg: &FunctionCfg) -> FunctionMemorySsa {
        let mut ssa = FunctionMemorySsa::new(func.id);
        let mut def_blocks: BTreeMap<RegionId, BTreeSet<BlockId>> = BTreeMap::new();

        self.compute_mu_chi(func, &mut ssa, &mut def_blocks);
        self.compute_entry_and_return(func, cfg, &mut ssa, &mut def_blocks);
        self.place_phis(cfg, &mut ssa, &def_blocks);
        self.rename(func, cfg, &mut ssa);
        if self.config.phi_predicates {
            self.compute_phi_predicates(func, cfg, &mut ssa);
        }
        self.build_ext_summaries(func, &mut ssa);

        #[cfg(feature = "trace")]
        tracing::trace!(
            function = %func.name,
            chis = ssa.chi_count(),
            mus = ssa.mu_count(),
            phis = ssa.phi_count(),
            "memory SSA for function"
        );

        ssa
    }

    // ═══════════════════════════════════════════════════════════════════
    // Event creation
    // ═══════════════════════════════════════════════════════════════════

    fn add_chi(
        ssa: &mut FunctionMemorySsa,
        kind: ChiKind,
        region: Option<RegionId>,
        block: Option<BlockId>,
        version: u32,
    ) -> EventId {
        let event = ssa.push_event(MemoryEvent::Chi(Chi {
            kind,
            region,
            var: VarId(0),
            op_var: None,
        }));
        let var = ssa.new_var(region, version, block, event);
        if let MemoryEvent::Chi(chi) = ssa.event_mut(event) {
            chi.var = var;
        }
        event
    }

    fn add_mu(ssa: &mut FunctionMemorySsa, kind: MuKind, region: RegionId) -> EventId {
        ssa.push_event(MemoryEvent::Mu(Mu {
            kind,
            region,
            var: None,
        }))
    }

    fn compute_mu_chi(
        &self,
        func: &Function,
        ssa: &mut FunctionMemorySsa,
        def_blocks: &mut BTreeMap<RegionId, BTreeSet<BlockId>>,
    ) {
        for block in &func.blocks {
            for &inst in &block.insts {
                let Some(op) = self.module.opcode(inst) else {
                    continue;
                };
                match op {
                    Opcode::Load { ptr } => {
                        for region in self.regions.regions_of_pointer(self.pta, *ptr) {
                            let mu = Self::add_mu(ssa, MuKind::Load { inst }, region);
                            ssa.load_mus.entry(inst).or_default().push(mu);
                            ssa.used_regions.insert(region);
                        }
                    }
                    Opcode::Store { ptr, .. } => {
                        for region in self.regions.regions_of_pointer(self.pta, *ptr) {
                            let chi = Self::add_chi(
                                ssa,
                                ChiKind::Store { inst },
                                Some(region),
                                Some(block.id),
                                0,
                            );
                            ssa.store_chis.entry(inst).or_default().push(chi);
                            ssa.used_regions.insert(region);
                            def_blocks.entry(region).or_default().insert(block.id);
                        }
                    }
                    Opcode::Call { args, .. } => {
                        self.call_mu_chi(inst, block.id, args, ssa, def_blocks);
                    }
                    _ => {}
                }
            }
        }
    }

    fn call_mu_chi(
        &self,
        inst: ValueId,
        block: BlockId,
        args: &[ValueId],
        ssa: &mut FunctionMemorySsa,
        def_blocks: &mut BTreeMap<RegionId, BTreeSet<BlockId>>,
    ) {
        let mut mus = Vec::new();
        let mut chis = Vec::new();

        for &callee in self.call_graph.callees_of_site(inst) {
            let callee_fn = self.module.function(callee);

            if !callee_fn.is_declaration() {
                for &region in self.modref.ref_of(callee) {
                    mus.push(Self::add_mu(ssa, MuKind::Call { inst, callee }, region));
                    ssa.used_regions.insert(region);
                }
                for &region in self.modref.mod_of(callee) {
                    chis.push(Self::add_chi(
                        ssa,
                        ChiKind::Call { inst, callee },
                        Some(region),
                        Some(block),
                        0,
                    ));
                    ssa.used_regions.insert(region);
                    def_blocks.entry(region).or_default().insert(block);
                }
                continue;
            }

            let info = ext_info(&callee_fn.name);
            for (arg, &value) in args.iter().enumerate() {
                if !self.module.is_pointer(value) || self.module.is_int_to_ptr_constant(value) {
                    continue;
                }
                let modified = info.map_or(true, |info| info.arg_modified(arg));
                for region in self.regions.regions_of_pointer(self.pta, value) {
                    mus.push(Self::add_mu(
                        ssa,
                        MuKind::ExtCall { inst, callee, arg },
                        region,
                    ));
                    if modified {
                        chis.push(Self::add_chi(
                            ssa,
                            ChiKind::ExtCall { inst, callee, arg },
                            Some(region),
                            Some(block),
                            0,
                        ));
                        def_blocks.entry(region).or_default().insert(block);
                    }
                    ssa.used_regions.insert(region);
                }
            }

            if self.module.is_pointer(inst) {
                for region in self.regions.regions_of_pointer(self.pta, inst) {
                    chis.push(Self::add_chi(
                        ssa,
                        ChiKind::ExtRet { inst, callee },
                        Some(region),
                        Some(block),
                        0,
                    ));
                    ssa.used_regions.insert(region);
                    def_blocks.entry(region).or_default().insert(block);
                }
            }
        }

        if !mus.is_empty() {
            ssa.call_mus.insert(inst, mus);
        }
        if !chis.is_empty() {
            ssa.call_chis.insert(inst, chis);
        }
    }

    fn compute_entry_and_return(
        &self,
        func: &Function,
        cfg: &FunctionCfg,
        ssa: &mut FunctionMemorySsa,
        def_blocks: &mut BTreeMap<RegionId, BTreeSet<BlockId>>,
    ) {
        let entry = func.entry();
        let used: Vec<RegionId> = ssa.used_regions.iter().copied().collect();

        for &region in &used {
            let chi = Self::add_chi(ssa, ChiKind::Entry, Some(region), Some(entry), 0);
            ssa.entry_chis.insert(region, chi);
            def_blocks.entry(region).or_default().insert(entry);
        }

        if !cfg.can_return() {
            return;
        }
        for &block in cfg.return_blocks() {
            let Some(ret) = func.terminator(block) else {
                continue;
            };
            let mus = used
                .iter()
                .map(|&region| Self::add_mu(ssa, MuKind::Return { inst: ret }, region))
                .collect::<Vec<_>>();
            if !mus.is_empty() {
                ssa.return_mus.insert(ret, mus);
            }
        }
    }

    fn place_phis(
        &self,
        cfg: &FunctionCfg,
        ssa: &mut FunctionMemorySsa,
        def_blocks: &BTreeMap<RegionId, BTreeSet<BlockId>>,
    ) {
        for (&region, blocks) in def_blocks {
            let reachable = blocks.iter().copied().filter(|&b| cfg.is_reachable(b));
            for block in cfg.iterated_dominance_frontier(reachable) {
                if !cfg.is_reachable(block) {
                    continue;
                }
                let event = ssa.push_event(MemoryEvent::Phi(Phi {
                    region,
                    block,
                    var: VarId(0),
                    ops: BTreeMap::new(),
                    preds: Vec::new(),
                }));
                let var = ssa.new_var(Some(region), 0, Some(block), event);
                if let MemoryEvent::Phi(phi) = ssa.event_mut(event) {
                    phi.var = var;
                }
                ssa.block_phis.entry(block).or_default().push(event);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Renaming
    // ═══════════════════════════════════════════════════════════════════

    fn rename(&self, func: &Function, cfg: &FunctionCfg, ssa: &mut FunctionMemorySsa) {
        let mut counter: HashMap<RegionId, u32> = HashMap::new();
        let mut stacks: HashMap<RegionId, Vec<VarId>> = HashMap::new();

        let entry_chis: Vec<EventId> = ssa.entry_chis.values().copied().collect();
        for event in entry_chis {
            if let MemoryEvent::Chi(chi) = ssa.event(event) {
                let (region, var) = (chi.region, chi.var);
                if let Some(region) = region {
                    stacks.entry(region).or_default().push(var);
                    counter.insert(region, 1);
                }
            }
        }

        let mut work = vec![Visit::Enter(func.entry())];
        while let Some(step) = work.pop() {
            match step {
                Visit::Leave(pushed) => {
                    for region in pushed {
                        if let Some(stack) = stacks.get_mut(&region) {
                            stack.pop();
                        }
                    }
                }
                Visit::Enter(block) => {
                    let pushed = self.rename_block(func, cfg, block, ssa, &mut counter, &mut stacks);
                    work.push(Visit::Leave(pushed));
                    for &child in cfg.dom_children(block).iter().rev() {
                        work.push(Visit::Enter(child));
                    }
                }
            }
        }
    }

    /// Rename one block; returns the regions whose stacks grew
    fn rename_block(
        &self,
        func: &Function,
        cfg: &FunctionCfg,
        block: BlockId,
        ssa: &mut FunctionMemorySsa,
        counter: &mut HashMap<RegionId, u32>,
        stacks: &mut HashMap<RegionId, Vec<VarId>>,
    ) -> Vec<RegionId> {
        let mut pushed = Vec::new();

        let phis = ssa.block_phis.get(&block).cloned().unwrap_or_default();
        for event in phis {
            pushed.extend(Self::define(ssa, event, counter, stacks));
        }

        for &inst in &func.block(block).insts {
            match self.module.opcode(inst) {
                Some(Opcode::Load { .. }) => {
                    let mus = ssa.load_mus.get(&inst).cloned().unwrap_or_default();
                    Self::use_top(ssa, &mus, stacks);
                }
                Some(Opcode::Store { .. }) => {
                    let chis = ssa.store_chis.get(&inst).cloned().unwrap_or_default();
                    for event in chis {
                        pushed.extend(Self::define(ssa, event, counter, stacks));
                    }
                }
                Some(Opcode::Call { .. }) => {
                    let mus = ssa.call_mus.get(&inst).cloned().unwrap_or_default();
                    Self::use_top(ssa, &mus, stacks);
                    let chis = ssa.call_chis.get(&inst).cloned().unwrap_or_default();
                    for event in chis {
                        pushed.extend(Self::define(ssa, event, counter, stacks));
                    }
                }
                Some(Opcode::Ret { .. }) => {
                    let mus = ssa.return_mus.get(&inst).cloned().unwrap_or_default();
                    Self::use_top(ssa, &mus, stacks);
                }
                _ => {}
            }
        }

        let mut seen = BTreeSet::new();
        for &succ in cfg.succs(block) {
            if !seen.insert(succ) {
                continue;
            }
            let Some(which_pred) = cfg.preds(succ).iter().position(|&p| p == block) else {
                continue;
            };
            let phis = ssa.block_phis.get(&succ).cloned().unwrap_or_default();
            for event in phis {
                if let MemoryEvent::Phi(phi) = ssa.event_mut(event) {
                    if let Some(&top) = stacks.get(&phi.region).and_then(|s| s.last()) {
                        phi.ops.insert(which_pred, top);
                    }
                }
            }
        }

        pushed
    }

    /// Give a Chi or Phi the next version of its region
    fn define(
        ssa: &mut FunctionMemorySsa,
        event: EventId,
        counter: &mut HashMap<RegionId, u32>,
        stacks: &mut HashMap<RegionId, Vec<VarId>>,
    ) -> Option<RegionId> {
        let (region, var) = match ssa.event(event) {
            MemoryEvent::Chi(chi) => (chi.region?, chi.var),
            MemoryEvent::Phi(phi) => (phi.region, phi.var),
            MemoryEvent::Mu(_) => return None,
        };

        let stack = stacks.entry(region).or_default();
        let previous = stack.last().copied();
        let next = counter.entry(region).or_insert(0);
        let version = *next;
        *next += 1;
        stack.push(var);

        if let MemoryEvent::Chi(chi) = ssa.event_mut(event) {
            chi.op_var = previous;
        }
        ssa.vars[var.index()].version = version;
        Some(region)
    }

    fn use_top(ssa: &mut FunctionMemorySsa, mus: &[EventId], stacks: &HashMap<RegionId, Vec<VarId>>) {
        for &event in mus {
            if let MemoryEvent::Mu(mu) = ssa.event_mut(event) {
                mu.var = stacks.get(&mu.region).and_then(|s| s.last()).copied();
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Gating predicates
    // ═══════════════════════════════════════════════════════════════════

    /// Branch conditions of the PDF+ of a block, in discovery order
    fn gating_conditions(&self, func: &Function, cfg: &FunctionCfg, block: BlockId, out: &mut Vec<ValueId>) {
        for frontier in cfg.iterated_post_dominance_frontier(block) {
            let cond = func
                .terminator(frontier)
                .and_then(|t| self.module.opcode(t))
                .and_then(Opcode::branch_condition);
            if let Some(cond) = cond {
                if !out.contains(&cond) {
                    out.push(cond);
                }
            }
        }
    }

    fn compute_phi_predicates(&self, func: &Function, cfg: &FunctionCfg, ssa: &mut FunctionMemorySsa) {
        let phi_events: Vec<EventId> = ssa.block_phis.values().flatten().copied().collect();
        for event in phi_events {
            let Some(phi) = ssa.event(event).as_phi() else {
                continue;
            };
            let mut preds = Vec::new();
            for var in phi.ops.values() {
                if let Some(block) = ssa.var(*var).block {
                    self.gating_conditions(func, cfg, block, &mut preds);
                }
            }
            if let MemoryEvent::Phi(phi) = ssa.event_mut(event) {
                phi.preds = preds;
            }
        }

        for inst in func.instructions() {
            let Some(Opcode::Phi { incoming }) = self.module.opcode(inst) else {
                continue;
            };
            let mut preds = Vec::new();
            for inc in incoming {
                self.gating_conditions(func, cfg, inc.block, &mut preds);
            }
            if !preds.is_empty() {
                ssa.ir_phi_preds.insert(inst, preds);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // External call summaries
    // ═══════════════════════════════════════════════════════════════════

    fn build_ext_summaries(&self, func: &Function, ssa: &mut FunctionMemorySsa) {
        for inst in func.instructions() {
            if !matches!(self.module.opcode(inst), Some(Opcode::Call { .. })) {
                continue;
            }
            for &callee in self.call_graph.callees_of_site(inst) {
                let callee_fn = self.module.function(callee);
                if !callee_fn.is_declaration() {
                    continue;
                }

                let mut summary = ExtCallSummary::default();
                for (arg, &param) in callee_fn.params.iter().enumerate() {
                    if !self.module.is_pointer(param) {
                        continue;
                    }
                    let entry = Self::add_chi(
                        ssa,
                        ChiKind::ArgEntry { call: inst, callee, arg },
                        None,
                        None,
                        0,
                    );
                    let exit = Self::add_chi(
                        ssa,
                        ChiKind::ArgExit { call: inst, callee, arg },
                        None,
                        None,
                        1,
                    );
                    let entry_var = Self::link_summary(ssa, entry, exit);
                    summary.arg_entry.insert(arg, entry_var);
                    summary.arg_exit.insert(arg, Self::chi_var(ssa, exit));
                }

                if callee_fn.is_vararg {
                    let entry = Self::add_chi(
                        ssa,
                        ChiKind::VarArgEntry { call: inst, callee },
                        None,
                        None,
                        0,
                    );
                    let exit = Self::add_chi(
                        ssa,
                        ChiKind::VarArgExit { call: inst, callee },
                        None,
                        None,
                        1,
                    );
                    summary.vararg_entry = Some(Self::link_summary(ssa, entry, exit));
                    summary.vararg_exit = Some(Self::chi_var(ssa, exit));
                }

                if callee_fn.ret_ty.is_pointer() {
                    let ret = Self::add_chi(
                        ssa,
                        ChiKind::RetSummary { call: inst, callee },
                        None,
                        None,
                        0,
                    );
                    summary.ret = Some(Self::chi_var(ssa, ret));
                }

                ssa.ext_sites.insert((inst, callee), summary);
            }
        }
    }

    /// The exit version overwrites the entry version
    fn link_summary(ssa: &mut FunctionMemorySsa, entry: EventId, exit: EventId) -> VarId {
        let entry_var = Self::chi_var(ssa, entry);
        if let MemoryEvent::Chi(chi) = ssa.event_mut(exit) {
            chi.op_var = Some(entry_var);
        }
        entry_var
    }

    fn chi_var(ssa: &FunctionMemorySsa, event: EventId) -> VarId {
        match ssa.event(event) {
            MemoryEvent::Chi(chi) => chi.var,
            other => panic!("event {:?} is not a Chi", other),
        }
    }
}
