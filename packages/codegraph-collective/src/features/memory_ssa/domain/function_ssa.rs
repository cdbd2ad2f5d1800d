//! Memory SSA of one defined function

use super::event::{Chi, EventId, MemoryEvent, MssaVar, Mu, Phi, VarId};
use crate::features::memory_region::RegionId;
use crate::ir::{BlockId, FuncId, ValueId};
use std::collections::{BTreeMap, BTreeSet};

/// Summary variables created for one call to an external function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtCallSummary {
    pub arg_entry: BTreeMap<usize, VarId>,
    pub arg_exit: BTreeMap<usize, VarId>,
    pub vararg_entry: Option<VarId>,
    pub vararg_exit: Option<VarId>,
    pub ret: Option<VarId>,
}

impl ExtCallSummary {
    /// Entry variable receiving actual argument `arg`
    pub fn entry_for(&self, arg: usize) -> Option<VarId> {
        self.arg_entry.get(&arg).copied().or(self.vararg_entry)
    }

    /// Exit variable feeding the caller's Chi for actual argument `arg`
    pub fn exit_for(&self, arg: usize) -> Option<VarId> {
        self.arg_exit.get(&arg).copied().or(self.vararg_exit)
    }

    pub fn inputs(&self) -> impl Iterator<Item = VarId> + '_ {
        self.arg_entry.values().copied().chain(self.vararg_entry)
    }

    pub fn outputs(&self) -> impl Iterator<Item = VarId> + '_ {
        self.arg_exit
            .values()
            .copied()
            .chain(self.vararg_exit)
            .chain(self.ret)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionMemorySsa {
    pub(crate) func: FuncId,
    pub(crate) events: Vec<MemoryEvent>,
    pub(crate) vars: Vec<MssaVar>,
    pub(crate) used_regions: BTreeSet<RegionId>,
    pub(crate) load_mus: BTreeMap<ValueId, Vec<EventId>>,
    pub(crate) store_chis: BTreeMap<ValueId, Vec<EventId>>,
    /// Mus of calls, defined and external callees alike
    pub(crate) call_mus: BTreeMap<ValueId, Vec<EventId>>,
    /// Chis of calls, ext-return Chis last
    pub(crate) call_chis: BTreeMap<ValueId, Vec<EventId>>,
    pub(crate) entry_chis: BTreeMap<RegionId, EventId>,
    pub(crate) return_mus: BTreeMap<ValueId, Vec<EventId>>,
    pub(crate) block_phis: BTreeMap<BlockId, Vec<EventId>>,
    pub(crate) ext_sites: BTreeMap<(ValueId, FuncId), ExtCallSummary>,
    pub(crate) ir_phi_preds: BTreeMap<ValueId, Vec<ValueId>>,
}

impl FunctionMemorySsa {
    pub(crate) fn new(func: FuncId) -> Self {
        Self {
            func,
            events: Vec::new(),
            vars: Vec::new(),
            used_regions: BTreeSet::new(),
            load_mus: BTreeMap::new(),
            store_chis: BTreeMap::new(),
            call_mus: BTreeMap::new(),
            call_chis: BTreeMap::new(),
            entry_chis: BTreeMap::new(),
            return_mus: BTreeMap::new(),
            block_phis: BTreeMap::new(),
            ext_sites: BTreeMap::new(),
            ir_phi_preds: BTreeMap::new(),
        }
    }

    /// Append an event whose variable is filled in later
    pub(crate) fn push_event(&mut self, event: MemoryEvent) -> EventId {
        let id = EventId(self.events.len() as u32);
        self.events.push(event);
        id
    }

    pub(crate) fn new_var(
        &mut self,
        region: Option<RegionId>,
        version: u32,
        block: Option<BlockId>,
        def: EventId,
    ) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(MssaVar {
            region,
            version,
            block,
            def,
        });
        id
    }

    #[inline]
    pub fn func(&self) -> FuncId {
        self.func
    }

    #[inline]
    pub fn event(&self, id: EventId) -> &MemoryEvent {
        &self.events[id.index()]
    }

    #[inline]
    pub(crate) fn event_mut(&mut self, id: EventId) -> &mut MemoryEvent {
        &mut self.events[id.index()]
    }

    pub fn events(&self) -> impl Iterator<Item = (EventId, &MemoryEvent)> + '_ {
        self.events
            .iter()
            .enumerate()
            .map(|(i, e)| (EventId(i as u32), e))
    }

    #[inline]
    pub fn var(&self, id: VarId) -> &MssaVar {
        &self.vars[id.index()]
    }

    pub fn vars(&self) -> impl Iterator<Item = (VarId, &MssaVar)> + '_ {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, v)| (VarId(i as u32), v))
    }

    #[inline]
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Printable name of a variable
    pub fn var_label(&self, id: VarId) -> String {
        let var = self.var(id);
        let kind = match self.event(var.def) {
            MemoryEvent::Chi(chi) => chi.kind.as_str(),
            MemoryEvent::Phi(_) => "phi",
            MemoryEvent::Mu(_) => "mu",
        };
        var.label(kind)
    }

    pub fn used_regions(&self) -> &BTreeSet<RegionId> {
        &self.used_regions
    }

    fn resolve<'a, T: 'a>(
        &'a self,
        ids: Option<&'a Vec<EventId>>,
        pick: fn(&MemoryEvent) -> Option<&T>,
    ) -> impl Iterator<Item = &'a T> + 'a {
        ids.into_iter()
            .flatten()
            .filter_map(move |&id| pick(&self.events[id.index()]))
    }

    pub fn load_mus(&self, load: ValueId) -> impl Iterator<Item = &Mu> + '_ {
        self.resolve(self.load_mus.get(&load), MemoryEvent::as_mu)
    }

    pub fn store_chis(&self, store: ValueId) -> impl Iterator<Item = &Chi> + '_ {
        self.resolve(self.store_chis.get(&store), MemoryEvent::as_chi)
    }

    pub fn call_mus(&self, call: ValueId) -> impl Iterator<Item = &Mu> + '_ {
        self.resolve(self.call_mus.get(&call), MemoryEvent::as_mu)
    }

    pub fn call_chis(&self, call: ValueId) -> impl Iterator<Item = &Chi> + '_ {
        self.resolve(self.call_chis.get(&call), MemoryEvent::as_chi)
    }

    pub fn return_mus(&self, ret: ValueId) -> impl Iterator<Item = &Mu> + '_ {
        self.resolve(self.return_mus.get(&ret), MemoryEvent::as_mu)
    }

    /// Return Mus of every `ret` of the function
    pub fn all_return_mus(&self) -> impl Iterator<Item = &Mu> + '_ {
        self.return_mus
            .values()
            .flatten()
            .filter_map(|&id| self.events[id.index()].as_mu())
    }

    pub fn entry_chi(&self, region: RegionId) -> Option<&Chi> {
        self.entry_chis
            .get(&region)
            .and_then(|&id| self.events[id.index()].as_chi())
    }

    pub fn entry_chis(&self) -> impl Iterator<Item = &Chi> + '_ {
        self.entry_chis
            .values()
            .filter_map(|&id| self.events[id.index()].as_chi())
    }

    pub fn block_phis(&self, block: BlockId) -> impl Iterator<Item = &Phi> + '_ {
        self.resolve(self.block_phis.get(&block), MemoryEvent::as_phi)
    }

    pub fn phis(&self) -> impl Iterator<Item = &Phi> + '_ {
        self.events.iter().filter_map(MemoryEvent::as_phi)
    }

    pub fn ext_summary(&self, call: ValueId, callee: FuncId) -> Option<&ExtCallSummary> {
        self.ext_sites.get(&(call, callee))
    }

    pub fn ext_summaries(&self) -> impl Iterator<Item = (ValueId, FuncId, &ExtCallSummary)> + '_ {
        self.ext_sites
            .iter()
            .map(|(&(call, callee), summary)| (call, callee, summary))
    }

    /// Gating conditions of an IR phi
    pub fn ir_phi_predicates(&self, phi: ValueId) -> &[ValueId] {
        self.ir_phi_preds.get(&phi).map_or(&[], Vec::as_slice)
    }

    pub fn chi_count(&self) -> usize {
        self.events.iter().filter(|e| e.as_chi().is_some()).count()
    }

    pub fn mu_count(&self) -> usize {
        self.events.iter().filter(|e| e.as_mu().is_some()).count()
    }

    pub fn phi_count(&self) -> usize {
        self.events.iter().filter(|e| e.as_phi().is_some()).count()
    }

    /// Summary Chis are not attached to a block
    pub fn is_summary_var(&self, id: VarId) -> bool {
        matches!(
            self.event(self.var(id).def),
            MemoryEvent::Chi(Chi { kind, .. }) if kind.is_summary()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_fallback_to_vararg() {
        let mut summary = ExtCallSummary::default();
        summary.arg_entry.insert(0, VarId(0));
        summary.arg_exit.insert(0, VarId(1));
        summary.vararg_entry = Some(VarId(2));
        summary.vararg_exit = Some(VarId(3));
        summary.ret = Some(VarId(4));

        assert_eq!(summary.entry_for(0), Some(VarId(0)));
        assert_eq!(summary.entry_for(5), Some(VarId(2)));
        assert_eq!(summary.exit_for(3), Some(VarId(3)));
        assert_eq!(summary.inputs().collect::<Vec<_>>(), vec![VarId(0), VarId(2)]);
        assert_eq!(
            summary.outputs().collect::<Vec<_>>(),
            vec![VarId(1), VarId(3), VarId(4)]
        );
    }

    #[test]
    fn test_new_function_ssa_is_empty() {
        let ssa = FunctionMemorySsa::new(FuncId(3));
        assert_eq!(ssa.func(), FuncId(3));
        assert_eq!(ssa.var_count(), 0);
        assert_eq!(ssa.chi_count() + ssa.mu_count() + ssa.phi_count(), 0);
        assert!(ssa.used_regions().is_empty());
        assert!(ssa.ir_phi_predicates(ValueId(0)).is_empty());
    }
}
