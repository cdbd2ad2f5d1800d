//! Collective sequences per block and communicator
//!
//! Walking backwards from the return blocks, each block gets, for every
//! communicator, the sequence of collectives executed on it from the
//! block's start to function exit. A block whose successors disagree on a
//! communicator's sequence is not-all-the-same (NAVS) for that
//! communicator: only NAVS blocks can make participants call different
//! collectives on it. Callees are summarized first (bottom-up over
//! call-graph SCCs) and their per-communicator sequences are spliced in at
//! the call, with communicators passed as parameters bound to the actuals.

use crate::features::call_graph::CallGraph;
use crate::features::collectives::CollectiveRegistry;
use crate::ir::{BlockId, FuncId, Function, Module, ModuleCfg, ValueId, ValueKind};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Communicator a collective synchronizes on; `None` for collectives
/// without one (OpenMP barriers) or calls missing the argument
pub type Communicator = Option<ValueId>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sequence {
    Known(Vec<String>),
    Navs,
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::Known(Vec::new())
    }
}

impl Sequence {
    fn prepend(&mut self, names: &[String]) {
        if let Sequence::Known(seq) = self {
            seq.splice(0..0, names.iter().cloned());
        }
    }
}

type BlockSequences = BTreeMap<Communicator, Sequence>;

const NAVS: &str = "NAVS";

#[derive(Debug, Clone, Default)]
pub struct CollectiveSequences {
    blocks: FxHashMap<(FuncId, BlockId), BlockSequences>,
    summaries: FxHashMap<FuncId, BTreeMap<Communicator, Vec<String>>>,
}

impl CollectiveSequences {
    pub fn build(
        module: &Module,
        cfgs: &ModuleCfg,
        call_graph: &CallGraph,
        registry: &CollectiveRegistry,
    ) -> Self {
        let mut seqs = Self::default();
        for scc in call_graph.sccs_bottom_up() {
            for &func in scc {
                let f = module.function(func);
                if f.is_declaration() {
                    continue;
                }
                seqs.walk_function(module, cfgs, call_graph, registry, f);
            }
        }
        seqs
    }

    /// The block's successors lead to different collective sequences on `comm`
    pub fn is_navs(&self, func: FuncId, block: BlockId, comm: Communicator) -> bool {
        self.blocks
            .get(&(func, block))
            .and_then(|seqs| seqs.get(&comm))
            .map_or(false, |seq| *seq == Sequence::Navs)
    }

    /// The block is NAVS for some communicator
    pub fn is_navs_on_any(&self, func: FuncId, block: BlockId) -> bool {
        self.blocks
            .get(&(func, block))
            .map_or(false, |seqs| seqs.values().any(|seq| *seq == Sequence::Navs))
    }

    /// Collectives `func` executes on `comm` from entry to exit
    ///
    /// A single `"NAVS"` entry means the sequence depends on the path.
    pub fn summary(&self, func: FuncId, comm: Communicator) -> &[String] {
        self.summaries
            .get(&func)
            .and_then(|s| s.get(&comm))
            .map_or(&[], Vec::as_slice)
    }

    /// Communicators `func` runs collectives on, in its own terms
    pub fn communicators(&self, func: FuncId) -> impl Iterator<Item = Communicator> + '_ {
        self.summaries
            .get(&func)
            .into_iter()
            .flat_map(|s| s.keys().copied())
    }

    fn walk_function(
        &mut self,
        module: &Module,
        cfgs: &ModuleCfg,
        call_graph: &CallGraph,
        registry: &CollectiveRegistry,
        func: &Function,
    ) {
        let Some(cfg) = cfgs.get(func.id) else {
            return;
        };
        let mut visited = vec![false; func.blocks.len()];
        let mut queue = VecDeque::new();

        for &ret in cfg.return_blocks() {
            let seqs = self.prepend_block(module, call_graph, registry, func, ret, BlockSequences::new());
            self.blocks.insert((func.id, ret), seqs);
            visited[ret.index()] = true;
            queue.push_back(ret);
        }

        while let Some(header) = queue.pop_front() {
            let header_seqs = self
                .blocks
                .get(&(func.id, header))
                .cloned()
                .unwrap_or_default();
            for &pred in cfg.preds(header) {
                let seqs = self.prepend_block(module, call_graph, registry, func, pred, header_seqs.clone());
                if !visited[pred.index()] {
                    visited[pred.index()] = true;
                    self.blocks.insert((func.id, pred), seqs);
                    queue.push_back(pred);
                } else {
                    let old = self.blocks.entry((func.id, pred)).or_default();
                    merge(old, seqs);
                }
            }
        }

        let summary = self
            .blocks
            .get(&(func.id, func.entry()))
            .map(|seqs| {
                seqs.iter()
                    .map(|(&comm, seq)| {
                        let names = match seq {
                            Sequence::Known(names) => names.clone(),
                            Sequence::Navs => vec![NAVS.to_string()],
                        };
                        (comm, names)
                    })
                    .filter(|(_, names)| !names.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        self.summaries.insert(func.id, summary);
    }

    /// Collectives of `block` followed by `tail`, per communicator
    fn prepend_block(
        &self,
        module: &Module,
        call_graph: &CallGraph,
        registry: &CollectiveRegistry,
        func: &Function,
        block: BlockId,
        mut tail: BlockSequences,
    ) -> BlockSequences {
        for &inst in func.block(block).insts.iter().rev() {
            let is_call = module.opcode(inst).map_or(false, |op| op.is_call());
            if !is_call {
                continue;
            }
            let args = module.call_args(inst);
            for &callee in call_graph.callees_of_site(inst) {
                if let Some(summary) = self.summaries.get(&callee) {
                    for (&comm, names) in summary {
                        let comm = bind_communicator(module, callee, args, comm);
                        tail.entry(comm).or_default().prepend(names);
                    }
                }
                let name = &module.function(callee).name;
                if let Some(collective) = registry.collective(name) {
                    let comm = collective.comm_arg.and_then(|i| args.get(i).copied());
                    tail.entry(comm).or_default().prepend(std::slice::from_ref(name));
                }
            }
        }
        tail
    }
}

/// Replace a callee parameter by the actual passed at the call
fn bind_communicator(module: &Module, callee: FuncId, args: &[ValueId], comm: Communicator) -> Communicator {
    let value = comm?;
    match &module.value(value).kind {
        ValueKind::Argument { func, index } if *func == callee => {
            args.get(*index as usize).copied().or(Some(value))
        }
        _ => Some(value),
    }
}

/// A block reached again from another successor: any communicator whose
/// sequence differs becomes NAVS
fn merge(old: &mut BlockSequences, new: BlockSequences) {
    let empty = Sequence::default();
    let comms: BTreeSet<Communicator> = old.keys().chain(new.keys()).copied().collect();
    for comm in comms {
        let next = new.get(&comm).unwrap_or(&empty);
        let prev = old.entry(comm).or_default();
        if prev != next {
            *prev = Sequence::Navs;
        }
    }
}
