//! Memory SSA events and versioned region variables
//!
//! Events live in a per-function arena and are addressed by [`EventId`];
//! every event defines or reads one [`MssaVar`], addressed by [`VarId`] in
//! the same function. A globally unique handle is `(FuncId, VarId)`.

use crate::features::memory_region::RegionId;
use crate::ir::{BlockId, FuncId, ValueId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(VarId, "v");
arena_id!(EventId, "e");

/// What a Chi stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChiKind {
    /// Incoming state of a region at function entry
    Entry,
    Store { inst: ValueId },
    /// A defined callee may write the region
    Call { inst: ValueId, callee: FuncId },
    /// An external callee may write through pointer argument `arg`
    ExtCall { inst: ValueId, callee: FuncId, arg: usize },
    /// Region reachable from an external callee's pointer result
    ExtRet { inst: ValueId, callee: FuncId },
    ArgEntry { call: ValueId, callee: FuncId, arg: usize },
    ArgExit { call: ValueId, callee: FuncId, arg: usize },
    VarArgEntry { call: ValueId, callee: FuncId },
    VarArgExit { call: ValueId, callee: FuncId },
    /// Pointer result of an external callee
    RetSummary { call: ValueId, callee: FuncId },
}

impl ChiKind {
    /// Artificial per-call-site summary of an external callee
    #[inline]
    pub fn is_summary(self) -> bool {
        matches!(
            self,
            ChiKind::ArgEntry { .. }
                | ChiKind::ArgExit { .. }
                | ChiKind::VarArgEntry { .. }
                | ChiKind::VarArgExit { .. }
                | ChiKind::RetSummary { .. }
        )
    }

    /// Instruction or call site the Chi is attached to
    pub fn inst(self) -> Option<ValueId> {
        match self {
            ChiKind::Entry => None,
            ChiKind::Store { inst }
            | ChiKind::Call { inst, .. }
            | ChiKind::ExtCall { inst, .. }
            | ChiKind::ExtRet { inst, .. } => Some(inst),
            ChiKind::ArgEntry { call, .. }
            | ChiKind::ArgExit { call, .. }
            | ChiKind::VarArgEntry { call, .. }
            | ChiKind::VarArgExit { call, .. }
            | ChiKind::RetSummary { call, .. } => Some(call),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChiKind::Entry => "entry-chi",
            ChiKind::Store { .. } => "store-chi",
            ChiKind::Call { .. } => "call-chi",
            ChiKind::ExtCall { .. } => "ext-call-chi",
            ChiKind::ExtRet { .. } => "ext-ret-chi",
            ChiKind::ArgEntry { .. } => "arg-entry",
            ChiKind::ArgExit { .. } => "arg-exit",
            ChiKind::VarArgEntry { .. } => "vararg-entry",
            ChiKind::VarArgExit { .. } => "vararg-exit",
            ChiKind::RetSummary { .. } => "ret-summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MuKind {
    Load { inst: ValueId },
    Call { inst: ValueId, callee: FuncId },
    ExtCall { inst: ValueId, callee: FuncId, arg: usize },
    /// Outgoing state of a region at a `ret`
    Return { inst: ValueId },
}

impl MuKind {
    /// Instruction the Mu is attached to
    #[inline]
    pub fn inst(self) -> ValueId {
        match self {
            MuKind::Load { inst }
            | MuKind::Call { inst, .. }
            | MuKind::ExtCall { inst, .. }
            | MuKind::Return { inst } => inst,
        }
    }
}

/// May-definition of a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chi {
    pub kind: ChiKind,
    /// `None` for external call summaries, which are per argument
    pub region: Option<RegionId>,
    pub var: VarId,
    /// Version this Chi overwrites
    pub op_var: Option<VarId>,
}

/// May-use of a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mu {
    pub kind: MuKind,
    pub region: RegionId,
    /// Reaching version, `None` in unreachable code
    pub var: Option<VarId>,
}

/// Merge of region versions at a join block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phi {
    pub region: RegionId,
    pub block: BlockId,
    pub var: VarId,
    /// Operand per predecessor index of `block`
    pub ops: BTreeMap<usize, VarId>,
    /// Branch conditions gating the choice of operand
    pub preds: Vec<ValueId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MemoryEvent {
    Chi(Chi),
    Mu(Mu),
    Phi(Phi),
}

impl MemoryEvent {
    #[inline]
    pub fn as_chi(&self) -> Option<&Chi> {
        match self {
            MemoryEvent::Chi(chi) => Some(chi),
            _ => None,
        }
    }

    #[inline]
    pub fn as_mu(&self) -> Option<&Mu> {
        match self {
            MemoryEvent::Mu(mu) => Some(mu),
            _ => None,
        }
    }

    #[inline]
    pub fn as_phi(&self) -> Option<&Phi> {
        match self {
            MemoryEvent::Phi(phi) => Some(phi),
            _ => None,
        }
    }

    /// Variable the event defines; Mus define nothing
    pub fn defined_var(&self) -> Option<VarId> {
        match self {
            MemoryEvent::Chi(chi) => Some(chi.var),
            MemoryEvent::Phi(phi) => Some(phi.var),
            MemoryEvent::Mu(_) => None,
        }
    }
}

/// One version of one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MssaVar {
    pub region: Option<RegionId>,
    pub version: u32,
    /// Block of the defining event; `None` for call-site summaries
    pub block: Option<BlockId>,
    pub def: EventId,
}

impl MssaVar {
    /// Short printable form such as `R2_3` or `ret-summary_0`
    pub fn label(&self, kind: &str) -> String {
        match self.region {
            Some(region) => format!("{}_{}", region, self.version),
            None => format!("{}_{}", kind, self.version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_kinds() {
        let call = ValueId(3);
        let callee = FuncId(1);
        assert!(ChiKind::ArgExit { call, callee, arg: 0 }.is_summary());
        assert!(ChiKind::RetSummary { call, callee }.is_summary());
        assert!(!ChiKind::Entry.is_summary());
        assert!(!ChiKind::ExtCall { inst: call, callee, arg: 1 }.is_summary());
    }

    #[test]
    fn test_event_accessors() {
        let chi = MemoryEvent::Chi(Chi {
            kind: ChiKind::Entry,
            region: Some(RegionId(2)),
            var: VarId(0),
            op_var: None,
        });
        let mu = MemoryEvent::Mu(Mu {
            kind: MuKind::Load { inst: ValueId(9) },
            region: RegionId(2),
            var: Some(VarId(0)),
        });
        assert_eq!(chi.defined_var(), Some(VarId(0)));
        assert!(chi.as_chi().is_some());
        assert_eq!(mu.defined_var(), None);
        assert_eq!(mu.as_mu().map(|m| m.kind.inst()), Some(ValueId(9)));
    }

    #[test]
    fn test_var_label() {
        let var = MssaVar {
            region: Some(RegionId(4)),
            version: 2,
            block: Some(BlockId(1)),
            def: EventId(7),
        };
        assert_eq!(var.label("store-chi"), "R4_2");
        let summary = MssaVar {
            region: None,
            version: 1,
            block: None,
            def: EventId(8),
        };
        assert_eq!(summary.label("arg-exit"), "arg-exit_1");
    }
}
