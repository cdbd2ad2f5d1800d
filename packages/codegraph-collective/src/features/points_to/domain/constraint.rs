//! Points-to constraints
//!
//! Four constraint kinds following Andersen's formulation:
//! - ADDR_OF: dst = &src  → pts(dst) ⊇ {src}
//! - COPY:    dst = src   → pts(dst) ⊇ pts(src)
//! - LOAD:    dst = *src  → ∀o ∈ pts(src): pts(dst) ⊇ pts(o)
//! - STORE:   *dst = src  → ∀o ∈ pts(dst): pts(o) ⊇ pts(src)

use super::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    AddrOf,
    Copy,
    Load,
    Store,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::AddrOf => "ADDR_OF",
            ConstraintKind::Copy => "COPY",
            ConstraintKind::Load => "LOAD",
            ConstraintKind::Store => "STORE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub dst: NodeId,
    pub src: NodeId,
}

impl Constraint {
    #[inline]
    pub fn addr_of(dst: NodeId, obj: NodeId) -> Self {
        Self {
            kind: ConstraintKind::AddrOf,
            dst,
            src: obj,
        }
    }

    #[inline]
    pub fn copy(dst: NodeId, src: NodeId) -> Self {
        Self {
            kind: ConstraintKind::Copy,
            dst,
            src,
        }
    }

    #[inline]
    pub fn load(dst: NodeId, src: NodeId) -> Self {
        Self {
            kind: ConstraintKind::Load,
            dst,
            src,
        }
    }

    #[inline]
    pub fn store(dst: NodeId, src: NodeId) -> Self {
        Self {
            kind: ConstraintKind::Store,
            dst,
            src,
        }
    }

    #[inline]
    pub fn is_complex(&self) -> bool {
        matches!(self.kind, ConstraintKind::Load | ConstraintKind::Store)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConstraintKind::AddrOf => write!(f, "{} = &{}", self.dst, self.src),
            ConstraintKind::Copy => write!(f, "{} = {}", self.dst, self.src),
            ConstraintKind::Load => write!(f, "{} = *{}", self.dst, self.src),
            ConstraintKind::Store => write!(f, "*{} = {}", self.dst, self.src),
        }
    }
}

/// Constraint list with per-kind counts
#[derive(Debug, Default, Clone)]
pub struct ConstraintSet {
    pub constraints: Vec<Constraint>,
    pub addr_of_count: usize,
    pub copy_count: usize,
    pub load_count: usize,
    pub store_count: usize,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, constraint: Constraint) {
        match constraint.kind {
            ConstraintKind::AddrOf => self.addr_of_count += 1,
            ConstraintKind::Copy => self.copy_count += 1,
            ConstraintKind::Load => self.load_count += 1,
            ConstraintKind::Store => self.store_count += 1,
        }
        self.constraints.push(constraint);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn copies(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::Copy)
    }
}
