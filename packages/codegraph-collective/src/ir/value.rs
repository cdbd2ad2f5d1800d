//! Values and instructions
//!
//! Every operand in the IR is a [`ValueId`] into the module value table:
//! arguments, globals, functions, constants and instructions share one
//! id space so the analyses can key their tables by a single handle.

use super::types::{BlockId, DebugLoc, FuncId, Type, ValueId};
use serde::{Deserialize, Serialize};

/// One entry of the module value table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub id: ValueId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ty: Type,
    #[serde(flatten)]
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<DebugLoc>,
}

impl Value {
    #[inline]
    pub fn as_instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::ConstInt { .. }
                | ValueKind::Null
                | ValueKind::Undef
                | ValueKind::ConstExpr { .. }
        )
    }

    /// Printable name, falling back to the numeric id
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueKind {
    Argument { func: FuncId, index: u32 },
    Global { initializer: Option<ValueId> },
    Function { func: FuncId },
    ConstInt { value: i64 },
    Null,
    Undef,
    ConstExpr { op: ConstOp, operands: Vec<ValueId> },
    Instruction(Instruction),
}

/// Operators of pointer constant expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstOp {
    Gep,
    BitCast,
    IntToPtr,
    PtrToInt,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastOp {
    BitCast,
    IntToPtr,
    PtrToInt,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhiIncoming {
    pub value: ValueId,
    pub block: BlockId,
}

/// An instruction placed in a block of a defined function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub func: FuncId,
    pub block: BlockId,
    pub op: Opcode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "opcode", rename_all = "snake_case")]
pub enum Opcode {
    Alloca,
    Load {
        ptr: ValueId,
    },
    Store {
        value: ValueId,
        ptr: ValueId,
    },
    Gep {
        base: ValueId,
        #[serde(default)]
        indices: Vec<ValueId>,
    },
    Cast {
        cast: CastOp,
        operand: ValueId,
    },
    Phi {
        incoming: Vec<PhiIncoming>,
    },
    Select {
        cond: ValueId,
        on_true: ValueId,
        on_false: ValueId,
    },
    Binary {
        lhs: ValueId,
        rhs: ValueId,
    },
    Cmp {
        lhs: ValueId,
        rhs: ValueId,
    },
    ExtractValue {
        aggregate: ValueId,
    },
    InsertValue {
        aggregate: ValueId,
        element: ValueId,
    },
    Call {
        callee: ValueId,
        #[serde(default)]
        args: Vec<ValueId>,
    },
    VaArg {
        list: ValueId,
    },
    Br {
        target: BlockId,
    },
    CondBr {
        cond: ValueId,
        on_true: BlockId,
        on_false: BlockId,
    },
    Switch {
        cond: ValueId,
        default: BlockId,
        #[serde(default)]
        cases: Vec<BlockId>,
    },
    Ret {
        #[serde(default)]
        value: Option<ValueId>,
    },
    Unreachable,
}

impl Opcode {
    /// Data operands in a stable order. The callee of a call comes first.
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Opcode::Alloca | Opcode::Br { .. } | Opcode::Unreachable => Vec::new(),
            Opcode::Load { ptr } => vec![*ptr],
            Opcode::Store { value, ptr } => vec![*value, *ptr],
            Opcode::Gep { base, indices } => {
                let mut ops = vec![*base];
                ops.extend(indices.iter().copied());
                ops
            }
            Opcode::Cast { operand, .. } => vec![*operand],
            Opcode::Phi { incoming } => incoming.iter().map(|inc| inc.value).collect(),
            Opcode::Select {
                cond,
                on_true,
                on_false,
            } => vec![*cond, *on_true, *on_false],
            Opcode::Binary { lhs, rhs } | Opcode::Cmp { lhs, rhs } => vec![*lhs, *rhs],
            Opcode::ExtractValue { aggregate } => vec![*aggregate],
            Opcode::InsertValue { aggregate, element } => vec![*aggregate, *element],
            Opcode::Call { callee, args } => {
                let mut ops = vec![*callee];
                ops.extend(args.iter().copied());
                ops
            }
            Opcode::VaArg { list } => vec![*list],
            Opcode::CondBr { cond, .. } | Opcode::Switch { cond, .. } => vec![*cond],
            Opcode::Ret { value } => value.iter().copied().collect(),
        }
    }

    /// Successor blocks, in terminator order, possibly repeated
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Opcode::Br { target } => vec![*target],
            Opcode::CondBr {
                on_true, on_false, ..
            } => vec![*on_true, *on_false],
            Opcode::Switch { default, cases, .. } => {
                let mut succs = vec![*default];
                succs.extend(cases.iter().copied());
                succs
            }
            _ => Vec::new(),
        }
    }

    /// Condition of a conditional branch or switch
    #[inline]
    pub fn branch_condition(&self) -> Option<ValueId> {
        match self {
            Opcode::CondBr { cond, .. } | Opcode::Switch { cond, .. } => Some(*cond),
            _ => None,
        }
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Br { .. }
                | Opcode::CondBr { .. }
                | Opcode::Switch { .. }
                | Opcode::Ret { .. }
                | Opcode::Unreachable
        )
    }

    #[inline]
    pub fn is_call(&self) -> bool {
        matches!(self, Opcode::Call { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::Alloca => "alloca",
            Opcode::Load { .. } => "load",
            Opcode::Store { .. } => "store",
            Opcode::Gep { .. } => "getelementptr",
            Opcode::Cast { .. } => "cast",
            Opcode::Phi { .. } => "phi",
            Opcode::Select { .. } => "select",
            Opcode::Binary { .. } => "binop",
            Opcode::Cmp { .. } => "cmp",
            Opcode::ExtractValue { .. } => "extractvalue",
            Opcode::InsertValue { .. } => "insertvalue",
            Opcode::Call { .. } => "call",
            Opcode::VaArg { .. } => "va_arg",
            Opcode::Br { .. } => "br",
            Opcode::CondBr { .. } => "br",
            Opcode::Switch { .. } => "switch",
            Opcode::Ret { .. } => "ret",
            Opcode::Unreachable => "unreachable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_operands_start_with_callee() {
        let op = Opcode::Call {
            callee: ValueId(4),
            args: vec![ValueId(1), ValueId(2)],
        };
        assert_eq!(op.operands(), vec![ValueId(4), ValueId(1), ValueId(2)]);
        assert!(!op.is_terminator());
    }

    #[test]
    fn test_switch_successors_and_condition() {
        let op = Opcode::Switch {
            cond: ValueId(9),
            default: BlockId(1),
            cases: vec![BlockId(2), BlockId(1)],
        };
        assert_eq!(op.successors(), vec![BlockId(1), BlockId(2), BlockId(1)]);
        assert_eq!(op.branch_condition(), Some(ValueId(9)));
        assert!(op.is_terminator());
    }

    #[test]
    fn test_instruction_json_shape() {
        let value = Value {
            id: ValueId(5),
            name: Some("x".to_string()),
            ty: Type::Int,
            kind: ValueKind::Instruction(Instruction {
                func: FuncId(0),
                block: BlockId(0),
                op: Opcode::Load { ptr: ValueId(3) },
            }),
            loc: Some(DebugLoc::new("a.c", 3)),
        };

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["kind"], "instruction");
        assert_eq!(json["op"]["opcode"], "load");
        assert_eq!(json["op"]["ptr"], 3);

        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_constant_detection() {
        let null = Value {
            id: ValueId(0),
            name: None,
            ty: Type::Ptr,
            kind: ValueKind::Null,
            loc: None,
        };
        assert!(null.is_constant());
        assert_eq!(null.display_name(), "%0");
    }
}
