//! Module, function and block containers plus structural validation

use super::types::{BlockId, DebugLoc, FuncId, Type, ValueId};
use super::value::{ConstOp, Instruction, Opcode, Value, ValueKind};
use crate::errors::{CollectiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    #[default]
    External,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(default)]
    pub name: String,
    pub insts: Vec<ValueId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub id: FuncId,
    pub name: String,
    /// The function's own entry in the value table
    pub value: ValueId,
    #[serde(default)]
    pub params: Vec<ValueId>,
    pub ret_ty: Type,
    #[serde(default)]
    pub is_vararg: bool,
    #[serde(default)]
    pub linkage: Linkage,
    /// Empty for declarations; block 0 is the entry block
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Function {
    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline]
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// All instructions in block order
    pub fn instructions(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.blocks.iter().flat_map(|b| b.insts.iter().copied())
    }

    /// Last instruction of a block
    #[inline]
    pub fn terminator(&self, id: BlockId) -> Option<ValueId> {
        self.blocks.get(id.index()).and_then(|b| b.insts.last().copied())
    }
}

/// A whole program in analyzable form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub values: Vec<Value>,
    pub functions: Vec<Function>,
    #[serde(default)]
    pub globals: Vec<ValueId>,
}

impl Module {
    /// Decode a module from its JSON form and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let module: Module = serde_json::from_str(json)?;
        module.validate()?;
        Ok(module)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    #[inline]
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    #[inline]
    pub fn instruction(&self, id: ValueId) -> Option<&Instruction> {
        self.values.get(id.index()).and_then(Value::as_instruction)
    }

    #[inline]
    pub fn opcode(&self, id: ValueId) -> Option<&Opcode> {
        self.instruction(id).map(|inst| &inst.op)
    }

    #[inline]
    pub fn location(&self, id: ValueId) -> Option<&DebugLoc> {
        self.values.get(id.index()).and_then(|v| v.loc.as_ref())
    }

    pub fn display_name(&self, id: ValueId) -> String {
        self.values
            .get(id.index())
            .map(Value::display_name)
            .unwrap_or_else(|| id.to_string())
    }

    /// Function a callee operand designates, looking through bitcasts
    pub fn function_of_value(&self, id: ValueId) -> Option<FuncId> {
        match &self.value(id).kind {
            ValueKind::Function { func } => Some(*func),
            ValueKind::ConstExpr {
                op: ConstOp::BitCast,
                operands,
            } => operands.first().and_then(|&op| self.function_of_value(op)),
            _ => None,
        }
    }

    /// Statically known callee of a call instruction
    pub fn called_function(&self, call: ValueId) -> Option<FuncId> {
        match self.opcode(call) {
            Some(Opcode::Call { callee, .. }) => self.function_of_value(*callee),
            _ => None,
        }
    }

    /// Arguments of a call instruction, empty for anything else
    pub fn call_args(&self, call: ValueId) -> &[ValueId] {
        match self.opcode(call) {
            Some(Opcode::Call { args, .. }) => args,
            _ => &[],
        }
    }

    /// Value is an `inttoptr` constant such as `MPI_IN_PLACE`
    pub fn is_int_to_ptr_constant(&self, id: ValueId) -> bool {
        matches!(
            self.value(id).kind,
            ValueKind::ConstExpr {
                op: ConstOp::IntToPtr,
                ..
            }
        )
    }

    #[inline]
    pub fn is_pointer(&self, id: ValueId) -> bool {
        self.value(id).ty.is_pointer()
    }

    /// Defined functions only
    pub fn defined_functions(&self) -> impl Iterator<Item = &Function> + '_ {
        self.functions.iter().filter(|f| !f.is_declaration())
    }

    /// Check ids, ownership and terminators before any analysis runs
    pub fn validate(&self) -> Result<()> {
        let value_count = self.values.len();
        let check_value = |id: ValueId, context: &dyn Fn() -> String| -> Result<()> {
            if id.index() >= value_count {
                return Err(CollectiveError::invalid_module(format!(
                    "dangling value {} in {}",
                    id,
                    context()
                )));
            }
            Ok(())
        };

        for (index, value) in self.values.iter().enumerate() {
            if value.id.index() != index {
                return Err(CollectiveError::invalid_module(format!(
                    "value at position {} has id {}",
                    index, value.id
                )));
            }
            match &value.kind {
                ValueKind::Argument { func, .. } | ValueKind::Function { func } => {
                    if func.index() >= self.functions.len() {
                        return Err(CollectiveError::invalid_module(format!(
                            "value {} refers to missing function {}",
                            value.id, func
                        )));
                    }
                }
                ValueKind::Global {
                    initializer: Some(init),
                } => check_value(*init, &|| format!("initializer of {}", value.id))?,
                ValueKind::ConstExpr { operands, .. } => {
                    for &op in operands {
                        check_value(op, &|| format!("constant expression {}", value.id))?;
                    }
                }
                ValueKind::Instruction(inst) => {
                    for op in inst.op.operands() {
                        check_value(op, &|| format!("operands of {}", value.id))?;
                    }
                    let Some(func) = self.functions.get(inst.func.index()) else {
                        return Err(CollectiveError::invalid_module(format!(
                            "instruction {} belongs to missing function {}",
                            value.id, inst.func
                        )));
                    };
                    let owned = func
                        .blocks
                        .get(inst.block.index())
                        .map(|b| b.insts.contains(&value.id))
                        .unwrap_or(false);
                    if !owned {
                        return Err(CollectiveError::invalid_module(format!(
                            "instruction {} is not listed in {}:{}",
                            value.id, func.name, inst.block
                        )));
                    }
                }
                _ => {}
            }
        }

        for &global in &self.globals {
            check_value(global, &|| "global list".to_string())?;
            if !matches!(self.value(global).kind, ValueKind::Global { .. }) {
                return Err(CollectiveError::invalid_module(format!(
                    "{} is listed as a global but is not one",
                    global
                )));
            }
        }

        for (index, func) in self.functions.iter().enumerate() {
            if func.id.index() != index {
                return Err(CollectiveError::invalid_module(format!(
                    "function at position {} has id {}",
                    index, func.id
                )));
            }
            check_value(func.value, &|| format!("function {}", func.name))?;
            if self.value(func.value).kind != (ValueKind::Function { func: func.id }) {
                return Err(CollectiveError::invalid_module(format!(
                    "function {} does not own value {}",
                    func.name, func.value
                )));
            }
            for (pos, &param) in func.params.iter().enumerate() {
                check_value(param, &|| format!("parameters of {}", func.name))?;
                match self.value(param).kind {
                    ValueKind::Argument { func: owner, index }
                        if owner == func.id && index as usize == pos => {}
                    _ => {
                        return Err(CollectiveError::invalid_module(format!(
                            "parameter {} of {} is not argument {}",
                            param, func.name, pos
                        )))
                    }
                }
            }
            self.validate_blocks(func)?;
        }

        Ok(())
    }

    fn validate_blocks(&self, func: &Function) -> Result<()> {
        for (index, block) in func.blocks.iter().enumerate() {
            if block.id.index() != index {
                return Err(CollectiveError::invalid_module(format!(
                    "block at position {} of {} has id {}",
                    index, func.name, block.id
                )));
            }
            let Some(&last) = block.insts.last() else {
                return Err(CollectiveError::invalid_module(format!(
                    "block {} of {} is empty",
                    block.id, func.name
                )));
            };
            for &inst_id in &block.insts {
                let inst = self.instruction(inst_id).ok_or_else(|| {
                    CollectiveError::invalid_module(format!(
                        "{} in {}:{} is not an instruction",
                        inst_id, func.name, block.id
                    ))
                })?;
                if inst.func != func.id || inst.block != block.id {
                    return Err(CollectiveError::invalid_module(format!(
                        "instruction {} is listed in {}:{} but owned by {}:{}",
                        inst_id, func.name, block.id, inst.func, inst.block
                    )));
                }
                let is_last = inst_id == last;
                if inst.op.is_terminator() != is_last {
                    return Err(CollectiveError::invalid_module(format!(
                        "block {} of {} has a misplaced or missing terminator",
                        block.id, func.name
                    )));
                }
                let in_range = |b: &BlockId| b.index() < func.blocks.len();
                if !inst.op.successors().iter().all(in_range) {
                    return Err(CollectiveError::invalid_module(format!(
                        "terminator {} of {} targets a missing block",
                        inst_id, func.name
                    )));
                }
                if let Opcode::Phi { incoming } = &inst.op {
                    if !incoming.iter().all(|inc| in_range(&inc.block)) {
                        return Err(CollectiveError::invalid_module(format!(
                            "phi {} of {} names a missing block",
                            inst_id, func.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
