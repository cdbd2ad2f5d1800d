//! Programmatic construction of modules
//!
//! Used by the test suite, the benches and by front ends that lower into
//! this IR without going through JSON.
//!
//! ```text
//! let mut mb = ModuleBuilder::new("ring");
//! let rank_fn = mb.declare("MPI_Comm_rank", &[Type::Int, Type::Ptr], Type::Int);
//! let main = mb.define("main", &[], Type::Int);
//! let mut fb = mb.body(main);
//! let rank = fb.alloca("rank");
//! ...
//! let module = mb.finish();
//! ```

use super::module::{Block, Function, Linkage, Module};
use super::types::{BlockId, DebugLoc, FuncId, Type, ValueId};
use super::value::{CastOp, ConstOp, Instruction, Opcode, PhiIncoming, Value, ValueKind};
use rustc_hash::FxHashMap;

/// Incremental module builder with uniqued integer constants
pub struct ModuleBuilder {
    module: Module,
    source_file: String,
    ints: FxHashMap<i64, ValueId>,
    null: Option<ValueId>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let source_file = format!("{}.c", name);
        Self {
            module: Module {
                name,
                ..Default::default()
            },
            source_file,
            ints: FxHashMap::default(),
            null: None,
        }
    }

    /// File name used by [`FunctionBuilder::at_line`]
    pub fn source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = file.into();
        self
    }

    fn push_value(
        &mut self,
        name: Option<String>,
        ty: Type,
        kind: ValueKind,
        loc: Option<DebugLoc>,
    ) -> ValueId {
        let id = ValueId::new(self.module.values.len());
        self.module.values.push(Value {
            id,
            name,
            ty,
            kind,
            loc,
        });
        id
    }

    pub fn const_int(&mut self, value: i64) -> ValueId {
        if let Some(&id) = self.ints.get(&value) {
            return id;
        }
        let id = self.push_value(None, Type::Int, ValueKind::ConstInt { value }, None);
        self.ints.insert(value, id);
        id
    }

    pub fn null(&mut self) -> ValueId {
        if let Some(id) = self.null {
            return id;
        }
        let id = self.push_value(None, Type::Ptr, ValueKind::Null, None);
        self.null = Some(id);
        id
    }

    pub fn undef(&mut self, ty: Type) -> ValueId {
        self.push_value(None, ty, ValueKind::Undef, None)
    }

    pub fn const_expr(&mut self, op: ConstOp, operands: &[ValueId], ty: Type) -> ValueId {
        self.push_value(
            None,
            ty,
            ValueKind::ConstExpr {
                op,
                operands: operands.to_vec(),
            },
            None,
        )
    }

    /// Global variable; its value is the address of the storage
    pub fn global(&mut self, name: &str, initializer: Option<ValueId>) -> ValueId {
        let id = self.push_value(
            Some(name.to_string()),
            Type::Ptr,
            ValueKind::Global { initializer },
            None,
        );
        self.module.globals.push(id);
        id
    }

    fn add_function(&mut self, name: &str, params: &[Type], ret_ty: Type, is_vararg: bool) -> FuncId {
        let func = FuncId::new(self.module.functions.len());
        let value = self.push_value(
            Some(name.to_string()),
            Type::Ptr,
            ValueKind::Function { func },
            None,
        );
        let params = params
            .iter()
            .enumerate()
            .map(|(index, &ty)| {
                self.push_value(
                    Some(format!("{}.arg{}", name, index)),
                    ty,
                    ValueKind::Argument {
                        func,
                        index: index as u32,
                    },
                    None,
                )
            })
            .collect();
        self.module.functions.push(Function {
            id: func,
            name: name.to_string(),
            value,
            params,
            ret_ty,
            is_vararg,
            linkage: Linkage::External,
            blocks: Vec::new(),
        });
        func
    }

    /// External function without a body
    pub fn declare(&mut self, name: &str, params: &[Type], ret_ty: Type) -> FuncId {
        self.add_function(name, params, ret_ty, false)
    }

    pub fn declare_vararg(&mut self, name: &str, params: &[Type], ret_ty: Type) -> FuncId {
        self.add_function(name, params, ret_ty, true)
    }

    /// Function whose body is filled through [`ModuleBuilder::body`]
    pub fn define(&mut self, name: &str, params: &[Type], ret_ty: Type) -> FuncId {
        self.add_function(name, params, ret_ty, false)
    }

    pub fn define_vararg(&mut self, name: &str, params: &[Type], ret_ty: Type) -> FuncId {
        self.add_function(name, params, ret_ty, true)
    }

    pub fn set_linkage(&mut self, func: FuncId, linkage: Linkage) {
        self.module.functions[func.index()].linkage = linkage;
    }

    pub fn function_value(&self, func: FuncId) -> ValueId {
        self.module.functions[func.index()].value
    }

    pub fn param(&self, func: FuncId, index: usize) -> ValueId {
        self.module.functions[func.index()].params[index]
    }

    /// Rename a value
    pub fn name(&mut self, value: ValueId, name: &str) {
        self.module.values[value.index()].name = Some(name.to_string());
    }

    pub fn body(&mut self, func: FuncId) -> FunctionBuilder<'_> {
        FunctionBuilder::new(self, func)
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

/// Appends instructions to one function; an entry block is created on demand
pub struct FunctionBuilder<'a> {
    mb: &'a mut ModuleBuilder,
    func: FuncId,
    current: BlockId,
    loc: Option<DebugLoc>,
}

impl<'a> FunctionBuilder<'a> {
    fn new(mb: &'a mut ModuleBuilder, func: FuncId) -> Self {
        let blocks = &mut mb.module.functions[func.index()].blocks;
        if blocks.is_empty() {
            blocks.push(Block {
                id: BlockId(0),
                name: "entry".to_string(),
                insts: Vec::new(),
            });
        }
        let current = BlockId::new(blocks.len() - 1);
        Self {
            mb,
            func,
            current,
            loc: None,
        }
    }

    pub fn func(&self) -> FuncId {
        self.func
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// New empty block; the insertion point does not move
    pub fn block(&mut self, name: &str) -> BlockId {
        let blocks = &mut self.mb.module.functions[self.func.index()].blocks;
        let id = BlockId::new(blocks.len());
        blocks.push(Block {
            id,
            name: name.to_string(),
            insts: Vec::new(),
        });
        id
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Location attached to the following instructions
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.loc = Some(DebugLoc::new(self.mb.source_file.clone(), line));
        self
    }

    pub fn at(&mut self, file: &str, line: u32) -> &mut Self {
        self.loc = Some(DebugLoc::new(file, line));
        self
    }

    pub fn param(&self, index: usize) -> ValueId {
        self.mb.param(self.func, index)
    }

    pub fn const_int(&mut self, value: i64) -> ValueId {
        self.mb.const_int(value)
    }

    pub fn null(&mut self) -> ValueId {
        self.mb.null()
    }

    pub fn name(&mut self, value: ValueId, name: &str) {
        self.mb.name(value, name);
    }

    fn emit(&mut self, ty: Type, op: Opcode) -> ValueId {
        let kind = ValueKind::Instruction(Instruction {
            func: self.func,
            block: self.current,
            op,
        });
        let loc = self.loc.clone();
        let id = self.mb.push_value(None, ty, kind, loc);
        self.mb.module.functions[self.func.index()].blocks[self.current.index()]
            .insts
            .push(id);
        id
    }

    pub fn alloca(&mut self, name: &str) -> ValueId {
        let id = self.emit(Type::Ptr, Opcode::Alloca);
        self.mb.name(id, name);
        id
    }

    pub fn load(&mut self, ty: Type, ptr: ValueId) -> ValueId {
        self.emit(ty, Opcode::Load { ptr })
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) -> ValueId {
        self.emit(Type::Void, Opcode::Store { value, ptr })
    }

    pub fn gep(&mut self, base: ValueId, indices: &[ValueId]) -> ValueId {
        self.emit(
            Type::Ptr,
            Opcode::Gep {
                base,
                indices: indices.to_vec(),
            },
        )
    }

    pub fn cast(&mut self, cast: CastOp, operand: ValueId, ty: Type) -> ValueId {
        self.emit(ty, Opcode::Cast { cast, operand })
    }

    pub fn phi(&mut self, ty: Type, incoming: &[(ValueId, BlockId)]) -> ValueId {
        let incoming = incoming
            .iter()
            .map(|&(value, block)| PhiIncoming { value, block })
            .collect();
        self.emit(ty, Opcode::Phi { incoming })
    }

    /// Extra incoming edge for a phi created before its operand existed
    pub fn add_incoming(&mut self, phi: ValueId, value: ValueId, block: BlockId) {
        if let ValueKind::Instruction(Instruction {
            op: Opcode::Phi { incoming },
            ..
        }) = &mut self.mb.module.values[phi.index()].kind
        {
            incoming.push(PhiIncoming { value, block });
        }
    }

    pub fn select(&mut self, ty: Type, cond: ValueId, on_true: ValueId, on_false: ValueId) -> ValueId {
        self.emit(
            ty,
            Opcode::Select {
                cond,
                on_true,
                on_false,
            },
        )
    }

    pub fn binary(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(Type::Int, Opcode::Binary { lhs, rhs })
    }

    pub fn cmp(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(Type::Int, Opcode::Cmp { lhs, rhs })
    }

    pub fn extract_value(&mut self, ty: Type, aggregate: ValueId) -> ValueId {
        self.emit(ty, Opcode::ExtractValue { aggregate })
    }

    pub fn insert_value(&mut self, aggregate: ValueId, element: ValueId) -> ValueId {
        self.emit(Type::Aggregate, Opcode::InsertValue { aggregate, element })
    }

    /// Direct call; the result type is the callee's return type
    pub fn call(&mut self, callee: FuncId, args: &[ValueId]) -> ValueId {
        let function = &self.mb.module.functions[callee.index()];
        let (callee_value, ty) = (function.value, function.ret_ty);
        self.emit(
            ty,
            Opcode::Call {
                callee: callee_value,
                args: args.to_vec(),
            },
        )
    }

    /// Call through a function pointer
    pub fn call_indirect(&mut self, callee: ValueId, args: &[ValueId], ret_ty: Type) -> ValueId {
        self.emit(
            ret_ty,
            Opcode::Call {
                callee,
                args: args.to_vec(),
            },
        )
    }

    pub fn va_arg(&mut self, ty: Type, list: ValueId) -> ValueId {
        self.emit(ty, Opcode::VaArg { list })
    }

    pub fn br(&mut self, target: BlockId) -> ValueId {
        self.emit(Type::Void, Opcode::Br { target })
    }

    pub fn cond_br(&mut self, cond: ValueId, on_true: BlockId, on_false: BlockId) -> ValueId {
        self.emit(
            Type::Void,
            Opcode::CondBr {
                cond,
                on_true,
                on_false,
            },
        )
    }

    pub fn switch(&mut self, cond: ValueId, default: BlockId, cases: &[BlockId]) -> ValueId {
        self.emit(
            Type::Void,
            Opcode::Switch {
                cond,
                default,
                cases: cases.to_vec(),
            },
        )
    }

    pub fn ret(&mut self, value: Option<ValueId>) -> ValueId {
        self.emit(Type::Void, Opcode::Ret { value })
    }

    pub fn unreachable(&mut self) -> ValueId {
        self.emit(Type::Void, Opcode::Unreachable)
    }
}
