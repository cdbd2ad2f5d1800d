//! Constraint generation
//!
//! One walk over the module produces the initial constraint set. Calls
//! whose callee is only known through a function pointer are recorded and
//! bound later, once the solver has a points-to set for the callee operand.

use crate::features::collectives::{ext_info, is_memcpy_like, is_memset_like};
use crate::features::points_to::domain::{Constraint, ConstraintSet, NodeFactory, NodeId};
use crate::ir::{CastOp, ConstOp, FuncId, Module, Opcode, ValueId, ValueKind};

/// Output of [`ConstraintCollector::collect`]
#[derive(Debug)]
pub struct CollectedConstraints {
    pub factory: NodeFactory,
    pub constraints: ConstraintSet,
    /// Direct call sites with their callee, in module order
    pub direct_calls: Vec<(ValueId, FuncId)>,
    /// Calls through a function pointer, in module order
    pub indirect_calls: Vec<ValueId>,
}

pub struct ConstraintCollector<'m> {
    module: &'m Module,
    factory: NodeFactory,
    constraints: ConstraintSet,
    direct_calls: Vec<(ValueId, FuncId)>,
    indirect_calls: Vec<ValueId>,
}

impl<'m> ConstraintCollector<'m> {
    pub fn collect(module: &'m Module) -> CollectedConstraints {
        let mut collector = Self {
            module,
            factory: NodeFactory::new(),
            constraints: ConstraintSet::new(),
            direct_calls: Vec::new(),
            indirect_calls: Vec::new(),
        };

        collector.create_nodes();
        collector.add_sentinel_constraints();
        collector.add_global_constraints();
        for func in module.defined_functions() {
            for inst in func.instructions() {
                collector.add_instruction_constraints(inst);
            }
        }

        tracing::debug!(
            nodes = collector.factory.len(),
            constraints = collector.constraints.len(),
            indirect_calls = collector.indirect_calls.len(),
            "points-to constraints collected"
        );

        CollectedConstraints {
            factory: collector.factory,
            constraints: collector.constraints,
            direct_calls: collector.direct_calls,
            indirect_calls: collector.indirect_calls,
        }
    }

    fn create_nodes(&mut self) {
        let module = self.module;
        for value in &module.values {
            match &value.kind {
                ValueKind::Global { .. } | ValueKind::Function { .. } => {
                    self.factory.create_value_node(value.id);
                    self.factory.create_object_node(value.id);
                }
                ValueKind::Argument { .. } | ValueKind::Instruction(_) if value.ty.is_pointer() => {
                    self.factory.create_value_node(value.id);
                }
                _ => {}
            }
        }

        for func in module.defined_functions() {
            if func.ret_ty.is_pointer() {
                self.factory.create_return_node(func.id);
            }
            if func.is_vararg {
                self.factory.create_vararg_node(func.id);
            }
        }

        // Constants resolve to the node of what they fold to
        for value in &module.values {
            if value.is_constant() && value.ty.is_pointer() {
                if let Some(node) = fold_constant(module, &self.factory, value.id) {
                    self.factory.alias_value(value.id, node);
                }
            }
        }
    }

    fn add_sentinel_constraints(&mut self) {
        self.constraints.add(Constraint::addr_of(
            NodeFactory::UNIVERSAL_PTR,
            NodeFactory::UNIVERSAL_OBJ,
        ));
        self.constraints.add(Constraint::copy(
            NodeFactory::UNIVERSAL_OBJ,
            NodeFactory::UNIVERSAL_PTR,
        ));
        self.constraints
            .add(Constraint::addr_of(NodeFactory::NULL_PTR, NodeFactory::NULL_OBJ));
    }

    fn add_global_constraints(&mut self) {
        let module = self.module;
        for value in &module.values {
            let initializer = match &value.kind {
                ValueKind::Global { initializer } => *initializer,
                ValueKind::Function { .. } => None,
                _ => continue,
            };
            let (Some(ptr), Some(obj)) = (
                self.factory.value_node(value.id),
                self.factory.object_node(value.id),
            ) else {
                continue;
            };
            self.constraints.add(Constraint::addr_of(ptr, obj));

            if let Some(init) = initializer.and_then(|i| self.factory.value_node(i)) {
                self.constraints.add(Constraint::copy(obj, init));
            }
        }
    }

    fn add_instruction_constraints(&mut self, inst: ValueId) {
        let module = self.module;
        let Some(instruction) = module.instruction(inst) else {
            return;
        };
        let result = self.factory.value_node(inst);

        match &instruction.op {
            Opcode::Alloca => {
                if let Some(ptr) = result {
                    let obj = self.factory.create_object_node(inst);
                    self.constraints.add(Constraint::addr_of(ptr, obj));
                }
            }
            Opcode::Load { ptr } => {
                if let (Some(dst), Some(src)) = (result, self.factory.value_node(*ptr)) {
                    self.constraints.add(Constraint::load(dst, src));
                }
            }
            Opcode::Store { value, ptr } => {
                if !module.is_pointer(*value) {
                    return;
                }
                if let (Some(dst), Some(src)) =
                    (self.factory.value_node(*ptr), self.factory.value_node(*value))
                {
                    self.constraints.add(Constraint::store(dst, src));
                }
            }
            Opcode::Gep { base, .. } => self.copy_from(result, *base),
            Opcode::Cast { cast, operand } => {
                if let Some(dst) = result {
                    match (cast, self.factory.value_node(*operand)) {
                        (CastOp::IntToPtr, _) | (_, None) => self
                            .constraints
                            .add(Constraint::copy(dst, NodeFactory::UNIVERSAL_PTR)),
                        (_, Some(src)) => self.constraints.add(Constraint::copy(dst, src)),
                    }
                }
            }
            Opcode::Phi { incoming } => {
                for inc in incoming {
                    self.copy_from(result, inc.value);
                }
            }
            Opcode::Select {
                on_true, on_false, ..
            } => {
                self.copy_from(result, *on_true);
                self.copy_from(result, *on_false);
            }
            Opcode::Binary { .. } | Opcode::Cmp { .. } | Opcode::ExtractValue { .. } => {
                if let Some(dst) = result {
                    self.constraints
                        .add(Constraint::copy(dst, NodeFactory::UNIVERSAL_PTR));
                }
            }
            Opcode::VaArg { .. } => {
                if let Some(dst) = result {
                    let src = self
                        .factory
                        .vararg_node(instruction.func)
                        .unwrap_or(NodeFactory::UNIVERSAL_PTR);
                    self.constraints.add(Constraint::copy(dst, src));
                }
            }
            Opcode::Ret { value: Some(value) } => {
                if let (Some(ret), Some(src)) = (
                    self.factory.return_node(instruction.func),
                    self.factory.value_node(*value),
                ) {
                    self.constraints.add(Constraint::copy(ret, src));
                }
            }
            Opcode::Call { callee, .. } => match module.function_of_value(*callee) {
                Some(func) => {
                    self.direct_calls.push((inst, func));
                    let mut out = Vec::new();
                    call_constraints(module, &mut self.factory, inst, func, &mut out);
                    for c in out {
                        self.constraints.add(c);
                    }
                }
                None => self.indirect_calls.push(inst),
            },
            _ => {}
        }
    }

    fn copy_from(&mut self, dst: Option<NodeId>, src: ValueId) {
        if let (Some(dst), Some(src)) = (dst, self.factory.value_node(src)) {
            self.constraints.add(Constraint::copy(dst, src));
        }
    }
}

/// Node a pointer constant folds to: null and undef to the null pointer,
/// a GEP to its base, a bitcast to its operand, integer casts to the
/// universal pointer
pub fn fold_constant(module: &Module, factory: &NodeFactory, value: ValueId) -> Option<NodeId> {
    match &module.value(value).kind {
        ValueKind::Null | ValueKind::Undef => Some(NodeFactory::NULL_PTR),
        ValueKind::ConstInt { .. } => Some(NodeFactory::UNIVERSAL_PTR),
        ValueKind::ConstExpr { op, operands } => match op {
            ConstOp::Gep | ConstOp::BitCast => operands
                .first()
                .and_then(|&base| fold_constant(module, factory, base)),
            ConstOp::IntToPtr | ConstOp::PtrToInt | ConstOp::Other => {
                Some(NodeFactory::UNIVERSAL_PTR)
            }
        },
        _ => factory.value_node(value),
    }
}

/// Constraints binding one call site to one callee
///
/// Defined callees get actual-to-formal, vararg and return copies.
/// External callees are modelled by their summary, or conservatively
/// when they have none.
pub fn call_constraints(
    module: &Module,
    factory: &mut NodeFactory,
    call: ValueId,
    callee: FuncId,
    out: &mut Vec<Constraint>,
) {
    let func = module.function(callee);
    let args = module.call_args(call);
    let result = factory.value_node(call);

    if !func.is_declaration() {
        for (i, &arg) in args.iter().enumerate() {
            let Some(actual) = factory.value_node(arg) else {
                continue;
            };
            if let Some(&param) = func.params.get(i) {
                if let Some(formal) = factory.value_node(param) {
                    out.push(Constraint::copy(formal, actual));
                }
            } else if let Some(vararg) = factory.vararg_node(callee) {
                out.push(Constraint::copy(vararg, actual));
            }
        }
        if let (Some(dst), Some(ret)) = (result, factory.return_node(callee)) {
            out.push(Constraint::copy(dst, ret));
        }
        return;
    }

    let name = func.name.as_str();
    let first = args.first().and_then(|&a| factory.value_node(a));
    let second = args.get(1).and_then(|&a| factory.value_node(a));

    if is_memcpy_like(name) {
        if let (Some(dst), Some(src)) = (first, second) {
            let tmp = factory.create_temp_node();
            out.push(Constraint::load(tmp, src));
            out.push(Constraint::store(dst, tmp));
            if let Some(res) = result {
                out.push(Constraint::copy(res, dst));
            }
        }
        return;
    }

    if is_memset_like(name) {
        if let (Some(res), Some(dst)) = (result, first) {
            out.push(Constraint::copy(res, dst));
        }
        return;
    }

    match ext_info(name) {
        Some(info) => {
            if let Some(res) = result {
                if info.ret_is_mod {
                    let obj = factory.create_object_node(call);
                    out.push(Constraint::addr_of(res, obj));
                } else {
                    out.push(Constraint::copy(res, NodeFactory::UNIVERSAL_PTR));
                }
            }
        }
        None => {
            for &arg in args {
                if !module.is_pointer(arg) || module.is_int_to_ptr_constant(arg) {
                    continue;
                }
                if let Some(ptr) = factory.value_node(arg) {
                    out.push(Constraint::store(ptr, NodeFactory::UNIVERSAL_PTR));
                }
            }
            if let Some(res) = result {
                out.push(Constraint::copy(res, NodeFactory::UNIVERSAL_PTR));
            }
        }
    }
}
