/*
 * Dependency graph construction
 *
 * Intra-procedural edges follow def-use over IR values and memory SSA
 * variables. Call sites connect caller and callee:
 *
 *   rule 1  actual argument      -> formal parameter
 *   rule 2  callee return value  -> call result
 *   rule 3  call Mu              -> callee EntryChi (ext: ArgEntry / VarArg entry)
 *   rule 4  Chi op_var           -> call Chi
 *   rule 5  callee ReturnMu      -> call Chi (ext: ArgExit / VarArg exit)
 *
 * External callees are summarized per call site (memcpy, memset, or every
 * input to every output).
 */

use super::graph::{DepNode, DependencyGraph};
use crate::config::DepGraphConfig;
use crate::features::call_graph::CallGraph;
use crate::features::collectives::{is_memcpy_like, is_memset_like, CollectiveRegistry};
use crate::features::memory_ssa::{
    ChiKind, ExtCallSummary, FunctionMemorySsa, MemorySsa, MuKind,
};
use crate::ir::{BlockId, ConstOp, FuncId, Function, FunctionCfg, Module, ModuleCfg, Opcode, ValueId, ValueKind};
use petgraph::stable_graph::NodeIndex;
use std::time::Instant;
use tracing::{debug, info};

struct GraphBuilder<'a> {
    module: &'a Module,
    cfgs: &'a ModuleCfg,
    mssa: &'a MemorySsa,
    call_graph: &'a CallGraph,
    registry: &'a CollectiveRegistry,
    config: &'a DepGraphConfig,
    graph: DependencyGraph,
}

impl DependencyGraph {
    pub fn build(
        module: &Module,
        cfgs: &ModuleCfg,
        mssa: &MemorySsa,
        call_graph: &CallGraph,
        registry: &CollectiveRegistry,
        config: &DepGraphConfig,
    ) -> Self {
        let start = Instant::now();
        let mut builder = GraphBuilder {
            module,
            cfgs,
            mssa,
            call_graph,
            registry,
            config,
            graph: DependencyGraph::default(),
        };

        for func in module.defined_functions() {
            let (Some(ssa), Some(cfg)) = (mssa.function(func.id), cfgs.get(func.id)) else {
                continue;
            };
            builder.build_function(func, ssa, cfg);
        }

        let mut graph = builder.graph;
        graph.stats.build_ms = start.elapsed().as_secs_f64() * 1000.0;
        graph.refresh_counts();
        debug!(
            nodes = graph.stats.nodes,
            edges = graph.stats.edges,
            "dependency graph edges collected"
        );

        if config.phi_elimination {
            graph.eliminate_phis(mssa);
        }

        info!(
            nodes = graph.stats.nodes,
            edges = graph.stats.edges,
            sources = graph.stats.sources,
            resets = graph.stats.resets,
            phis_eliminated = graph.stats.phis_eliminated,
            "dependency graph built"
        );
        graph
    }
}

impl<'a> GraphBuilder<'a> {
    fn owner(&self, node: DepNode) -> Option<FuncId> {
        match node {
            DepNode::Var(func, _) => Some(func),
            DepNode::Value(value) => match &self.module.value(value).kind {
                ValueKind::Argument { func, .. } => Some(*func),
                ValueKind::Instruction(inst) => Some(inst.func),
                _ => None,
            },
        }
    }

    fn node(&mut self, node: DepNode) -> NodeIndex {
        let owner = self.owner(node);
        self.graph.insert_node(node, owner)
    }

    fn edge(&mut self, from: DepNode, to: DepNode) {
        let from = self.node(from);
        let to = self.node(to);
        self.graph.insert_edge(from, to);
    }

    fn build_function(&mut self, func: &Function, ssa: &FunctionMemorySsa, cfg: &FunctionCfg) {
        let module = self.module;
        let f = func.id;
        let var = |v| DepNode::Var(f, v);

        for chi in ssa.entry_chis() {
            self.node(var(chi.var));
        }

        for phi in ssa.phis() {
            self.node(var(phi.var));
            for &op in phi.ops.values() {
                self.edge(var(op), var(phi.var));
            }
            if !self.config.no_phi_predicates {
                for &pred in &phi.preds {
                    self.edge(DepNode::Value(pred), var(phi.var));
                }
            }
        }

        for block in &func.blocks {
            for &inst in &block.insts {
                let Some(op) = module.opcode(inst) else {
                    continue;
                };
                self.node(DepNode::Value(inst));
                match op {
                    Opcode::Cmp { .. }
                    | Opcode::Gep { .. }
                    | Opcode::Cast { .. }
                    | Opcode::Select { .. }
                    | Opcode::Binary { .. }
                    | Opcode::ExtractValue { .. }
                    | Opcode::InsertValue { .. }
                    | Opcode::VaArg { .. } => {
                        for operand in op.operands() {
                            self.edge(DepNode::Value(operand), DepNode::Value(inst));
                        }
                    }
                    Opcode::Phi { incoming } => {
                        for inc in incoming {
                            self.edge(DepNode::Value(inc.value), DepNode::Value(inst));
                        }
                        if !self.config.no_phi_predicates {
                            for &pred in ssa.ir_phi_predicates(inst) {
                                self.edge(DepNode::Value(pred), DepNode::Value(inst));
                            }
                        }
                    }
                    Opcode::Load { ptr } => self.visit_load(f, ssa, inst, *ptr),
                    Opcode::Store { value, ptr } => {
                        for chi in ssa.store_chis(inst) {
                            self.edge(DepNode::Value(*value), var(chi.var));
                            if !self.config.strong_update {
                                if let Some(op_var) = chi.op_var {
                                    self.edge(var(op_var), var(chi.var));
                                }
                            }
                            if !self.config.no_ptr_dep {
                                self.edge(DepNode::Value(*ptr), var(chi.var));
                            }
                        }
                    }
                    Opcode::Call { args, .. } => {
                        self.visit_call(f, ssa, inst, args);
                        let conditions = self.gating_conditions(func, cfg, block.id);
                        if !conditions.is_empty() {
                            self.graph.call_conditions.insert(inst, conditions);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn visit_load(&mut self, f: FuncId, ssa: &FunctionMemorySsa, inst: ValueId, ptr: ValueId) {
        let mut mu_vars = Vec::new();
        for mu in ssa.load_mus(inst) {
            if let Some(v) = mu.var {
                self.edge(DepNode::Var(f, v), DepNode::Value(inst));
                mu_vars.push(v);
            }
        }
        if !self.config.no_ptr_dep {
            self.edge(DepNode::Value(ptr), DepNode::Value(inst));
        }

        let is_source = global_name(self.module, ptr)
            .map_or(false, |name| self.registry.is_load_source(name));
        if is_source {
            if mu_vars.is_empty() {
                self.graph.sources.insert(DepNode::Value(inst));
            }
            for v in mu_vars {
                self.graph.sources.insert(DepNode::Var(f, v));
            }
        }
    }

    fn visit_call(&mut self, f: FuncId, ssa: &FunctionMemorySsa, inst: ValueId, args: &[ValueId]) {
        let (module, call_graph) = (self.module, self.call_graph);
        for &callee in call_graph.callees_of_site(inst) {
            let callee_fn = module.function(callee);
            if self.registry.is_ret_source(&callee_fn.name) {
                self.graph.sources.insert(DepNode::Value(inst));
            }

            if callee_fn.is_declaration() {
                if let Some(summary) = ssa.ext_summary(inst, callee) {
                    self.connect_external(f, ssa, inst, args, callee, summary);
                }
            } else {
                self.connect_defined(f, ssa, inst, args, callee);
            }
        }
    }

    fn connect_defined(
        &mut self,
        f: FuncId,
        ssa: &FunctionMemorySsa,
        inst: ValueId,
        args: &[ValueId],
        callee: FuncId,
    ) {
        let module = self.module;
        let callee_fn = module.function(callee);

        // rule 1
        for (&actual, &formal) in args.iter().zip(&callee_fn.params) {
            self.edge(DepNode::Value(actual), DepNode::Value(formal));
        }

        // rule 2
        if !module.value(inst).ty.is_void() {
            for ret in callee_fn.instructions() {
                if let Some(Opcode::Ret { value: Some(v) }) = module.opcode(ret) {
                    self.edge(DepNode::Value(*v), DepNode::Value(inst));
                }
            }
        }

        let mssa = self.mssa;
        let Some(callee_ssa) = mssa.function(callee) else {
            return;
        };

        // rule 3
        for mu in ssa.call_mus(inst) {
            if !matches!(mu.kind, MuKind::Call { callee: c, .. } if c == callee) {
                continue;
            }
            if let (Some(v), Some(entry)) = (mu.var, callee_ssa.entry_chi(mu.region)) {
                self.edge(DepNode::Var(f, v), DepNode::Var(callee, entry.var));
            }
        }

        // rules 4 and 5
        for chi in ssa.call_chis(inst) {
            if !matches!(chi.kind, ChiKind::Call { callee: c, .. } if c == callee) {
                continue;
            }
            let target = DepNode::Var(f, chi.var);
            self.node(target);
            if let Some(op_var) = chi.op_var {
                self.edge(DepNode::Var(f, op_var), target);
            }
            for mu in callee_ssa.all_return_mus() {
                if Some(mu.region) != chi.region {
                    continue;
                }
                if let Some(v) = mu.var {
                    self.edge(DepNode::Var(callee, v), target);
                }
            }
        }
    }

    fn connect_external(
        &mut self,
        f: FuncId,
        ssa: &FunctionMemorySsa,
        inst: ValueId,
        args: &[ValueId],
        callee: FuncId,
        summary: &ExtCallSummary,
    ) {
        let module = self.module;
        let var = |v| DepNode::Var(f, v);
        let name = module.function(callee).name.as_str();

        for mu in ssa.call_mus(inst) {
            let MuKind::ExtCall { callee: c, arg, .. } = mu.kind else {
                continue;
            };
            if c != callee {
                continue;
            }
            if let (Some(v), Some(entry)) = (mu.var, summary.entry_for(arg)) {
                self.edge(var(v), var(entry));
            }
        }

        for chi in ssa.call_chis(inst) {
            let exit = match chi.kind {
                ChiKind::ExtCall { callee: c, arg, .. } if c == callee => summary.exit_for(arg),
                ChiKind::ExtRet { callee: c, .. } if c == callee => summary.ret,
                _ => continue,
            };
            self.node(var(chi.var));
            if let Some(exit) = exit {
                self.edge(var(exit), var(chi.var));
            }
            if let Some(op_var) = chi.op_var {
                self.edge(var(op_var), var(chi.var));
            }
            if let ChiKind::ExtCall { arg, .. } = chi.kind {
                if self.registry.reset_args(name).contains(&arg) {
                    self.graph.resets.insert(var(chi.var));
                }
            }
        }

        for (arg, &exit) in &summary.arg_exit {
            if let Some(&entry) = summary.arg_entry.get(arg) {
                self.edge(var(entry), var(exit));
            }
        }
        if let (Some(entry), Some(exit)) = (summary.vararg_entry, summary.vararg_exit) {
            self.edge(var(entry), var(exit));
        }

        if is_memcpy_like(name) {
            if let (Some(&src), Some(&dst)) = (summary.arg_entry.get(&1), summary.arg_exit.get(&0)) {
                self.edge(var(src), var(dst));
                if let Some(ret) = summary.ret {
                    self.edge(var(dst), var(ret));
                }
            }
        } else if is_memset_like(name) {
            if let (Some(&value), Some(&dst)) = (args.get(1), summary.arg_exit.get(&0)) {
                self.edge(DepNode::Value(value), var(dst));
                if let Some(ret) = summary.ret {
                    self.edge(var(dst), var(ret));
                }
            }
        } else {
            let mut outputs: Vec<DepNode> = summary.outputs().map(var).collect();
            if !module.value(inst).ty.is_void() {
                outputs.push(DepNode::Value(inst));
            }
            let inputs: Vec<DepNode> = summary
                .inputs()
                .map(var)
                .chain(args.iter().map(|&a| DepNode::Value(a)))
                .collect();
            for &input in &inputs {
                for &output in &outputs {
                    self.edge(input, output);
                }
            }
        }

        for arg in self.registry.source_args(name) {
            if let Some(&exit) = summary.arg_exit.get(&arg) {
                self.node(var(exit));
                self.graph.sources.insert(var(exit));
            }
        }
    }

    /// Branch conditions of the PDF+ of `block`, in discovery order
    fn gating_conditions(&self, func: &Function, cfg: &FunctionCfg, block: BlockId) -> Vec<ValueId> {
        let mut out = Vec::new();
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
        out
    }
}

/// Name of the global a pointer designates, looking through constant casts
fn global_name(module: &Module, ptr: ValueId) -> Option<&str> {
    let value = module.value(ptr);
    match &value.kind {
        ValueKind::Global { .. } => value.name.as_deref(),
        ValueKind::ConstExpr {
            op: ConstOp::BitCast | ConstOp::Gep,
            operands,
        } => operands.first().and_then(|&base| global_name(module, base)),
        _ => None,
    }
}
