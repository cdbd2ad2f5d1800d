//! Test data builders
//!
//! Declarations of the runtime functions fixtures call, and shortcuts for
//! running the pipeline.

use codegraph_collective::ir::{FuncId, ModuleBuilder, Type};
use codegraph_collective::{analyze, AnalysisConfig, AnalysisReport, CollectiveRegistry, Module};

/// MPI entry points used by the fixtures
#[derive(Debug, Clone, Copy)]
pub struct Mpi {
    pub comm_rank: FuncId,
    pub barrier: FuncId,
    pub bcast: FuncId,
    pub allreduce: FuncId,
}

impl Mpi {
    pub fn declare(mb: &mut ModuleBuilder) -> Self {
        Self {
            comm_rank: mb.declare("MPI_Comm_rank", &[Type::Int, Type::Ptr], Type::Int),
            barrier: mb.declare("MPI_Barrier", &[Type::Int], Type::Int),
            bcast: mb.declare(
                "MPI_Bcast",
                &[Type::Ptr, Type::Int, Type::Int, Type::Int, Type::Int],
                Type::Int,
            ),
            allreduce: mb.declare(
                "MPI_Allreduce",
                &[Type::Ptr, Type::Ptr, Type::Int, Type::Int, Type::Int, Type::Int],
                Type::Int,
            ),
        }
    }
}

/// OpenMP entry points used by the fixtures
#[derive(Debug, Clone, Copy)]
pub struct OpenMp {
    pub thread_num: FuncId,
    pub barrier: FuncId,
}

impl OpenMp {
    pub fn declare(mb: &mut ModuleBuilder) -> Self {
        Self {
            thread_num: mb.declare("omp_get_thread_num", &[], Type::Int),
            barrier: mb.declare("__kmpc_barrier", &[Type::Ptr, Type::Int], Type::Void),
        }
    }
}

/// Analyze with the default configuration and the full registry
pub fn run(module: &Module) -> AnalysisReport {
    run_with(module, &AnalysisConfig::default())
}

pub fn run_with(module: &Module, config: &AnalysisConfig) -> AnalysisReport {
    analyze(module, config, &config.registry()).expect("fixture analysis failed")
}

pub fn run_with_registry(module: &Module, registry: &CollectiveRegistry) -> AnalysisReport {
    analyze(module, &AnalysisConfig::default(), registry).expect("fixture analysis failed")
}
