//! Collective registry
//!
//! The immutable table the analysis consults for everything paradigm
//! specific: which callees are collectives (and where their communicator
//! argument sits), which calls and globals yield a participant identity,
//! and which collective arguments are made uniform across participants.
//! Entries of inactive paradigms are invisible to every query.

use super::paradigm::Paradigm;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A function every participant must call in the same order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collective {
    pub name: String,
    pub paradigm: Paradigm,
    /// Position of the communicator argument, if the collective has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm_arg: Option<usize>,
}

/// A (function, argument position) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionArg {
    pub function: String,
    pub paradigm: Paradigm,
    pub arg: usize,
}

/// A function result or global whose value identifies the participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSource {
    pub name: String,
    pub paradigm: Paradigm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveRegistry {
    collectives: Vec<Collective>,
    /// Pointer arguments written with the participant identity
    arg_sources: Vec<FunctionArg>,
    /// Functions returning the participant identity
    ret_sources: Vec<NamedSource>,
    /// Globals holding the participant identity
    load_sources: Vec<NamedSource>,
    /// Arguments whose contents are identical on every participant afterwards
    reset_args: Vec<FunctionArg>,
    active: BTreeSet<Paradigm>,
}

const MPI_COLLECTIVES: &[(&str, Option<usize>)] = &[
    ("MPI_Barrier", Some(0)),
    ("MPI_Comm_split", Some(0)),
    ("MPI_Comm_create", Some(0)),
    ("MPI_Comm_dup", Some(0)),
    ("MPI_Comm_dup_with_info", Some(0)),
    ("MPI_Ibarrier", Some(0)),
    ("MPI_Bcast", Some(4)),
    ("MPI_Ibcast", Some(4)),
    ("MPI_Allreduce", Some(5)),
    ("MPI_Reduce_scatter", Some(5)),
    ("MPI_Reduce_scatter_block", Some(5)),
    ("MPI_Scan", Some(5)),
    ("MPI_Exscan", Some(5)),
    ("MPI_Iallreduce", Some(5)),
    ("MPI_Ireduce_scatter_block", Some(5)),
    ("MPI_Ireduce_scatter", Some(5)),
    ("MPI_Iscan", Some(5)),
    ("MPI_Iexscan", Some(5)),
    ("MPI_Reduce", Some(6)),
    ("MPI_Ireduce", Some(6)),
    ("MPI_Allgather", Some(6)),
    ("MPI_Alltoall", Some(6)),
    ("MPI_Iallgather", Some(6)),
    ("MPI_Ialltoall", Some(6)),
    ("MPI_Scatter", Some(7)),
    ("MPI_Gather", Some(7)),
    ("MPI_Igather", Some(7)),
    ("MPI_Allgatherv", Some(7)),
    ("MPI_Iscatter", Some(7)),
    ("MPI_Iallgatherv", Some(7)),
    ("MPI_Scatterv", Some(8)),
    ("MPI_Gatherv", Some(8)),
    ("MPI_Alltoallv", Some(8)),
    ("MPI_Alltoallw", Some(8)),
    ("MPI_Igatherv", Some(8)),
    ("MPI_Iscatterv", Some(8)),
    ("MPI_Ialltoallv", Some(8)),
    ("MPI_Ialltoallw", Some(8)),
    ("MPI_Finalize", None),
];

const OMP_COLLECTIVES: &[&str] = &["__kmpc_barrier"];

const UPC_COLLECTIVES: &[&str] = &[
    "_upcr_wait",
    "_upcr_all_broadcast",
    "_upcr_all_reduceD",
    "_upcr_all_gather",
    "_upcr_all_scatter",
    "_upcr_all_reduceC",
    "_upcr_all_reduceUC",
    "_upcr_all_reduceS",
    "_upcr_all_reduceUS",
    "_upcr_all_reduceI",
    "_upcr_all_reduceUI",
    "_upcr_all_reduceL",
    "_upcr_all_reduceUL",
    "_upcr_all_reduceF",
    "_upcr_all_reduceLD",
];

const CUDA_COLLECTIVES: &[&str] = &["llvm.nvvm.barrier0"];

static STANDARD: Lazy<CollectiveRegistry> = Lazy::new(|| {
    let mut registry = CollectiveRegistry::empty();
    for &(name, comm_arg) in MPI_COLLECTIVES {
        registry.add_collective(name, Paradigm::Mpi, comm_arg);
    }
    for &name in OMP_COLLECTIVES {
        registry.add_collective(name, Paradigm::OpenMp, None);
    }
    for &name in UPC_COLLECTIVES {
        registry.add_collective(name, Paradigm::Upc, None);
    }
    for &name in CUDA_COLLECTIVES {
        registry.add_collective(name, Paradigm::Cuda, None);
    }

    registry.add_arg_source("MPI_Comm_rank", Paradigm::Mpi, 1);
    registry.add_arg_source("MPI_Group_rank", Paradigm::Mpi, 1);

    registry.add_ret_source("__kmpc_global_thread_num", Paradigm::OpenMp);
    registry.add_ret_source("_omp_get_thread_num", Paradigm::OpenMp);
    registry.add_ret_source("omp_get_thread_num", Paradigm::OpenMp);
    registry.add_ret_source("llvm.nvvm.read.ptx.sreg.tid.x", Paradigm::Cuda);
    registry.add_ret_source("llvm.nvvm.read.ptx.sreg.tid.y", Paradigm::Cuda);
    registry.add_ret_source("llvm.nvvm.read.ptx.sreg.tid.z", Paradigm::Cuda);

    registry.add_load_source("gasneti_mynode", Paradigm::Upc);

    registry.add_reset_arg("MPI_Bcast", Paradigm::Mpi, 0);
    registry.add_reset_arg("MPI_Allgather", Paradigm::Mpi, 3);
    registry.add_reset_arg("MPI_Allgatherv", Paradigm::Mpi, 3);
    registry.add_reset_arg("MPI_Alltoall", Paradigm::Mpi, 3);
    registry.add_reset_arg("MPI_Alltoallv", Paradigm::Mpi, 4);
    registry.add_reset_arg("MPI_Alltoallw", Paradigm::Mpi, 4);
    registry.add_reset_arg("MPI_Allreduce", Paradigm::Mpi, 1);

    registry.active = Paradigm::ALL.into_iter().collect();
    registry
});

impl Default for CollectiveRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl CollectiveRegistry {
    /// No entries, no active paradigm
    pub fn empty() -> Self {
        Self {
            collectives: Vec::new(),
            arg_sources: Vec::new(),
            ret_sources: Vec::new(),
            load_sources: Vec::new(),
            reset_args: Vec::new(),
            active: BTreeSet::new(),
        }
    }

    /// MPI, OpenMP, UPC and CUDA tables, all paradigms active
    pub fn standard() -> Self {
        STANDARD.clone()
    }

    /// Standard tables with a single paradigm active
    pub fn only(paradigm: Paradigm) -> Self {
        Self::standard().with_paradigms([paradigm])
    }

    /// Replace the active paradigm set
    pub fn with_paradigms(mut self, paradigms: impl IntoIterator<Item = Paradigm>) -> Self {
        self.active = paradigms.into_iter().collect();
        self
    }

    pub fn add_collective(&mut self, name: &str, paradigm: Paradigm, comm_arg: Option<usize>) {
        self.collectives.retain(|c| c.name != name);
        self.collectives.push(Collective {
            name: name.to_string(),
            paradigm,
            comm_arg,
        });
    }

    pub fn add_arg_source(&mut self, function: &str, paradigm: Paradigm, arg: usize) {
        self.arg_sources.push(FunctionArg {
            function: function.to_string(),
            paradigm,
            arg,
        });
    }

    pub fn add_ret_source(&mut self, function: &str, paradigm: Paradigm) {
        self.ret_sources.push(NamedSource {
            name: function.to_string(),
            paradigm,
        });
    }

    pub fn add_load_source(&mut self, global: &str, paradigm: Paradigm) {
        self.load_sources.push(NamedSource {
            name: global.to_string(),
            paradigm,
        });
    }

    pub fn add_reset_arg(&mut self, function: &str, paradigm: Paradigm, arg: usize) {
        self.reset_args.push(FunctionArg {
            function: function.to_string(),
            paradigm,
            arg,
        });
    }

    #[inline]
    pub fn is_active(&self, paradigm: Paradigm) -> bool {
        self.active.contains(&paradigm)
    }

    pub fn active_paradigms(&self) -> impl Iterator<Item = Paradigm> + '_ {
        self.active.iter().copied()
    }

    /// Collective of an active paradigm with this name
    pub fn collective(&self, name: &str) -> Option<&Collective> {
        self.collectives
            .iter()
            .find(|c| c.name == name && self.is_active(c.paradigm))
    }

    #[inline]
    pub fn is_collective(&self, name: &str) -> bool {
        self.collective(name).is_some()
    }

    /// Active collectives in registration order
    pub fn collectives(&self) -> impl Iterator<Item = &Collective> + '_ {
        self.collectives.iter().filter(|c| self.is_active(c.paradigm))
    }

    /// Argument positions of `function` that receive the participant identity
    pub fn source_args(&self, function: &str) -> Vec<usize> {
        self.arg_sources
            .iter()
            .filter(|s| s.function == function && self.is_active(s.paradigm))
            .map(|s| s.arg)
            .collect()
    }

    /// `function` returns the participant identity
    pub fn is_ret_source(&self, function: &str) -> bool {
        self.ret_sources
            .iter()
            .any(|s| s.name == function && self.is_active(s.paradigm))
    }

    /// Loads from this global read the participant identity
    pub fn is_load_source(&self, global: &str) -> bool {
        self.load_sources
            .iter()
            .any(|s| s.name == global && self.is_active(s.paradigm))
    }

    /// Argument positions of `function` whose memory is uniform afterwards
    pub fn reset_args(&self, function: &str) -> Vec<usize> {
        self.reset_args
            .iter()
            .filter(|r| r.function == function && self.is_active(r.paradigm))
            .map(|r| r.arg)
            .collect()
    }
}
