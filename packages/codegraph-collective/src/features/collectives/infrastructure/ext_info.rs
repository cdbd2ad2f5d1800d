//! Side-effect summaries of external functions
//!
//! For a body-less callee the analyses need to know whether the returned
//! pointer designates fresh memory and which pointer arguments are written
//! through. Callees missing from the table are treated as writing through
//! every pointer argument.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Summary of one external function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtInfo {
    pub nb_args: usize,
    /// The returned pointer designates memory owned by the call
    pub ret_is_mod: bool,
    pub arg_is_mod: &'static [bool],
}

impl ExtInfo {
    /// Arguments past the summarized ones (variadic tails) count as written
    #[inline]
    pub fn arg_modified(&self, index: usize) -> bool {
        self.arg_is_mod.get(index).copied().unwrap_or(true)
    }
}

const F: bool = false;
const T: bool = true;

macro_rules! ext {
    ($name:expr, $nb:expr, $ret:expr, [$($m:expr),*]) => {
        (
            $name,
            ExtInfo {
                nb_args: $nb,
                ret_is_mod: $ret,
                arg_is_mod: &[$($m),*],
            },
        )
    };
}

static EXT_INFO: Lazy<FxHashMap<&'static str, ExtInfo>> = Lazy::new(|| {
    [
        ext!("MPI_Init", 2, F, [F, F]),
        ext!("MPI_Comm_rank", 2, F, [F, T]),
        ext!("MPI_Comm_size", 2, F, [F, T]),
        ext!("MPI_Group_rank", 2, F, [F, T]),
        ext!("MPI_Finalize", 0, F, []),
        ext!("MPI_Bcast", 5, F, [T, F, F, F, F]),
        ext!("MPI_Barrier", 1, F, [F]),
        ext!("MPI_Allreduce", 6, F, [F, T, F, F, F, F]),
        ext!("MPI_Allgather", 7, F, [F, F, F, T, F, F, F]),
        ext!("MPI_Allgatherv", 8, F, [F, F, F, T, F, F, F, F]),
        ext!("MPI_Alltoall", 7, F, [F, F, F, T, F, F, F]),
        ext!("MPI_Abort", 2, F, [F, F]),
        ext!("MPI_Reduce", 7, F, [F, T, F, F, F, F, F]),
        ext!("MPI_Recv", 7, F, [T, F, F, F, F, F, T]),
        ext!("MPI_Send", 6, F, [F, F, F, F, F, F]),
        ext!("MPI_Ssend", 6, F, [F, F, F, F, F, F]),
        ext!("MPI_Wtime", 0, F, []),
        ext!("MPI_Sendrecv", 12, F, [F, F, F, F, F, T, F, F, F, F, F, T]),
        ext!("MPI_Gather", 8, F, [F, F, F, T, F, F, F, F]),
        ext!("puts", 1, F, [F]),
        ext!("strcpy", 2, T, [T, F]),
        ext!("strtol", 3, F, [F, T, F]),
        ext!("strtod", 2, F, [T, F]),
        ext!("strdup", 1, T, [F]),
        ext!("strlen", 1, F, [F]),
        ext!("strcmp", 2, F, [F, F]),
        ext!("strncmp", 3, F, [F, F, F]),
        ext!("strerror", 1, T, [F]),
        ext!("sprintf", 3, F, [T, F, F]),
        ext!("fprintf", 3, F, [T, F, F]),
        ext!("printf", 2, F, [F, F]),
        ext!("unlink", 1, F, [F]),
        ext!("fopen", 2, T, [F, F]),
        ext!("fclose", 1, F, [T]),
        ext!("fflush", 1, F, [F]),
        ext!("fgets", 1, T, [T]),
        ext!("fwrite", 4, F, [F, F, F, T]),
        ext!("fread", 4, F, [T, F, F, T]),
        ext!("fputc", 2, F, [F, T]),
        ext!("feof", 1, F, [F]),
        ext!("putchar", 1, F, [F]),
        ext!("__isoc99_sscanf", 3, F, [F, F, T]),
        ext!("__isoc99_fscanf", 3, F, [T, F, T]),
        ext!("system", 1, F, [F]),
        ext!("exit", 1, F, [F]),
        ext!("__errno_location", 0, T, []),
        ext!("qsort", 4, F, [T, F, F, F]),
        ext!("malloc", 1, T, [F]),
        ext!("calloc", 2, T, [F, F]),
        ext!("realloc", 2, T, [T, F]),
        ext!("free", 1, F, [T]),
        ext!("memcpy", 3, T, [T, F, F]),
        ext!("memmove", 3, T, [T, F, F]),
        ext!("memset", 3, T, [T, F, F]),
        ext!("llvm.memset.p0i8.i64", 5, F, [T, F, F, F, F]),
        ext!("llvm.memcpy.p0i8.p0i8.i64", 5, F, [T, F, F, F, F]),
        ext!("llvm.memmove.p0i8.p0i8.i64", 5, F, [T, T, F, F, F]),
        ext!("llvm.memset.p0.i64", 4, F, [T, F, F, F]),
        ext!("llvm.memcpy.p0.p0.i64", 4, F, [T, F, F, F]),
        ext!("llvm.memmove.p0.p0.i64", 4, F, [T, F, F, F]),
        ext!("llvm.lifetime.start", 2, F, [F, F]),
        ext!("llvm.lifetime.end", 2, F, [F, F]),
        ext!("log", 1, F, [F]),
        ext!("exp", 1, F, [F]),
        ext!("pow", 2, F, [F, F]),
        ext!("sqrt", 1, F, [F]),
        ext!("fabs", 1, F, [F]),
        ext!("fabsf", 1, F, [F]),
        ext!("cos", 1, F, [F]),
        ext!("sin", 1, F, [F]),
        ext!("erfc", 1, F, [F]),
        ext!("gsl_rng_alloc", 1, T, [F]),
        ext!("gsl_rng_set", 1, F, [F]),
        ext!("gsl_rng_state", 1, T, [F]),
        ext!("gsl_rng_size", 1, F, [F]),
        ext!("gsl_rng_uniform", 1, F, [F]),
        ext!("gsl_integration_workspace_alloc", 1, T, [F]),
        ext!("gsl_integration_qag", 10, T, [F, F, F, F, F, F, F, T, T, T]),
        ext!("gsl_integration_workspace_free", 1, F, [T]),
    ]
    .into_iter()
    .collect()
});

/// Summary for an external function, if one is known
pub fn ext_info(name: &str) -> Option<&'static ExtInfo> {
    EXT_INFO.get(name)
}

/// Callee copies memory from its second argument into its first
#[inline]
pub fn is_memcpy_like(name: &str) -> bool {
    name.contains("memcpy") || name.contains("memmove")
}

/// Callee fills its first argument with its second
#[inline]
pub fn is_memset_like(name: &str) -> bool {
    name.contains("memset")
}
