//! # Collectives
//!
//! Paradigm tables: collective operations, participant-identity sources,
//! uniformizing arguments, and the external-function summaries shared by
//! the points-to, mod/ref and memory SSA layers.
//!
//! ## Usage
//! ```text
//! use codegraph_collective::features::collectives::{CollectiveRegistry, Paradigm};
//!
//! let registry = CollectiveRegistry::only(Paradigm::Mpi);
//! assert!(registry.is_collective("MPI_Allreduce"));
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{Collective, CollectiveRegistry, Paradigm};
pub use infrastructure::{ext_info, is_memcpy_like, is_memset_like, ExtInfo};
