//! Memory SSA over points-to regions
//!
//! Loads carry Mus, stores and calls carry Chis, join blocks carry Phis,
//! one region at a time. Calls to external functions get per-call-site
//! summary variables so the dependency graph can model their effect
//! without a body.
//!
//! ```text
//! let ssa = MemorySsa::build(&module, &cfgs, &pta, &regions, &modref, &cg, &config);
//! for mu in ssa.of(main).load_mus(load) { /* mu.var reaches the load */ }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{MemorySsa, MemorySsaStats};
pub use domain::{
    Chi, ChiKind, EventId, ExtCallSummary, FunctionMemorySsa, MemoryEvent, MssaVar, Mu, MuKind,
    Phi, VarId,
};
pub use infrastructure::MemorySsaBuilder;
