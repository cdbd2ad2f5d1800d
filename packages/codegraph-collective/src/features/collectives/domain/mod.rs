//! Paradigm and collective tables

pub mod paradigm;
pub mod registry;

pub use paradigm::Paradigm;
pub use registry::{Collective, CollectiveRegistry, FunctionArg, NamedSource};
