pub mod event;
pub mod function_ssa;

pub use event::{Chi, ChiKind, EventId, MemoryEvent, MssaVar, Mu, MuKind, Phi, VarId};
pub use function_ssa::{ExtCallSummary, FunctionMemorySsa};
