//! Analyzable program representation
//!
//! A small SSA-form IR in the shape of LLVM bitcode: a module of functions,
//! blocks, instructions, globals and constants, each carrying an optional
//! debug location. Modules are built programmatically through
//! [`ModuleBuilder`] or decoded from JSON.

pub mod builder;
pub mod cfg;
pub mod module;
pub mod types;
pub mod value;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use cfg::{FunctionCfg, ModuleCfg};
pub use module::{Block, Function, Linkage, Module};
pub use types::{BlockId, DebugLoc, FuncId, Type, ValueId};
pub use value::{CastOp, ConstOp, Instruction, Opcode, PhiIncoming, Value, ValueKind};
