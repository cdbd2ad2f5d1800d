/*
 * Codegraph Collective - static detection of collective divergence
 *
 * Layers:
 * - ir/        : SSA module model, CFG, dominators, JSON loading
 * - features/  : points-to -> regions -> memory SSA -> dependency graph -> taint -> divergence
 * - pipeline/  : analyze() and the staged AnalysisSession
 * - config/    : presets, stage configs, YAML
 *
 * A collective call whose execution is controlled by a branch depending on
 * participant identity (rank, thread id) may not be reached by every
 * participant. Such calls are reported with the offending conditions and the
 * data-flow path from the identity source.
 */

#![allow(clippy::too_many_arguments)] // Analysis passes take every upstream layer
#![allow(clippy::type_complexity)]

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

/// Feature modules (analysis layers)
pub mod features;

/// Input program model
pub mod ir;

/// Pipeline orchestration
pub mod pipeline;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{AnalysisConfig, Preset};
pub use errors::{CollectiveError, Result};
pub use features::collectives::{CollectiveRegistry, Paradigm};
pub use features::divergence::{LoopAdvisory, Warning};
pub use ir::{Module, ModuleBuilder};
pub use pipeline::{analyze, AnalysisReport, AnalysisSession, AnalysisStats};
