//! Analysis configuration
//!
//! Three levels, from simplest to most complete:
//! - a [`Preset`],
//! - per-stage closures on [`AnalysisConfig`],
//! - a versioned YAML file.
//!
//! ```rust,ignore
//! use codegraph_collective::config::{AnalysisConfig, Preset, TaintMode};
//!
//! let config = AnalysisConfig::preset(Preset::Balanced)
//!     .taint(|c| c.mode(TaintMode::ContextSensitive))
//!     .dep_graph(|c| c.strong_update(true));
//!
//! let config = AnalysisConfig::from_yaml("collective.yaml")?;
//! ```

pub mod analysis_config;
pub mod error;
pub mod io;
pub mod preset;
pub mod stage_configs;
pub mod validation;

pub use analysis_config::AnalysisConfig;
pub use error::{ConfigError, ConfigResult};
pub use io::{ConfigExportV1, ConfigOverrides, RegistrySection};
pub use preset::Preset;
pub use stage_configs::{
    DepGraphConfig, DetectorConfig, MemorySsaConfig, PointsToConfig, RegionConfig,
    RegionGranularity, TaintConfig, TaintMode,
};
pub use validation::{ConfigValidator, CrossStageValidator, Validatable, ValidatableCollection};
