//! Stage-specific configuration types
//!
//! Each analysis stage has its own configuration struct with validation.

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::validation::Validatable;
use serde::{Deserialize, Serialize};

// ============================================================================
// Points-to analysis
// ============================================================================

/// Andersen points-to analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsToConfig {
    /// Collapse strongly connected components of copy constraints before solving
    pub collapse_cycles: bool,

    /// Maximum solve/resolve rounds for indirect calls (1..=1000)
    pub max_resolution_rounds: usize,
}

impl Default for PointsToConfig {
    fn default() -> Self {
        Self {
            collapse_cycles: true,
            max_resolution_rounds: 100,
        }
    }
}

impl PointsToConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                collapse_cycles: true,
                max_resolution_rounds: 20,
            },
            Preset::Balanced | Preset::Custom => Self::default(),
            Preset::Thorough => Self {
                collapse_cycles: true,
                max_resolution_rounds: 1000,
            },
        }
    }

    pub fn collapse_cycles(mut self, v: bool) -> Self {
        self.collapse_cycles = v;
        self
    }

    pub fn max_resolution_rounds(mut self, v: usize) -> Self {
        self.max_resolution_rounds = v;
        self
    }
}

impl Validatable for PointsToConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_resolution_rounds == 0 || self.max_resolution_rounds > 1000 {
            return Err(ConfigError::range_with_hint(
                "max_resolution_rounds",
                self.max_resolution_rounds,
                1,
                1000,
                "Each round re-solves after binding newly discovered indirect callees",
            ));
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "PointsToConfig"
    }
}

// ============================================================================
// Memory regions
// ============================================================================

/// How abstract objects are grouped into memory regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionGranularity {
    /// One region per object node
    #[default]
    AllocationSite,
    /// Objects sharing a points-to set share a region
    EquivalenceClass,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub granularity: RegionGranularity,
}

impl RegionConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                granularity: RegionGranularity::EquivalenceClass,
            },
            _ => Self::default(),
        }
    }

    pub fn granularity(mut self, v: RegionGranularity) -> Self {
        self.granularity = v;
        self
    }
}

impl Validatable for RegionConfig {
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "RegionConfig"
    }
}

// ============================================================================
// Memory SSA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySsaConfig {
    /// Build functions on the rayon pool
    pub parallel: bool,

    /// Compute gating predicates for memory and IR phis
    pub phi_predicates: bool,
}

impl Default for MemorySsaConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            phi_predicates: true,
        }
    }
}

impl MemorySsaConfig {
    pub fn from_preset(_preset: Preset) -> Self {
        Self::default()
    }

    pub fn parallel(mut self, v: bool) -> Self {
        self.parallel = v;
        self
    }

    pub fn phi_predicates(mut self, v: bool) -> Self {
        self.phi_predicates = v;
        self
    }
}

impl Validatable for MemorySsaConfig {
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "MemorySsaConfig"
    }
}

// ============================================================================
// Dependency graph
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepGraphConfig {
    /// Drop the overwritten version edge into store and call Chis
    pub strong_update: bool,

    /// Drop pointer operand edges into loads and stores
    pub no_ptr_dep: bool,

    /// Drop predicate edges into IR and memory phis
    pub no_phi_predicates: bool,

    /// Merge memory phis whose operands are equivalent
    pub phi_elimination: bool,
}

impl Default for DepGraphConfig {
    fn default() -> Self {
        Self {
            strong_update: false,
            no_ptr_dep: false,
            no_phi_predicates: false,
            phi_elimination: true,
        }
    }
}

impl DepGraphConfig {
    pub fn from_preset(_preset: Preset) -> Self {
        Self::default()
    }

    pub fn strong_update(mut self, v: bool) -> Self {
        self.strong_update = v;
        self
    }

    pub fn no_ptr_dep(mut self, v: bool) -> Self {
        self.no_ptr_dep = v;
        self
    }

    pub fn no_phi_predicates(mut self, v: bool) -> Self {
        self.no_phi_predicates = v;
        self
    }

    pub fn phi_elimination(mut self, v: bool) -> Self {
        self.phi_elimination = v;
        self
    }
}

impl Validatable for DepGraphConfig {
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "DepGraphConfig"
    }
}

// ============================================================================
// Taint propagation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaintMode {
    /// One flood over the whole graph
    #[default]
    ContextInsensitive,
    /// One call-graph traversal per entry point
    ContextSensitive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaintConfig {
    pub mode: TaintMode,

    /// Run entry traversals on the rayon pool (context-sensitive only)
    pub parallel_entries: bool,

    /// Report every conditional collective without consulting taint
    pub disable_dataflow: bool,
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            mode: TaintMode::ContextInsensitive,
            parallel_entries: true,
            disable_dataflow: false,
        }
    }
}

impl TaintConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Thorough => Self {
                mode: TaintMode::ContextSensitive,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn mode(mut self, v: TaintMode) -> Self {
        self.mode = v;
        self
    }

    pub fn parallel_entries(mut self, v: bool) -> Self {
        self.parallel_entries = v;
        self
    }

    pub fn disable_dataflow(mut self, v: bool) -> Self {
        self.disable_dataflow = v;
        self
    }
}

impl Validatable for TaintConfig {
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "TaintConfig"
    }
}

// ============================================================================
// Divergence detector
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Extend PDF+ through the call sites of the enclosing function
    pub interprocedural_pdf: bool,

    /// Skip conditions whose branches run the same collective sequence
    pub sequence_filter: bool,

    /// Report collectives inside natural loops as advisories
    pub loop_advisories: bool,

    /// Longest taint trace attached to a warning (1..=10000)
    pub max_trace_len: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            interprocedural_pdf: true,
            sequence_filter: false,
            loop_advisories: true,
            max_trace_len: 256,
        }
    }
}

impl DetectorConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                loop_advisories: false,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn interprocedural_pdf(mut self, v: bool) -> Self {
        self.interprocedural_pdf = v;
        self
    }

    pub fn sequence_filter(mut self, v: bool) -> Self {
        self.sequence_filter = v;
        self
    }

    pub fn loop_advisories(mut self, v: bool) -> Self {
        self.loop_advisories = v;
        self
    }

    pub fn max_trace_len(mut self, v: usize) -> Self {
        self.max_trace_len = v;
        self
    }
}

impl Validatable for DetectorConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_trace_len == 0 || self.max_trace_len > 10_000 {
            return Err(ConfigError::range_with_hint(
                "max_trace_len",
                self.max_trace_len,
                1,
                10_000,
                "A warning trace holds at least the source and the condition",
            ));
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "DetectorConfig"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_to_rounds_range() {
        assert!(PointsToConfig::default().validate().is_ok());

        let err = PointsToConfig::default()
            .max_resolution_rounds(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_resolution_rounds"));

        assert!(PointsToConfig::default()
            .max_resolution_rounds(1001)
            .validate()
            .is_err());
    }

    #[test]
    fn test_presets_pick_region_granularity() {
        assert_eq!(
            RegionConfig::from_preset(Preset::Fast).granularity,
            RegionGranularity::EquivalenceClass
        );
        assert_eq!(
            RegionConfig::from_preset(Preset::Balanced).granularity,
            RegionGranularity::AllocationSite
        );
    }

    #[test]
    fn test_thorough_is_context_sensitive() {
        assert_eq!(
            TaintConfig::from_preset(Preset::Thorough).mode,
            TaintMode::ContextSensitive
        );
        assert_eq!(
            TaintConfig::from_preset(Preset::Balanced).mode,
            TaintMode::ContextInsensitive
        );
    }

    #[test]
    fn test_builder_setters() {
        let dg = DepGraphConfig::default()
            .strong_update(true)
            .no_ptr_dep(true)
            .phi_elimination(false);
        assert!(dg.strong_update);
        assert!(dg.no_ptr_dep);
        assert!(!dg.no_phi_predicates);
        assert!(!dg.phi_elimination);
    }

    #[test]
    fn test_detector_trace_range() {
        assert!(DetectorConfig::default().max_trace_len(0).validate().is_err());
        assert!(DetectorConfig::default().max_trace_len(10).validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let cfg: TaintConfig = serde_yaml::from_str("mode: context_sensitive").unwrap();
        assert_eq!(cfg.mode, TaintMode::ContextSensitive);
        assert!(cfg.parallel_entries);
        assert!(!cfg.disable_dataflow);
    }
}
