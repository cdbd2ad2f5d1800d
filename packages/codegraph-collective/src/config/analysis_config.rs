//! Whole-analysis configuration

use super::error::{ConfigError, ConfigResult};
use super::io::{ConfigExportV1, ConfigOverrides, RegistrySection};
use super::preset::Preset;
use super::stage_configs::*;
use super::validation::ConfigValidator;
use crate::features::collectives::{CollectiveRegistry, Paradigm};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SUPPORTED_VERSIONS: [u32; 1] = [1];

/// Configuration of every analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub preset: Preset,
    pub points_to: PointsToConfig,
    pub regions: RegionConfig,
    pub memory_ssa: MemorySsaConfig,
    pub dep_graph: DepGraphConfig,
    pub taint: TaintConfig,
    pub detector: DetectorConfig,

    /// Paradigms to enable in the standard registry; `None` keeps all of them
    pub paradigms: Option<Vec<Paradigm>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::preset(Preset::default())
    }
}

impl AnalysisConfig {
    /// Create from preset
    pub fn preset(preset: Preset) -> Self {
        Self {
            preset,
            points_to: PointsToConfig::from_preset(preset),
            regions: RegionConfig::from_preset(preset),
            memory_ssa: MemorySsaConfig::from_preset(preset),
            dep_graph: DepGraphConfig::from_preset(preset),
            taint: TaintConfig::from_preset(preset),
            detector: DetectorConfig::from_preset(preset),
            paradigms: None,
        }
    }

    pub fn points_to<F>(mut self, f: F) -> Self
    where
        F: FnOnce(PointsToConfig) -> PointsToConfig,
    {
        self.points_to = f(self.points_to);
        self
    }

    pub fn regions<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RegionConfig) -> RegionConfig,
    {
        self.regions = f(self.regions);
        self
    }

    pub fn memory_ssa<F>(mut self, f: F) -> Self
    where
        F: FnOnce(MemorySsaConfig) -> MemorySsaConfig,
    {
        self.memory_ssa = f(self.memory_ssa);
        self
    }

    pub fn dep_graph<F>(mut self, f: F) -> Self
    where
        F: FnOnce(DepGraphConfig) -> DepGraphConfig,
    {
        self.dep_graph = f(self.dep_graph);
        self
    }

    pub fn taint<F>(mut self, f: F) -> Self
    where
        F: FnOnce(TaintConfig) -> TaintConfig,
    {
        self.taint = f(self.taint);
        self
    }

    pub fn detector<F>(mut self, f: F) -> Self
    where
        F: FnOnce(DetectorConfig) -> DetectorConfig,
    {
        self.detector = f(self.detector);
        self
    }

    pub fn paradigms(mut self, paradigms: Vec<Paradigm>) -> Self {
        self.paradigms = Some(paradigms);
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        ConfigValidator::validate(self)
    }

    /// Standard registry restricted to the configured paradigms
    pub fn registry(&self) -> CollectiveRegistry {
        match &self.paradigms {
            Some(paradigms) => CollectiveRegistry::standard().with_paradigms(paradigms.iter().copied()),
            None => CollectiveRegistry::standard(),
        }
    }

    /// Load from YAML file (v1 schema)
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        let version = export.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let preset = Preset::from_str(&export.preset)
            .map_err(|_| ConfigError::UnknownPreset(export.preset.clone()))?;

        let mut config = Self::preset(preset);

        if let Some(overrides) = export.overrides {
            if let Some(points_to) = overrides.points_to {
                config.points_to = points_to;
            }
            if let Some(regions) = overrides.regions {
                config.regions = regions;
            }
            if let Some(memory_ssa) = overrides.memory_ssa {
                config.memory_ssa = memory_ssa;
            }
            if let Some(dep_graph) = overrides.dep_graph {
                config.dep_graph = dep_graph;
            }
            if let Some(taint) = overrides.taint {
                config.taint = taint;
            }
            if let Some(detector) = overrides.detector {
                config.detector = detector;
            }
        }

        if let Some(registry) = export.registry {
            let mut paradigms = Vec::with_capacity(registry.paradigms.len());
            for name in &registry.paradigms {
                let paradigm = Paradigm::from_str(name).map_err(|_| {
                    ConfigError::unknown_field_with_suggestion(
                        name.clone(),
                        "registry",
                        Paradigm::ALL.iter().map(|p| p.as_str().to_string()).collect(),
                    )
                })?;
                if !paradigms.contains(&paradigm) {
                    paradigms.push(paradigm);
                }
            }
            config.paradigms = Some(paradigms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Export to YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: Some(1),
            preset: self.preset.to_string(),
            overrides: Some(ConfigOverrides {
                points_to: Some(self.points_to.clone()),
                regions: Some(self.regions.clone()),
                memory_ssa: Some(self.memory_ssa.clone()),
                dep_graph: Some(self.dep_graph.clone()),
                taint: Some(self.taint.clone()),
                detector: Some(self.detector.clone()),
            }),
            registry: self.paradigms.as_ref().map(|paradigms| RegistrySection {
                paradigms: paradigms.iter().map(|p| p.as_str().to_string()).collect(),
            }),
        };

        Ok(serde_yaml::to_string(&export)?)
    }

    /// One-line description for logs
    pub fn describe(&self) -> String {
        let mode = match self.taint.mode {
            TaintMode::ContextInsensitive => "ci",
            TaintMode::ContextSensitive => "cs",
        };
        let regions = match self.regions.granularity {
            RegionGranularity::AllocationSite => "allocation-site",
            RegionGranularity::EquivalenceClass => "equivalence-class",
        };
        let paradigms = match &self.paradigms {
            Some(list) => list.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(","),
            None => "all".to_string(),
        };
        format!(
            "{} [taint={}, regions={}, paradigms={}]",
            self.preset, mode, regions, paradigms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_balanced() {
        let config = AnalysisConfig::default();
        assert_eq!(config.preset, Preset::Balanced);
        assert_eq!(config.taint.mode, TaintMode::ContextInsensitive);
        assert!(config.dep_graph.phi_elimination);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_closure_overrides_compose() {
        let config = AnalysisConfig::preset(Preset::Thorough)
            .taint(|c| c.parallel_entries(false))
            .taint(|c| c.disable_dataflow(true));
        assert_eq!(config.taint.mode, TaintMode::ContextSensitive);
        assert!(!config.taint.parallel_entries);
        assert!(config.taint.disable_dataflow);
    }

    #[test]
    fn test_registry_restricted_to_paradigms() {
        let registry = AnalysisConfig::default()
            .paradigms(vec![Paradigm::OpenMp])
            .registry();
        assert!(registry.is_active(Paradigm::OpenMp));
        assert!(!registry.is_active(Paradigm::Mpi));
        assert!(!registry.is_collective("MPI_Barrier"));
    }

    #[test]
    fn test_describe() {
        let text = AnalysisConfig::preset(Preset::Fast).describe();
        assert_eq!(text, "fast [taint=ci, regions=equivalence-class, paradigms=all]");
    }
}
