//! Configuration I/O
//!
//! YAML schema types. Loading and export live on [`AnalysisConfig`].
//!
//! [`AnalysisConfig`]: super::AnalysisConfig

use super::stage_configs::*;
use serde::{Deserialize, Serialize};

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1)
    #[serde(default)]
    pub version: Option<u32>,

    /// Base preset
    pub preset: String,

    /// Fine-grained overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ConfigOverrides>,

    /// Active paradigms of the collective registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistrySection>,
}

/// Per-stage overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_to: Option<PointsToConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<RegionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_ssa: Option<MemorySsaConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dep_graph: Option<DepGraphConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taint: Option<TaintConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector: Option<DetectorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    pub paradigms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::error::ConfigError;
    use crate::config::{AnalysisConfig, Preset};
    use crate::features::collectives::Paradigm;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = AnalysisConfig::preset(Preset::Balanced).dep_graph(|c| c.strong_update(true));

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(yaml.contains("preset: balanced"));
        assert!(yaml.contains("strong_update: true"));

        let back = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_yaml_loading() {
        let file = write_yaml(
            r#"
version: 1
preset: fast
overrides:
  taint:
    mode: context_sensitive
  detector:
    sequence_filter: true
registry:
  paradigms: [mpi, omp]
"#,
        );

        let config = AnalysisConfig::from_yaml(file.path()).unwrap();
        assert_eq!(config.preset, Preset::Fast);
        assert_eq!(config.taint.mode, TaintMode::ContextSensitive);
        assert!(config.detector.sequence_filter);
        assert!(config.detector.interprocedural_pdf);
        assert_eq!(
            config.regions.granularity,
            RegionGranularity::EquivalenceClass
        );
        assert_eq!(
            config.paradigms,
            Some(vec![Paradigm::Mpi, Paradigm::OpenMp])
        );
    }

    #[test]
    fn test_yaml_missing_version() {
        let file = write_yaml("preset: fast\n");
        let result = AnalysisConfig::from_yaml(file.path());
        assert!(matches!(result, Err(ConfigError::MissingVersion)));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let file = write_yaml("version: 2\npreset: fast\n");
        match AnalysisConfig::from_yaml(file.path()) {
            Err(ConfigError::UnsupportedVersion { found, .. }) => assert_eq!(found, 2),
            other => panic!("expected unsupported version, got {:?}", other),
        }
    }

    #[test]
    fn test_yaml_unknown_preset() {
        let file = write_yaml("version: 1\npreset: turbo\n");
        assert!(matches!(
            AnalysisConfig::from_yaml(file.path()),
            Err(ConfigError::UnknownPreset(name)) if name == "turbo"
        ));
    }

    #[test]
    fn test_yaml_unknown_paradigm_suggests() {
        let err = AnalysisConfig::from_yaml_str(
            "version: 1\npreset: balanced\nregistry:\n  paradigms: [mpii]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Did you mean 'mpi'"));
    }

    #[test]
    fn test_yaml_unknown_field_rejected() {
        let result = AnalysisConfig::from_yaml_str(
            "version: 1\npreset: balanced\noverrides:\n  pta:\n    collapse_cycles: true\n",
        );
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_yaml_range_checked_after_load() {
        let result = AnalysisConfig::from_yaml_str(
            "version: 1\npreset: custom\noverrides:\n  points_to:\n    max_resolution_rounds: 0\n",
        );
        assert!(matches!(result, Err(ConfigError::Range { .. })));
    }
}
