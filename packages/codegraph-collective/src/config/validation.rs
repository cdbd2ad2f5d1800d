//! Configuration validation

use super::analysis_config::AnalysisConfig;
use super::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration objects
pub trait Validatable {
    /// Validate the configuration
    ///
    /// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
    fn validate(&self) -> ConfigResult<()>;

    /// Get the configuration name for error messages
    fn config_name(&self) -> &'static str {
        "Config"
    }
}

/// Extension trait for validating collections of configs
pub trait ValidatableCollection {
    fn validate_all(&self) -> ConfigResult<()>;
}

impl<T: Validatable> ValidatableCollection for Vec<T> {
    fn validate_all(&self) -> ConfigResult<()> {
        for config in self {
            config.validate()?;
        }
        Ok(())
    }
}

impl<T: Validatable> ValidatableCollection for Option<T> {
    fn validate_all(&self) -> ConfigResult<()> {
        if let Some(config) = self {
            config.validate()?;
        }
        Ok(())
    }
}

/// Whole-configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate every stage, then the combinations between stages
    pub fn validate(config: &AnalysisConfig) -> ConfigResult<()> {
        config.points_to.validate()?;
        config.regions.validate()?;
        config.memory_ssa.validate()?;
        config.dep_graph.validate()?;
        config.taint.validate()?;
        config.detector.validate()?;
        CrossStageValidator::validate(config)
    }
}

/// Cross-stage validator
pub struct CrossStageValidator;

impl CrossStageValidator {
    pub fn validate(config: &AnalysisConfig) -> ConfigResult<()> {
        if let Some(paradigms) = &config.paradigms {
            if paradigms.is_empty() {
                return Err(ConfigError::Validation(
                    "registry.paradigms is empty: no collective could ever be reported"
                        .to_string(),
                ));
            }
        }

        // Predicate edges come from the memory SSA; asking for them without it is a no-op
        if !config.memory_ssa.phi_predicates && !config.dep_graph.no_phi_predicates {
            tracing::debug!(
                "phi predicates disabled in memory SSA; dependency graph gets no predicate edges"
            );
        }

        Ok(())
    }
}
