//! Preset configurations
//!
//! Presets provide complete default configurations for common use cases.

use serde::{Deserialize, Serialize};

/// Configuration preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// CI: quickest answer
    ///
    /// - Regions: one per equivalence class
    /// - Taint: context-insensitive
    Fast,

    /// Default analysis
    ///
    /// - Regions: one per allocation site
    /// - Taint: context-insensitive
    #[default]
    Balanced,

    /// Audit: fewest false positives
    ///
    /// - Regions: one per allocation site
    /// - Taint: context-sensitive, one flood per entry point
    Thorough,

    /// Custom: balanced defaults meant to be overridden via YAML or builders
    Custom,
}

impl Preset {
    /// Parse preset from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "thorough" => Ok(Self::Thorough),
            "custom" => Ok(Self::Custom),
            _ => Err(format!(
                "Unknown preset '{}'. Valid presets: fast, balanced, thorough, custom",
                s
            )),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Thorough => "thorough",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parsing() {
        assert_eq!(Preset::from_str("fast").unwrap(), Preset::Fast);
        assert_eq!(Preset::from_str("THOROUGH").unwrap(), Preset::Thorough);
        assert!(Preset::from_str("turbo").is_err());
    }

    #[test]
    fn test_preset_display() {
        assert_eq!(Preset::Balanced.to_string(), "balanced");
        assert_eq!(Preset::Custom.to_string(), "custom");
    }

    #[test]
    fn test_default_preset() {
        assert_eq!(Preset::default(), Preset::Balanced);
    }
}
