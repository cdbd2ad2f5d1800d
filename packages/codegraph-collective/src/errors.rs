//! Error types for codegraph-collective
//!
//! Only input problems are recoverable. Broken invariants inside the points-to
//! or memory SSA layers are bugs and panic.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for codegraph-collective operations
#[derive(Debug, Error)]
pub enum CollectiveError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Module could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Module decoded but structurally inconsistent
    #[error("Invalid module: {0}")]
    InvalidModule(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Analysis error
    #[error("Analysis error: {0}")]
    Analysis(String),
}

impl CollectiveError {
    /// Create a parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        CollectiveError::Parse(msg.into())
    }

    /// Create an invalid module error
    pub fn invalid_module(msg: impl Into<String>) -> Self {
        CollectiveError::InvalidModule(msg.into())
    }

    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        CollectiveError::Analysis(msg.into())
    }
}

impl From<serde_json::Error> for CollectiveError {
    fn from(err: serde_json::Error) -> Self {
        CollectiveError::Parse(err.to_string())
    }
}

/// Result type alias for codegraph-collective operations
pub type Result<T> = std::result::Result<T, CollectiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_module_message() {
        let err = CollectiveError::invalid_module("block bb3 has no terminator");
        assert_eq!(err.to_string(), "Invalid module: block bb3 has no terminator");
    }

    #[test]
    fn test_json_error_maps_to_parse() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CollectiveError = json_err.into();
        assert!(matches!(err, CollectiveError::Parse(_)));
    }

    #[test]
    fn test_config_error_is_wrapped() {
        let err: CollectiveError = ConfigError::UnknownPreset("turbo".to_string()).into();
        assert!(err.to_string().contains("turbo"));
    }
}
