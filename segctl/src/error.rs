//! Error handling module for the segctl CLI.

use segsync_drv::DriverError;
use thiserror::Error;

/// Main error type for the segctl CLI application.
#[derive(Error, Debug)]
pub enum CtlError {
    /// Configuration file missing, unreadable or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command-line or configuration value out of range.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The demo could not be set up or a worker failed.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The demo ran but broke an invariant.
    #[error("Consistency check failed: {0}")]
    Inconsistent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias using CtlError.
pub type Result<T> = std::result::Result<T, CtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CtlError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_inconsistent_display() {
        let err = CtlError::Inconsistent("3 torn reads".to_string());
        assert_eq!(err.to_string(), "Consistency check failed: 3 torn reads");
    }

    #[test]
    fn test_driver_error_is_transparent() {
        let err: CtlError = DriverError::InvalidParameters("zero workers".to_string()).into();
        assert_eq!(err.to_string(), "Invalid parameters: zero workers");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CtlError = io_err.into();
        assert!(matches!(err, CtlError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: CtlError = toml_err.into();
        assert!(matches!(err, CtlError::Toml(_)));
    }
}
