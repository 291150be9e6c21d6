//! Error Handling Module
//!
//! Defines the error type shared by the training and serving flows.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for covid_xray operations
#[derive(Error, Debug)]
pub enum XrayError {
    /// Uploaded image could not be decoded or is not a supported format
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model weights missing or unreadable; fatal at startup
    #[error("Failed to load model from '{0}': {1}")]
    ModelLoad(PathBuf, String),

    /// Malformed tensor or unexpected model failure
    #[error("Inference error: {0}")]
    Inference(String),

    /// Filesystem failure while writing a report document
    #[error("Failed to write report '{0}': {1}")]
    ReportWrite(PathBuf, String),

    /// Missing or out-of-range operator input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Unknown session or report
    #[error("Not found: {0}")]
    NotFound(String),
}

impl XrayError {
    /// Whether the error should halt the process instead of being reported per request
    pub fn is_fatal(&self) -> bool {
        matches!(self, XrayError::ModelLoad(..))
    }
}

impl From<serde_json::Error> for XrayError {
    fn from(err: serde_json::Error) -> Self {
        XrayError::Serialization(err.to_string())
    }
}

/// Convenience Result type for covid_xray operations
pub type Result<T> = std::result::Result<T, XrayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XrayError::Validation("patient name is required".to_string());
        assert_eq!(
            format!("{}", err),
            "Validation error: patient name is required"
        );
    }

    #[test]
    fn test_model_load_error_is_fatal() {
        let err = XrayError::ModelLoad(PathBuf::from("covid_model.mpk"), "missing".to_string());
        assert!(err.is_fatal());
        assert!(format!("{}", err).contains("covid_model.mpk"));

        let err = XrayError::Inference("bad shape".to_string());
        assert!(!err.is_fatal());
    }
}
