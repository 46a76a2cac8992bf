//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error - required field missing
    #[error("[{section}] is missing required field '{field}'")]
    MissingField {
        /// Config section (e.g., "ingest")
        section: &'static str,
        /// Missing field name
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("[{section}] has invalid {field}: {message}")]
    InvalidValue {
        /// Config section
        section: &'static str,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// Collector has neither a request listener nor an upstream subscription
    #[error("collector has no input - enable 'listen' or set 'subscribe'")]
    NoCollectorInput,
}

impl ConfigError {
    /// Create a MissingField error
    pub fn missing_field(section: &'static str, field: &'static str) -> Self {
        Self::MissingField { section, field }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        section: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section,
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_error() {
        let err = ConfigError::missing_field("ingest", "server");
        assert!(err.to_string().contains("[ingest]"));
        assert!(err.to_string().contains("server"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("ingest", "ack_timeout", "must be greater than zero");
        assert!(err.to_string().contains("ack_timeout"));
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_no_collector_input() {
        let err = ConfigError::NoCollectorInput;
        assert!(err.to_string().contains("no input"));
    }
}
