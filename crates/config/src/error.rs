//! Configuration error types.

use std::io;
use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Failed to parse YAML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Config file declares a version this daemon does not understand.
    #[error("unsupported config version {version}, supported: {supported:?}")]
    UnsupportedVersion {
        /// Declared version.
        version: i32,
        /// Versions this build accepts.
        supported: &'static [i32],
    },

    /// A field holds a value outside its accepted range.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Config field name.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Buffer memory below the minimum the pipeline can run with.
    #[error("not enough buffer memory allocated, minimum required: {minimum} MB")]
    InsufficientMemory {
        /// Smallest accepted limit in MB.
        minimum: u64,
    },
}

impl ConfigError {
    /// Create an InvalidValue error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
