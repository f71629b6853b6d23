//! Error types for strata-guard
//!
//! The guard primitive itself never produces errors: lock acquisition blocks
//! and reads always succeed, and failures raised by a mutation closure reach
//! the caller unchanged. `GuardError` covers the layers around it:
//! configuration loading, the comparator registry and scope lookups.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for strata-guard operations
pub type GuardResult<T> = std::result::Result<T, GuardError>;

/// Error types for strata-guard
#[derive(Debug, Error)]
pub enum GuardError {
    /// A configuration value failed validation
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Config file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    ConfigIo {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Config text is not valid TOML for `GuardConfig`
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// No comparator is registered for the requested type
    #[error("No comparator registered for type {type_name}")]
    ComparatorMissing {
        /// `std::any::type_name` of the requested type
        type_name: &'static str,
    },

    /// No guard of the requested type is bound on this thread
    #[error("No guarded value of type {type_name} is bound in the current scope")]
    ScopeNotBound {
        /// `std::any::type_name` of the guarded value
        type_name: &'static str,
    },
}

impl GuardError {
    /// Create an `InvalidConfig` error
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        GuardError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error came from configuration handling
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GuardError::InvalidConfig { .. } | GuardError::ConfigIo { .. } | GuardError::ConfigParse(_)
        )
    }
}

impl From<toml::de::Error> for GuardError {
    fn from(e: toml::de::Error) -> Self {
        GuardError::ConfigParse(e.to_string())
    }
}
