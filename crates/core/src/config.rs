//! Guard configuration via TOML
//!
//! A guard works with `GuardConfig::default()`; the config only tunes how the
//! guard reports itself and how it behaves when a panic unwinds through a
//! root commit.

use crate::error::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default label used in log fields
pub const DEFAULT_LABEL: &str = "guarded-value";

/// Default nesting depth above which a warning is logged
pub const DEFAULT_WARN_DEPTH: usize = 64;

/// Guard configuration
///
/// # Example
///
/// ```toml
/// # Name reported in log fields
/// label = "comparators"
///
/// # Log a warning when nested scoped mutations go deeper than this
/// warn_depth = 64
///
/// # Fire the change callback for commits made while a panic unwinds
/// notify_on_unwind = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Name reported in log fields
    #[serde(default = "default_label")]
    pub label: String,
    /// Nesting depth above which a warning is logged
    #[serde(default = "default_warn_depth")]
    pub warn_depth: usize,
    /// Fire the change callback for root commits performed during unwinding
    #[serde(default)]
    pub notify_on_unwind: bool,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

fn default_warn_depth() -> usize {
    DEFAULT_WARN_DEPTH
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            warn_depth: default_warn_depth(),
            notify_on_unwind: false,
        }
    }
}

impl GuardConfig {
    /// Config with a custom label and defaults otherwise
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Check field constraints
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the label is empty or `warn_depth` is zero
    /// or `usize::MAX`.
    pub fn validate(&self) -> GuardResult<()> {
        if self.label.trim().is_empty() {
            return Err(GuardError::invalid_config("label", "must not be empty"));
        }
        if self.warn_depth == 0 {
            return Err(GuardError::invalid_config("warn_depth", "must be at least 1"));
        }
        if self.warn_depth.checked_add(1).is_none() {
            return Err(GuardError::invalid_config(
                "warn_depth",
                "must be below usize::MAX",
            ));
        }
        Ok(())
    }

    /// Parse and validate config from TOML text
    pub fn from_toml_str(content: &str) -> GuardResult<Self> {
        let config: GuardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> GuardResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GuardError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize this config to TOML
    pub fn to_toml_string(&self) -> GuardResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GuardError::ConfigParse(format!("Failed to serialize config: {}", e)))
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# strata-guard configuration
#
# Name reported in log fields
label = "guarded-value"

# Log a warning when nested scoped mutations go deeper than this (>= 1)
warn_depth = 64

# Fire the change callback for root commits made while a panic unwinds
notify_on_unwind = false
"#
    }
}
