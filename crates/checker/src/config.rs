//! Checker configuration.
//!
//! Service-level threshold defaults plus per-limit overrides, loaded from
//! TOML. Configuration is passed explicitly at construction - there are no
//! ambient defaults - and applied to a service's declared limits after
//! `get_limits()`.
//!
//! ```toml
//! warning_threshold = { percent = 80.0 }
//! critical_threshold = { percent = 99.0 }
//! region = "eu-west-1"
//! timeout_secs = 120
//!
//! [limit_overrides]
//! "DB instances" = 100
//!
//! [threshold_overrides."DB snapshots per user"]
//! warning = { count = 10 }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::limit::Threshold;
use crate::services::Service;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not read the configuration file.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file did not parse.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// An override names a limit the service does not declare.
    #[error("unknown limit {name:?} for service {service}")]
    UnknownLimit { service: String, name: String },
}

/// Per-limit threshold override. `None` keeps the service default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdOverride {
    /// Warning threshold for this limit.
    #[serde(default)]
    pub warning: Option<Threshold>,
    /// Critical threshold for this limit.
    #[serde(default)]
    pub critical: Option<Threshold>,
}

/// Service-level defaults and per-limit overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckerConfig {
    /// Warning threshold propagated to every limit unless overridden.
    #[serde(default = "default_warning")]
    pub warning_threshold: Threshold,
    /// Critical threshold propagated to every limit unless overridden.
    #[serde(default = "default_critical")]
    pub critical_threshold: Threshold,
    /// Region to connect to; the provider default region when absent.
    #[serde(default)]
    pub region: Option<String>,
    /// Overall collection timeout in seconds, enforced between pages.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Provider-ceiling overrides by limit name.
    #[serde(default)]
    pub limit_overrides: HashMap<String, u64>,
    /// Threshold overrides by limit name.
    #[serde(default)]
    pub threshold_overrides: HashMap<String, ThresholdOverride>,
}

fn default_warning() -> Threshold {
    Threshold::Percent(80.0)
}

fn default_critical() -> Threshold {
    Threshold::Percent(99.0)
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            warning_threshold: default_warning(),
            critical_threshold: default_critical(),
            region: None,
            timeout_secs: None,
            limit_overrides: HashMap::new(),
            threshold_overrides: HashMap::new(),
        }
    }
}

impl CheckerConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// The collection timeout, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Apply the per-limit overrides to a service's declared limits.
    ///
    /// # Errors
    ///
    /// Returns an error if an override names a limit the service does not
    /// declare - a typo in an override should fail loudly, not be skipped.
    pub fn apply_overrides(&self, service: &mut dyn Service) -> Result<(), ConfigError> {
        let service_name = service.service_name().to_string();
        let limits = service.get_limits();

        for (name, value) in &self.limit_overrides {
            let limit = limits.get_mut(name).ok_or_else(|| ConfigError::UnknownLimit {
                service: service_name.clone(),
                name: name.clone(),
            })?;
            limit.set_limit_override(*value);
        }

        for (name, thresholds) in &self.threshold_overrides {
            let limit = limits.get_mut(name).ok_or_else(|| ConfigError::UnknownLimit {
                service: service_name.clone(),
                name: name.clone(),
            })?;
            limit.override_thresholds(thresholds.warning, thresholds.critical);
        }

        Ok(())
    }
}
