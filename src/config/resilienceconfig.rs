// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience configuration file parser
//!
//! The file maps operation names to retry settings. An entry may name a
//! `preset` to start from and override any of its fields.
//!
//! ```yaml
//! operations:
//!   completion-api:
//!     max_retries: 5
//!   billing-webhook:
//!     preset: payments-api
//!     timeout_ms: 10000
//!     no_retry_patterns:
//!       - duplicate event
//!       - regex: "(?i)signature.*invalid"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::presets::Preset;
use super::retry::{ErrorPattern, RetryConfig, RetryStrategy};
use crate::error::{ResilienceError, Result};

/// Environment variable overriding the config file location.
pub const ENV_RESILIENCE_CONFIG: &str = "RESILIENCE_CONFIG";

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Per-operation settings, keyed by operation name.
    #[serde(default)]
    pub operations: BTreeMap<String, OperationConfig>,
}

/// Settings for one operation. Unset fields come from `preset`, or from
/// `RetryConfig::default()` when no preset is named.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<Preset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RetryStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_retry_patterns: Option<Vec<ErrorPattern>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_retry_patterns: Option<Vec<ErrorPattern>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
}

impl OperationConfig {
    /// Apply the overrides on top of the base configuration.
    #[must_use]
    pub fn resolve(&self) -> RetryConfig {
        let mut config = self.preset.map(Preset::config).unwrap_or_default();
        let policy = &mut config.policy;
        let breaker = &mut config.breaker;

        if let Some(strategy) = self.strategy {
            policy.strategy = strategy;
        }
        if let Some(ms) = self.base_delay_ms {
            policy.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_delay_ms {
            policy.max_delay = Duration::from_millis(ms);
        }
        if let Some(max_retries) = self.max_retries {
            policy.max_retries = max_retries;
        }
        if let Some(jitter) = self.jitter {
            policy.jitter = jitter;
        }
        if let Some(patterns) = &self.no_retry_patterns {
            policy.no_retry_patterns = patterns.clone();
        }
        if let Some(patterns) = &self.always_retry_patterns {
            policy.always_retry_patterns = patterns.clone();
        }
        if let Some(ms) = self.timeout_ms {
            policy.timeout = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.failure_threshold {
            breaker.failure_threshold = threshold;
        }
        if let Some(ms) = self.reset_timeout_ms {
            breaker.reset_timeout = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.success_threshold {
            breaker.success_threshold = threshold;
        }
        config
    }
}

impl ResilienceConfig {
    /// Load configuration from the default location
    /// (`<config dir>/resilience/config.yaml`).
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined, or the
    /// file cannot be read, parsed or validated.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file is malformed YAML
    /// - An entry violates a configuration invariant
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ResilienceError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load configuration honouring `RESILIENCE_CONFIG`.
    ///
    /// A missing file at the default location yields an empty configuration,
    /// so callers fall back to the presets. A path given through the
    /// environment must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read, parsed or validated.
    pub fn load_with_env() -> Result<Self> {
        if let Ok(env_path) = std::env::var(ENV_RESILIENCE_CONFIG) {
            return Self::load_from_path(env_path);
        }

        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            tracing::debug!(
                target: "resilience::config",
                path = %path.display(),
                "no config file, using presets"
            );
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or an entry is invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ResilienceError::Config(format!("Failed to parse config YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every resolved entry.
    ///
    /// # Errors
    ///
    /// Returns the first violation, prefixed with the operation name.
    pub fn validate(&self) -> Result<()> {
        for (name, entry) in &self.operations {
            entry.resolve().validate().map_err(|e| match e {
                ResilienceError::Config(msg) => {
                    ResilienceError::Config(format!("operation '{name}': {msg}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Get the default config file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| {
            ResilienceError::Config("Could not determine config directory".to_string())
        })?;

        Ok(base.join("resilience").join("config.yaml"))
    }

    /// Get the path to the config file, respecting `RESILIENCE_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined when
    /// `RESILIENCE_CONFIG` is not set.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var(ENV_RESILIENCE_CONFIG) {
            Ok(PathBuf::from(env_path))
        } else {
            Self::default_path()
        }
    }

    /// Effective configuration for an operation: the file entry if present,
    /// otherwise the preset registered under that name.
    pub fn config_for(&self, operation_name: &str) -> Option<RetryConfig> {
        self.operations
            .get(operation_name)
            .map(OperationConfig::resolve)
            .or_else(|| Preset::from_operation_name(operation_name).map(Preset::config))
    }

    /// List all configured operation names.
    pub fn operation_names(&self) -> Vec<&String> {
        self.operations.keys().collect()
    }
}
