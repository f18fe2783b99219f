//! Evaluator configuration, loaded from `evaluator.toml`.
//!
//! ```toml
//! [effective]
//! name = "Effective Policy"
//! id_prefix = "effective"
//!
//! [risk]
//! medium_threshold = 2
//! high_threshold = 4
//! critical_threshold = 6
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::risk::CORE_FACTOR_WEIGHT;

/// Top-level evaluator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Metadata for the synthetic effective policy.
    #[serde(default)]
    pub effective: EffectiveConfig,

    /// Risk-tier score thresholds.
    #[serde(default)]
    pub risk: RiskThresholds,
}

/// Naming of the synthetic effective policy document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectiveConfig {
    /// Display name of the effective policy
    #[serde(default = "default_effective_name")]
    pub name: String,

    /// Prefix for generated effective-policy IDs ("<prefix>-<uuid>")
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            name: default_effective_name(),
            id_prefix: default_id_prefix(),
        }
    }
}

/// Minimum risk score for each tier above `low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskThresholds {
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: u32,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: u32,

    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium_threshold: default_medium_threshold(),
            high_threshold: default_high_threshold(),
            critical_threshold: default_critical_threshold(),
        }
    }
}

fn default_effective_name() -> String {
    "Effective Policy".to_string()
}

fn default_id_prefix() -> String {
    "effective".to_string()
}

fn default_medium_threshold() -> u32 {
    2
}

fn default_high_threshold() -> u32 {
    4
}

fn default_critical_threshold() -> u32 {
    6
}

impl EvaluatorConfig {
    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, PolicyError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load config if the file exists, otherwise use defaults.
    ///
    /// A file that exists but fails to parse or validate is an error: silently
    /// falling back could loosen risk tiers.
    pub fn load_or_default(path: &Path) -> Result<Self, PolicyError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check threshold ordering and that two core risk factors reach `high`.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let risk = &self.risk;
        if risk.medium_threshold == 0 {
            return Err(PolicyError::InvalidConfig {
                reason: "risk.medium_threshold must be at least 1".to_string(),
            });
        }
        if !(risk.medium_threshold <= risk.high_threshold
            && risk.high_threshold <= risk.critical_threshold)
        {
            return Err(PolicyError::InvalidConfig {
                reason: format!(
                    "risk thresholds must be ordered medium <= high <= critical (got {}, {}, {})",
                    risk.medium_threshold, risk.high_threshold, risk.critical_threshold
                ),
            });
        }
        if risk.high_threshold > 2 * CORE_FACTOR_WEIGHT {
            return Err(PolicyError::InvalidConfig {
                reason: format!(
                    "risk.high_threshold {} exceeds {}; two core risk factors must rate high",
                    risk.high_threshold,
                    2 * CORE_FACTOR_WEIGHT
                ),
            });
        }
        if self.effective.id_prefix.trim().is_empty() {
            return Err(PolicyError::InvalidConfig {
                reason: "effective.id_prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
