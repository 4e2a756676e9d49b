//! # Contract Configuration & Constants
//!
//! Fee parameters live here, together with [`VaultConfig`], the per-vault
//! settings supplied at construction. Configuration can be built in code or
//! loaded from JSON; either way it is validated before a vault sees it.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Fee rates are expressed in basis points of this denominator.
/// 10_000 bps = 100%.
pub const RATE_DENOMINATOR: u64 = 10_000;

/// Highest performance fee a vault may charge: 50% of profit.
pub const MAX_PERFORMANCE_FEE_BPS: u64 = 5_000;

/// Performance fee for vaults that do not configure one: 10% of profit.
pub const DEFAULT_PERFORMANCE_FEE_BPS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The performance fee is above [`MAX_PERFORMANCE_FEE_BPS`].
    #[error("performance fee of {rate_bps} bps exceeds the maximum of {max_bps} bps")]
    FeeRateTooHigh {
        /// Requested rate.
        rate_bps: u64,
        /// Allowed maximum.
        max_bps: u64,
    },
}

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Settings for a new vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Performance fee in basis points of realised profit.
    pub performance_fee_bps: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            performance_fee_bps: DEFAULT_PERFORMANCE_FEE_BPS,
        }
    }
}

impl VaultConfig {
    /// A config with the given performance fee.
    pub fn with_performance_fee(performance_fee_bps: u64) -> Self {
        Self {
            performance_fee_bps,
        }
    }

    /// Checks every field against its bounds.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FeeRateTooHigh`] if the fee exceeds the cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.performance_fee_bps > MAX_PERFORMANCE_FEE_BPS {
            return Err(ConfigError::FeeRateTooHigh {
                rate_bps: self.performance_fee_bps,
                max_bps: MAX_PERFORMANCE_FEE_BPS,
            });
        }
        Ok(())
    }

    /// Parses and validates a JSON document. Missing fields take their
    /// defaults; unknown fields are rejected.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("failed to parse vault configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read vault configuration: {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("invalid vault configuration: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fee_constants_sanity() {
        assert!(DEFAULT_PERFORMANCE_FEE_BPS <= MAX_PERFORMANCE_FEE_BPS);
        assert!(MAX_PERFORMANCE_FEE_BPS <= RATE_DENOMINATOR);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(VaultConfig::default().validate().is_ok());
    }

    #[test]
    fn fee_above_cap_rejected() {
        let err = VaultConfig::with_performance_fee(MAX_PERFORMANCE_FEE_BPS + 1)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::FeeRateTooHigh {
                rate_bps: MAX_PERFORMANCE_FEE_BPS + 1,
                max_bps: MAX_PERFORMANCE_FEE_BPS,
            }
        );
    }

    #[test]
    fn json_missing_fields_take_defaults() {
        let config = VaultConfig::from_json_str("{}").unwrap();
        assert_eq!(config, VaultConfig::default());

        let config = VaultConfig::from_json_str(r#"{"performance_fee_bps": 2000}"#).unwrap();
        assert_eq!(config.performance_fee_bps, 2_000);
    }

    #[test]
    fn json_unknown_field_rejected() {
        assert!(VaultConfig::from_json_str(r#"{"management_fee_bps": 10}"#).is_err());
    }

    #[test]
    fn json_invalid_fee_rejected() {
        let err = VaultConfig::from_json_str(r#"{"performance_fee_bps": 9000}"#).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"performance_fee_bps": 1500}}"#).unwrap();

        let config = VaultConfig::load(file.path()).unwrap();
        assert_eq!(config.performance_fee_bps, 1_500);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = VaultConfig::load(&path).unwrap_err();
        assert!(format!("{err}").contains("absent.json"));
    }
}
