//! Store configuration.
//!
//! An optional `cactl.toml` in the store directory overrides the defaults
//! used when new entities, keys and certificates are created.

use crate::error::{PkiError, Result};
use crate::model::FileFormat;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration filename inside the store directory.
pub const CONFIG_FILENAME: &str = "cactl.toml";

/// Longest validity window accepted from a config file, in days.
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// Settings for a store directory.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CactlConfig {
    /// Encoding of generated private keys.
    #[serde(default = "default_format")]
    pub key_format: FileFormat,

    /// Encoding of issued certificates.
    #[serde(default = "default_format")]
    pub cert_format: FileFormat,

    /// Validity window of lazily issued certificates, in days.
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,

    /// Minimum key strength for root and intermediate CAs.
    #[serde(default = "default_ca_min_strength")]
    pub ca_min_strength: u32,

    /// Minimum key strength for servers, clients and email identities.
    #[serde(default = "default_leaf_min_strength")]
    pub leaf_min_strength: u32,
}

impl Default for CactlConfig {
    fn default() -> Self {
        Self {
            key_format: default_format(),
            cert_format: default_format(),
            validity_days: default_validity_days(),
            ca_min_strength: default_ca_min_strength(),
            leaf_min_strength: default_leaf_min_strength(),
        }
    }
}

fn default_format() -> FileFormat {
    FileFormat::Pem
}

fn default_validity_days() -> u32 {
    365
}

fn default_ca_min_strength() -> u32 {
    384
}

fn default_leaf_min_strength() -> u32 {
    256
}

impl CactlConfig {
    /// Path of the config file inside a store directory.
    pub fn path_in(directory: &Path) -> PathBuf {
        directory.join(CONFIG_FILENAME)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: CactlConfig = toml::from_str(text)
            .map_err(|e| PkiError::ConfigError(format!("Failed to parse config: {}", e)))?;

        if config.validity_days == 0 {
            return Err(PkiError::ConfigError(
                "validity_days must be at least 1".to_string(),
            ));
        }
        if config.validity_days > MAX_VALIDITY_DAYS {
            return Err(PkiError::ConfigError(format!(
                "validity_days must be at most {}",
                MAX_VALIDITY_DAYS
            )));
        }

        Ok(config)
    }

    /// Load the configuration for a store directory.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use cactl::config::CactlConfig;
    /// use std::path::Path;
    ///
    /// let config = CactlConfig::load(Path::new("./CA")).unwrap();
    /// assert!(config.validity_days > 0);
    /// ```
    pub fn load(directory: &Path) -> Result<Self> {
        let path = Self::path_in(directory);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }
}
