//! Configuration for the ledger simulator

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// First ledger id the store hands out; later ids count up from here
    /// and are never reused
    pub first_ledger_id: u64,

    /// Ensemble size assumed by the short-form create call
    pub default_ensemble_size: usize,

    /// Write quorum assumed by the short-form create call
    pub default_write_quorum: usize,

    /// Ack quorum assumed by the short-form create call
    pub default_ack_quorum: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            first_ledger_id: 3,
            default_ensemble_size: 3,
            default_write_quorum: 2,
            default_ack_quorum: 2,
        }
    }
}

impl SimConfig {
    /// Load from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(id) = std::env::var("LEDGER_SIM_FIRST_ID") {
            if let Ok(id) = id.parse() {
                config.first_ledger_id = id;
            }
        }

        config
    }
}
