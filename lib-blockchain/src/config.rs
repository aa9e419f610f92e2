//! Chain configuration
//!
//! Loaded from TOML. Every section is optional and falls back to its defaults,
//! but role bindings and the genesis validator list must be supplied before
//! `validate()` passes.
//!
//! ```toml
//! [rotation]
//! cycle_duration_blocks = 17280
//! snapshots_per_cycle = 10
//!
//! [roles]
//! owner = "0101..."
//!
//! [genesis]
//! voters = 3
//! initial_validators = ["0a0a..."]
//! ```

use lib_consensus::RotationConfig;
use lib_governance::{BallotConfig, SimpleBallotConfig};
use lib_types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::access::RoleBindings;

/// Configuration error
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Values written by `Chain::initialize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub voters: Amount,
    pub block_reward: Amount,
    pub min_stake: Amount,
    pub initial_validators: Vec<Address>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            voters: 3,
            block_reward: 0,
            min_stake: 1,
            initial_validators: Vec::new(),
        }
    }
}

impl GenesisConfig {
    /// Threshold values in registry order: Voters, BlockReward, MinStake
    pub fn threshold_values(&self) -> [Amount; 3] {
        [self.voters, self.block_reward, self.min_stake]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rotation: RotationConfig,
    pub ballots: BallotConfig,
    pub simple_ballots: SimpleBallotConfig,
    pub roles: RoleBindings,
    pub genesis: GenesisConfig,
}

impl ChainConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ChainConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(
            "Loaded chain configuration from {}: cycle {} blocks, {} genesis validators",
            path.display(),
            config.rotation.cycle_duration_blocks,
            config.genesis.initial_validators.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sections = [
            ("rotation", self.rotation.validate()),
            ("ballots", self.ballots.validate()),
            ("simple_ballots", self.simple_ballots.validate()),
            ("roles", self.roles.validate()),
        ];
        for (section, result) in sections {
            result.map_err(|reason| ConfigError::Invalid(format!("[{}] {}", section, reason)))?;
        }

        if self.genesis.voters == 0 {
            return Err(ConfigError::Invalid("[genesis] voters must be greater than zero".to_string()));
        }
        if self.genesis.initial_validators.is_empty() {
            return Err(ConfigError::Invalid("[genesis] initial_validators is empty".to_string()));
        }
        if self.genesis.initial_validators.iter().any(Address::is_zero) {
            return Err(ConfigError::Invalid(
                "[genesis] initial_validators contains the null address".to_string(),
            ));
        }
        Ok(())
    }
}
