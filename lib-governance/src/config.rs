//! Ballot engine configuration

use serde::{Deserialize, Serialize};

/// Stake-weighted ballot windows, in scheduler cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallotConfig {
    pub min_duration_cycles: u64,
    pub max_duration_cycles: u64,
}

impl Default for BallotConfig {
    fn default() -> Self {
        Self {
            min_duration_cycles: 2,
            max_duration_cycles: 14,
        }
    }
}

impl BallotConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_duration_cycles == 0 {
            return Err("min_duration_cycles must be greater than zero".to_string());
        }
        if self.min_duration_cycles > self.max_duration_cycles {
            return Err(format!(
                "min_duration_cycles {} exceeds max_duration_cycles {}",
                self.min_duration_cycles, self.max_duration_cycles
            ));
        }
        Ok(())
    }
}

/// Simple ballot windows (seconds) and the lowest Voters threshold allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleBallotConfig {
    pub min_duration_secs: u64,
    pub max_duration_secs: u64,
    pub min_possible_threshold: u128,
}

impl Default for SimpleBallotConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 2 * 24 * 60 * 60,  // 2 days
            max_duration_secs: 14 * 24 * 60 * 60, // 14 days
            min_possible_threshold: 3,
        }
    }
}

impl SimpleBallotConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_duration_secs == 0 {
            return Err("min_duration_secs must be greater than zero".to_string());
        }
        if self.min_duration_secs > self.max_duration_secs {
            return Err(format!(
                "min_duration_secs {} exceeds max_duration_secs {}",
                self.min_duration_secs, self.max_duration_secs
            ));
        }
        if self.min_possible_threshold == 0 {
            return Err("min_possible_threshold must be greater than zero".to_string());
        }
        Ok(())
    }
}
