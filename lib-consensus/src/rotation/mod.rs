//! Validator-set rotation
//!
//! Snapshots of the PendingSet are captured at fixed block intervals during a
//! cycle. At cycle end one snapshot, chosen by the entropy source, is expanded
//! into a slot-weighted roster and handed over in two phases.

pub mod entropy;
pub mod scheduler;
pub mod slots;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use entropy::{AncestorHashEntropy, RandomSource};
pub use scheduler::{CyclePhase, CycleScheduler, CycleState, TickOutcome};
pub use slots::{allocate_slots, slot_counts, VALIDATOR_SLOTS};
pub use snapshot::Snapshot;

/// Cycle timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Blocks per cycle
    pub cycle_duration_blocks: u64,
    /// Snapshots captured per cycle
    pub snapshots_per_cycle: u64,
}

impl RotationConfig {
    /// Blocks between two snapshots
    pub fn blocks_to_snapshot(&self) -> u64 {
        self.cycle_duration_blocks / self.snapshots_per_cycle.max(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.snapshots_per_cycle == 0 {
            return Err("snapshots_per_cycle must be greater than zero".to_string());
        }
        if self.cycle_duration_blocks < self.snapshots_per_cycle {
            return Err(format!(
                "cycle_duration_blocks {} is shorter than snapshots_per_cycle {}",
                self.cycle_duration_blocks, self.snapshots_per_cycle
            ));
        }
        Ok(())
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            cycle_duration_blocks: 17_280, // one day at 5 second blocks
            snapshots_per_cycle: 10,
        }
    }
}
