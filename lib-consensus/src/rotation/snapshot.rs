//! Candidate snapshots captured during a cycle

use lib_types::{Address, Amount, BlockHeight};
use serde::{Deserialize, Serialize};

use super::slots::allocate_slots;

/// PendingSet and stakes as captured at one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Global snapshot id, increasing across cycles
    pub id: u64,
    /// Slot index within the cycle that captured it
    pub slot: u64,
    /// Cycle that captured it
    pub cycle: u64,
    /// Capture block
    pub block: BlockHeight,
    pub validators: Vec<Address>,
    /// Parallel to `validators`
    pub stakes: Vec<Amount>,
}

impl Snapshot {
    pub fn total_stake(&self) -> Amount {
        self.stakes.iter().fold(0u128, |acc, s| acc.saturating_add(*s))
    }

    /// Slot-weighted roster derived from this snapshot
    pub fn weighted_roster(&self) -> Vec<Address> {
        allocate_slots(&self.validators, &self.stakes)
    }
}
