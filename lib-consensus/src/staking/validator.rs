//! Validator records

use lib_types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted stake record of one validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    /// Validator address
    pub address: Address,
    /// Aggregate stake: sum of every delegator's balance, including self-stake
    pub stake: Amount,
    /// Balance per depositor (the validator itself appears for self-stake)
    pub delegators: BTreeMap<Address, Amount>,
}

impl ValidatorRecord {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            stake: 0,
            delegators: BTreeMap::new(),
        }
    }

    /// Amount `delegator` has deposited with this validator
    pub fn delegated_by(&self, delegator: &Address) -> Amount {
        self.delegators.get(delegator).copied().unwrap_or(0)
    }

    /// Self-stake of the validator
    pub fn self_stake(&self) -> Amount {
        self.delegated_by(&self.address)
    }

    pub fn is_empty(&self) -> bool {
        self.stake == 0 && self.delegators.is_empty()
    }
}

/// Read-only view combining stake, candidacy and roster membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub address: Address,
    pub stake: Amount,
    pub delegator_count: usize,
    pub is_pending: bool,
    /// Position in the PendingSet
    pub pending_index: Option<usize>,
    /// Member of the CurrentSet
    pub is_current: bool,
}
