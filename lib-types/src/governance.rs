//! Governance enums shared by the registry, both ballot engines and the event log

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CoreError;

/// Typed governance thresholds held by the threshold registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ThresholdType {
    /// Unknown type code; every mutation with it is a silent no-op
    Invalid = 0,
    /// Minimum number of voters for a simple ballot to pass
    Voters = 1,
    /// Per-block reward handed out by the reward collaborator
    BlockReward = 2,
    /// Minimum stake for PendingSet candidacy
    MinStake = 3,
}

impl ThresholdType {
    /// Valid types in `initialize` order
    pub const ALL: [ThresholdType; 3] = [
        ThresholdType::Voters,
        ThresholdType::BlockReward,
        ThresholdType::MinStake,
    ];

    /// Decode a raw type code; unknown codes map to `Invalid`
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ThresholdType::Voters,
            2 => ThresholdType::BlockReward,
            3 => ThresholdType::MinStake,
            _ => ThresholdType::Invalid,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_valid(self) -> bool {
        self != ThresholdType::Invalid
    }
}

impl fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThresholdType::Invalid => "invalid",
            ThresholdType::Voters => "voters",
            ThresholdType::BlockReward => "block_reward",
            ThresholdType::MinStake => "min_stake",
        };
        f.write_str(name)
    }
}

/// Ballot choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoteChoice {
    Accept = 1,
    Reject = 2,
}

impl TryFrom<u8> for VoteChoice {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(VoteChoice::Accept),
            2 => Ok(VoteChoice::Reject),
            other => Err(CoreError::invalid_argument(format!("unknown vote choice {}", other))),
        }
    }
}

/// Outcome state of a ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuorumState {
    InProgress,
    Accepted,
    Rejected,
}

/// Parameters the stake-weighted ballot engine may change
///
/// The Voters threshold is deliberately absent: only the simple ballot
/// engine may change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BallotTarget {
    /// StakeLedger minimum stake (forwarded through the threshold registry)
    MinStake = 1,
    /// BlockReward threshold
    BlockReward = 2,
    /// CycleScheduler cycle length in blocks
    CycleDuration = 3,
}

impl BallotTarget {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for BallotTarget {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(BallotTarget::MinStake),
            2 => Ok(BallotTarget::BlockReward),
            3 => Ok(BallotTarget::CycleDuration),
            other => Err(CoreError::invalid_argument(format!("unknown ballot target {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_codes() {
        for ty in ThresholdType::ALL {
            assert_eq!(ThresholdType::from_code(ty.code()), ty);
            assert!(ty.is_valid());
        }
        assert_eq!(ThresholdType::from_code(0), ThresholdType::Invalid);
        assert_eq!(ThresholdType::from_code(42), ThresholdType::Invalid);
        assert!(!ThresholdType::Invalid.is_valid());
    }

    #[test]
    fn test_vote_choice_decoding() {
        assert_eq!(VoteChoice::try_from(1).unwrap(), VoteChoice::Accept);
        assert_eq!(VoteChoice::try_from(2).unwrap(), VoteChoice::Reject);
        assert!(matches!(VoteChoice::try_from(0), Err(CoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_ballot_target_decoding() {
        assert_eq!(BallotTarget::try_from(3).unwrap(), BallotTarget::CycleDuration);
        assert!(matches!(BallotTarget::try_from(9), Err(CoreError::InvalidArgument(_))));
    }
}
