//! Stake-weighted ballot types

use lib_types::{Address, Amount, BallotTarget, BlockHeight, QuorumState, VoteChoice};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position of a ballot in its lifecycle at a given block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallotPhase {
    /// Created, voting not yet open
    Pending,
    /// Voting open: `start_block <= block <= end_block`
    Active,
    /// Window over, waiting for the cycle-end tally
    Closed,
    Finalized,
}

/// Stake-weighted ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub id: u64,
    pub creator: Address,
    pub description: String,
    pub target: BallotTarget,
    pub proposed_value: Amount,
    pub created_at: BlockHeight,
    pub start_block: BlockHeight,
    pub end_block: BlockHeight,
    /// Stake of Accept voters at tally time
    pub accepted: Amount,
    /// Stake of Reject voters at tally time
    pub rejected: Amount,
    /// Rejected because turnout missed the quorum bar
    pub below_turnout: bool,
    pub finalized: bool,
    pub quorum_state: QuorumState,
    pub choices: BTreeMap<Address, VoteChoice>,
}

impl Ballot {
    pub fn phase_at(&self, block: BlockHeight) -> BallotPhase {
        if self.finalized {
            BallotPhase::Finalized
        } else if block < self.start_block {
            BallotPhase::Pending
        } else if block <= self.end_block {
            BallotPhase::Active
        } else {
            BallotPhase::Closed
        }
    }

    pub fn accepts_votes_at(&self, block: BlockHeight) -> bool {
        !self.finalized && block >= self.start_block && block <= self.end_block
    }

    /// Window reached its end; the next cycle-end tally will settle it
    pub fn can_be_finalized_at(&self, block: BlockHeight) -> bool {
        !self.finalized && block >= self.end_block
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.choices.contains_key(voter)
    }
}

/// Ballot summary for one caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotInfo {
    pub id: u64,
    pub creator: Address,
    pub description: String,
    pub target: BallotTarget,
    pub proposed_value: Amount,
    pub start_block: BlockHeight,
    pub end_block: BlockHeight,
    pub accepted: Amount,
    pub rejected: Amount,
    pub voter_count: usize,
    pub quorum_state: QuorumState,
    pub below_turnout: bool,
    pub finalized: bool,
    pub phase: BallotPhase,
    pub already_voted: bool,
    pub can_be_finalized: bool,
}

impl BallotInfo {
    pub fn new(ballot: &Ballot, caller: &Address, block: BlockHeight) -> Self {
        Self {
            id: ballot.id,
            creator: ballot.creator,
            description: ballot.description.clone(),
            target: ballot.target,
            proposed_value: ballot.proposed_value,
            start_block: ballot.start_block,
            end_block: ballot.end_block,
            accepted: ballot.accepted,
            rejected: ballot.rejected,
            voter_count: ballot.choices.len(),
            quorum_state: ballot.quorum_state,
            below_turnout: ballot.below_turnout,
            finalized: ballot.finalized,
            phase: ballot.phase_at(block),
            already_voted: ballot.has_voted(caller),
            can_be_finalized: ballot.can_be_finalized_at(block),
        }
    }
}
