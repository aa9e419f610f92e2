//! Chain events
//!
//! Events are buffered per call and published only when the call commits.

use serde::{Deserialize, Serialize};

use crate::governance::{BallotTarget, QuorumState, ThresholdType, VoteChoice};
use crate::primitives::{Address, Amount, BlockHash, BlockHeight, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    // =========================================================================
    // Staking
    // =========================================================================
    Staked {
        validator: Address,
        delegator: Address,
        amount: Amount,
    },
    Withdrawn {
        validator: Address,
        delegator: Address,
        amount: Amount,
    },
    CandidateAdded {
        validator: Address,
    },
    CandidateRemoved {
        validator: Address,
    },

    // =========================================================================
    // Rotation
    // =========================================================================
    SnapshotTaken {
        id: u64,
        slot: u64,
        block: BlockHeight,
        validators: usize,
    },
    HandoffPrepared {
        slot: u64,
        roster_len: usize,
    },
    /// New roster announced for consensus clients
    InitiateChange {
        parent_hash: BlockHash,
        roster: Vec<Address>,
    },
    RosterFinalized {
        roster: Vec<Address>,
    },
    CycleDurationChanged {
        blocks: u64,
    },

    // =========================================================================
    // Governance
    // =========================================================================
    ThresholdChanged {
        threshold: ThresholdType,
        value: Amount,
    },
    BallotCreated {
        id: u64,
        creator: Address,
        target: BallotTarget,
        start_block: BlockHeight,
        end_block: BlockHeight,
    },
    Voted {
        id: u64,
        voter: Address,
        choice: VoteChoice,
    },
    BallotFinalized {
        id: u64,
        state: QuorumState,
        below_turnout: bool,
    },
    SimpleBallotCreated {
        id: u64,
        creator: Address,
        start_time: Timestamp,
        end_time: Timestamp,
    },
    SimpleVoted {
        id: u64,
        voter: Address,
        choice: VoteChoice,
    },
    SimpleBallotFinalized {
        id: u64,
        state: QuorumState,
    },
}
