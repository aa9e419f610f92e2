//! Stake-weighted ballot engine
//!
//! Ballots open whole cycles in the future and are settled by the cycle-end
//! tally. Each vote weighs the voter's stake at tally time, and only members of
//! the roster that served during the ending cycle are counted.

use lib_consensus::{CycleScheduler, ExecutionContext, StakeLedger};
use lib_storage::{keys, StateTx, StorageBackend};
use lib_types::{
    Address, Amount, BallotTarget, BlockHeight, ChainEvent, CoreError, CoreResult, QuorumState,
    ThresholdType, VoteChoice,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use super::types::{Ballot, BallotInfo, BallotPhase};
use crate::book::BallotBook;
use crate::config::BallotConfig;
use crate::thresholds::{proxy_threshold_for, ThresholdRegistry};

/// Result of one ballot's tally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyResult {
    pub accepted: Amount,
    pub rejected: Amount,
    pub turnout_ok: bool,
}

impl TallyResult {
    pub fn quorum_state(&self) -> QuorumState {
        if self.accepted > self.rejected && self.turnout_ok {
            QuorumState::Accepted
        } else {
            QuorumState::Rejected
        }
    }
}

/// `turnout / roster_stake >= proxy / n`, without overflow
pub fn clears_turnout(turnout: Amount, roster_stake: Amount, n: u64, proxy: u64) -> bool {
    let (mut turnout, mut roster_stake) = (turnout, roster_stake);
    loop {
        match (
            turnout.checked_mul(u128::from(n)),
            roster_stake.checked_mul(u128::from(proxy)),
        ) {
            (Some(lhs), Some(rhs)) => return lhs >= rhs,
            _ => {
                turnout >>= 1;
                roster_stake >>= 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BallotEngine {
    config: BallotConfig,
    scheduler: CycleScheduler,
    registry: ThresholdRegistry,
    ledger: StakeLedger,
    book: BallotBook,
}

impl BallotEngine {
    pub fn new(config: BallotConfig, scheduler: CycleScheduler, registry: ThresholdRegistry) -> Self {
        Self {
            config,
            scheduler,
            registry,
            ledger: StakeLedger::new(),
            book: BallotBook::new(keys::STAKE_BALLOTS),
        }
    }

    pub fn config(&self) -> &BallotConfig {
        &self.config
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Open a ballot starting `start_after_cycles` cycles after the current one
    pub fn new_ballot<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        creator: Address,
        start_after_cycles: u64,
        duration_cycles: u64,
        target: BallotTarget,
        proposed_value: Amount,
        description: String,
    ) -> CoreResult<u64> {
        if start_after_cycles == 0 {
            return Err(CoreError::invalid_argument("ballot must start at least one cycle ahead"));
        }
        if duration_cycles < self.config.min_duration_cycles || duration_cycles > self.config.max_duration_cycles {
            return Err(CoreError::invalid_argument(format!(
                "duration {} outside [{}, {}] cycles",
                duration_cycles, self.config.min_duration_cycles, self.config.max_duration_cycles
            )));
        }
        if proposed_value == 0 {
            return Err(CoreError::invalid_argument("proposed value must be greater than zero"));
        }
        if target == BallotTarget::CycleDuration {
            let min = self.scheduler.snapshots_per_cycle(&ctx.state)?;
            if proposed_value < u128::from(min) || proposed_value > u128::from(u64::MAX) {
                return Err(CoreError::invalid_argument(format!(
                    "cycle duration {} must be between {} and {}",
                    proposed_value,
                    min,
                    u64::MAX
                )));
            }
        }

        let limit = self.registry.ballot_limit_per_validator(&ctx.state)?;
        let open = self.book.open_count(&ctx.state, &creator)?;
        if open >= limit {
            return Err(CoreError::state_conflict(format!(
                "{} already has {} open ballots (limit {})",
                creator, open, limit
            )));
        }

        let cycle = self.scheduler.cycle_duration(&ctx.state)?;
        let cycle_end = self.scheduler.current_cycle_end(&ctx.state)?;
        let start_block = start_after_cycles
            .checked_mul(cycle)
            .and_then(|offset| cycle_end.checked_add(offset))
            .ok_or_else(|| CoreError::invalid_argument("ballot start overflows block height"))?;
        let end_block = duration_cycles
            .checked_mul(cycle)
            .and_then(|length| start_block.checked_add(length))
            .ok_or_else(|| CoreError::invalid_argument("ballot end overflows block height"))?;

        let id = self.book.allocate_id(&mut ctx.state)?;
        let ballot = Ballot {
            id,
            creator,
            description,
            target,
            proposed_value,
            created_at: ctx.env.number,
            start_block,
            end_block,
            accepted: 0,
            rejected: 0,
            below_turnout: false,
            finalized: false,
            quorum_state: QuorumState::InProgress,
            choices: BTreeMap::new(),
        };
        self.book.save(&mut ctx.state, id, &ballot)?;
        self.book.opened(&mut ctx.state, id, &creator)?;

        info!(
            "Ballot {} created by {}: {:?} -> {} over blocks [{}, {}]",
            id, creator, target, proposed_value, start_block, end_block
        );
        ctx.emit(ChainEvent::BallotCreated {
            id,
            creator,
            target,
            start_block,
            end_block,
        });
        Ok(id)
    }

    /// Record `voter`'s choice; weight is resolved at tally time
    pub fn vote<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        voter: Address,
        id: u64,
        choice: VoteChoice,
    ) -> CoreResult<()> {
        let mut ballot: Ballot = self.book.require(&ctx.state, id)?;
        let block = ctx.env.number;
        if ballot.finalized {
            return Err(CoreError::state_conflict(format!("ballot {} is finalized", id)));
        }
        if !ballot.accepts_votes_at(block) {
            return Err(CoreError::state_conflict(format!(
                "ballot {} accepts votes in [{}, {}], block is {}",
                id, ballot.start_block, ballot.end_block, block
            )));
        }
        if ballot.has_voted(&voter) {
            return Err(CoreError::state_conflict(format!("{} already voted on ballot {}", voter, id)));
        }

        ballot.choices.insert(voter, choice);
        self.book.save(&mut ctx.state, id, &ballot)?;
        debug!("{} voted {:?} on ballot {}", voter, choice, id);
        ctx.emit(ChainEvent::Voted { id, voter, choice });
        Ok(())
    }

    /// Settle every ballot whose window has closed, weighing votes against `roster`.
    ///
    /// Returns the ids finalized by this call.
    pub fn on_cycle_end<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        roster: &[Address],
    ) -> CoreResult<Vec<u64>> {
        let members: BTreeSet<Address> = roster.iter().copied().collect();
        if members.is_empty() {
            warn!("Cycle-end tally skipped: empty roster");
            return Ok(Vec::new());
        }

        let n = members.len();
        let proxy = proxy_threshold_for(n);
        let member_list: Vec<Address> = members.iter().copied().collect();
        let roster_stake = self.ledger.total_stake_of(&ctx.state, &member_list)?;
        let block = ctx.env.number;

        let mut finalized = Vec::new();
        for id in self.book.active(&ctx.state)? {
            let mut ballot: Ballot = self.book.require(&ctx.state, id)?;
            if !ballot.can_be_finalized_at(block) {
                continue;
            }

            let tally = self.tally(&ctx.state, &ballot, &members, roster_stake, proxy)?;
            let state = tally.quorum_state();
            ballot.accepted = tally.accepted;
            ballot.rejected = tally.rejected;
            ballot.below_turnout = state == QuorumState::Rejected && !tally.turnout_ok;
            ballot.quorum_state = state;
            ballot.finalized = true;
            self.book.save(&mut ctx.state, id, &ballot)?;
            self.book.closed(&mut ctx.state, id, &ballot.creator)?;

            info!(
                "Ballot {} finalized {:?}: accepted={} rejected={} roster_stake={} below_turnout={}",
                id, state, tally.accepted, tally.rejected, roster_stake, ballot.below_turnout
            );
            if state == QuorumState::Accepted {
                self.apply(ctx, &ballot)?;
            }
            ctx.emit(ChainEvent::BallotFinalized {
                id,
                state,
                below_turnout: ballot.below_turnout,
            });
            finalized.push(id);
        }
        Ok(finalized)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn ballot<B: StorageBackend>(&self, state: &StateTx<'_, B>, id: u64) -> CoreResult<Option<Ballot>> {
        self.book.load(state, id)
    }

    pub fn quorum_state<B: StorageBackend>(&self, state: &StateTx<'_, B>, id: u64) -> CoreResult<QuorumState> {
        let ballot: Ballot = self.book.require(state, id)?;
        Ok(ballot.quorum_state)
    }

    pub fn ballot_info<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        id: u64,
        caller: &Address,
        block: BlockHeight,
    ) -> CoreResult<BallotInfo> {
        let ballot: Ballot = self.book.require(state, id)?;
        Ok(BallotInfo::new(&ballot, caller, block))
    }

    pub fn ballot_phase<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        id: u64,
        block: BlockHeight,
    ) -> CoreResult<BallotPhase> {
        let ballot: Ballot = self.book.require(state, id)?;
        Ok(ballot.phase_at(block))
    }

    pub fn active_ballots<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<Vec<u64>> {
        self.book.active(state)
    }

    pub fn open_ballots_of<B: StorageBackend>(&self, state: &StateTx<'_, B>, creator: &Address) -> CoreResult<u64> {
        self.book.open_count(state, creator)
    }

    pub fn next_ballot_id<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<u64> {
        self.book.next_id(state)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn tally<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        ballot: &Ballot,
        members: &BTreeSet<Address>,
        roster_stake: Amount,
        proxy: u64,
    ) -> CoreResult<TallyResult> {
        let mut accepted: Amount = 0;
        let mut rejected: Amount = 0;
        for (voter, choice) in &ballot.choices {
            if !members.contains(voter) {
                continue;
            }
            let weight = self.ledger.stake_amount(state, voter)?;
            let side = match choice {
                VoteChoice::Accept => &mut accepted,
                VoteChoice::Reject => &mut rejected,
            };
            *side = side.saturating_add(weight);
        }

        let turnout = accepted.saturating_add(rejected);
        Ok(TallyResult {
            accepted,
            rejected,
            turnout_ok: clears_turnout(turnout, roster_stake, members.len() as u64, proxy),
        })
    }

    fn apply<B: StorageBackend>(&self, ctx: &mut ExecutionContext<'_, B>, ballot: &Ballot) -> CoreResult<()> {
        match ballot.target {
            BallotTarget::MinStake => {
                self.registry
                    .set_threshold(ctx, ballot.proposed_value, ThresholdType::MinStake)?;
            }
            BallotTarget::BlockReward => {
                self.registry
                    .set_threshold(ctx, ballot.proposed_value, ThresholdType::BlockReward)?;
            }
            BallotTarget::CycleDuration => {
                let blocks = u64::try_from(ballot.proposed_value)
                    .map_err(|_| CoreError::invalid_argument("cycle duration exceeds u64"))?;
                self.scheduler.set_cycle_duration(ctx, blocks)?;
            }
        }
        Ok(())
    }
}
