//! One-validator-one-vote ballots on the Voters threshold
//!
//! Windows are wall-clock timestamps. A ballot can be settled after its end
//! time, or earlier once every current validator has voted.

use lib_consensus::{CycleScheduler, ExecutionContext};
use lib_storage::{keys, StateTx, StorageBackend};
use lib_types::{
    Address, Amount, ChainEvent, CoreError, CoreResult, QuorumState, ThresholdType, Timestamp, VoteChoice,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::book::BallotBook;
use crate::config::SimpleBallotConfig;
use crate::thresholds::ThresholdRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleBallot {
    pub id: u64,
    pub creator: Address,
    pub description: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub proposed_value: Amount,
    /// +1 per Accept, -1 per Reject
    pub progress: i64,
    pub total_voters: u64,
    pub finalized: bool,
    pub quorum_state: QuorumState,
    pub choices: BTreeMap<Address, VoteChoice>,
}

impl SimpleBallot {
    pub fn accepts_votes_at(&self, now: Timestamp) -> bool {
        !self.finalized && now >= self.start_time && now <= self.end_time
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.choices.contains_key(voter)
    }

    /// Every address in `validators` has a recorded choice
    pub fn all_voted(&self, validators: &[Address]) -> bool {
        !validators.is_empty() && validators.iter().all(|v| self.has_voted(v))
    }

    pub fn can_be_finalized_at(&self, now: Timestamp, validators: &[Address]) -> bool {
        !self.finalized && now >= self.start_time && (now > self.end_time || self.all_voted(validators))
    }
}

/// Simple ballot summary for one caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleBallotInfo {
    pub id: u64,
    pub creator: Address,
    pub description: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub proposed_value: Amount,
    pub progress: i64,
    pub total_voters: u64,
    pub finalized: bool,
    pub quorum_state: QuorumState,
    pub can_be_finalized_now: bool,
    pub already_voted: bool,
}

#[derive(Debug, Clone)]
pub struct SimpleBallotEngine {
    config: SimpleBallotConfig,
    scheduler: CycleScheduler,
    registry: ThresholdRegistry,
    book: BallotBook,
}

impl SimpleBallotEngine {
    pub fn new(config: SimpleBallotConfig, scheduler: CycleScheduler, registry: ThresholdRegistry) -> Self {
        Self {
            config,
            scheduler,
            registry,
            book: BallotBook::new(keys::SIMPLE_BALLOTS),
        }
    }

    pub fn config(&self) -> &SimpleBallotConfig {
        &self.config
    }

    pub fn new_ballot<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        creator: Address,
        start_time: Timestamp,
        end_time: Timestamp,
        proposed_value: Amount,
        description: String,
    ) -> CoreResult<u64> {
        let now = ctx.env.timestamp;
        if start_time == 0 || end_time == 0 {
            return Err(CoreError::invalid_argument("start and end time must be set"));
        }
        if start_time <= now || end_time <= start_time {
            return Err(CoreError::invalid_argument(format!(
                "window must satisfy end > start > now ({} > {} > {})",
                end_time, start_time, now
            )));
        }
        let duration = end_time - start_time;
        if duration < self.config.min_duration_secs || duration > self.config.max_duration_secs {
            return Err(CoreError::invalid_argument(format!(
                "duration {}s outside [{}, {}]",
                duration, self.config.min_duration_secs, self.config.max_duration_secs
            )));
        }

        if proposed_value < self.config.min_possible_threshold {
            return Err(CoreError::invalid_argument(format!(
                "proposed voters {} below minimum {}",
                proposed_value, self.config.min_possible_threshold
            )));
        }
        if proposed_value == self.registry.get_threshold(&ctx.state, ThresholdType::Voters)? {
            return Err(CoreError::invalid_argument("proposed voters equals the current value"));
        }
        let proxy = self.registry.proxy_threshold(&ctx.state)?;
        if proposed_value > u128::from(proxy) {
            return Err(CoreError::invalid_argument(format!(
                "proposed voters {} above proxy threshold {}",
                proposed_value, proxy
            )));
        }

        let limit = self.registry.ballot_limit_per_validator(&ctx.state)?;
        let open = self.book.open_count(&ctx.state, &creator)?;
        if open >= limit {
            return Err(CoreError::state_conflict(format!(
                "{} already has {} open simple ballots (limit {})",
                creator, open, limit
            )));
        }

        let id = self.book.allocate_id(&mut ctx.state)?;
        let ballot = SimpleBallot {
            id,
            creator,
            description,
            start_time,
            end_time,
            proposed_value,
            progress: 0,
            total_voters: 0,
            finalized: false,
            quorum_state: QuorumState::InProgress,
            choices: BTreeMap::new(),
        };
        self.book.save(&mut ctx.state, id, &ballot)?;
        self.book.opened(&mut ctx.state, id, &creator)?;

        info!(
            "Simple ballot {} created by {}: voters -> {} over [{}, {}]",
            id, creator, proposed_value, start_time, end_time
        );
        ctx.emit(ChainEvent::SimpleBallotCreated {
            id,
            creator,
            start_time,
            end_time,
        });
        Ok(id)
    }

    pub fn vote<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        voter: Address,
        id: u64,
        choice: VoteChoice,
    ) -> CoreResult<()> {
        let mut ballot: SimpleBallot = self.book.require(&ctx.state, id)?;
        let now = ctx.env.timestamp;
        if ballot.finalized {
            return Err(CoreError::state_conflict(format!("simple ballot {} is finalized", id)));
        }
        if !ballot.accepts_votes_at(now) {
            return Err(CoreError::state_conflict(format!(
                "simple ballot {} accepts votes in [{}, {}], now is {}",
                id, ballot.start_time, ballot.end_time, now
            )));
        }
        if ballot.has_voted(&voter) {
            return Err(CoreError::state_conflict(format!(
                "{} already voted on simple ballot {}",
                voter, id
            )));
        }

        ballot.progress += match choice {
            VoteChoice::Accept => 1,
            VoteChoice::Reject => -1,
        };
        ballot.total_voters += 1;
        ballot.choices.insert(voter, choice);
        self.book.save(&mut ctx.state, id, &ballot)?;

        debug!("{} voted {:?} on simple ballot {} (progress {})", voter, choice, id, ballot.progress);
        ctx.emit(ChainEvent::SimpleVoted { id, voter, choice });
        Ok(())
    }

    /// Settle a ballot; returns its final state
    pub fn finalize<B: StorageBackend>(&self, ctx: &mut ExecutionContext<'_, B>, id: u64) -> CoreResult<QuorumState> {
        let mut ballot: SimpleBallot = self.book.require(&ctx.state, id)?;
        let now = ctx.env.timestamp;
        if ballot.finalized {
            return Err(CoreError::state_conflict(format!("simple ballot {} already finalized", id)));
        }
        if now < ballot.start_time {
            return Err(CoreError::state_conflict(format!(
                "simple ballot {} has not started (starts at {})",
                id, ballot.start_time
            )));
        }
        let validators: Vec<Address> = self.scheduler.cycle_state(&ctx.state)?.distinct_validators().into_iter().collect();
        if !ballot.can_be_finalized_at(now, &validators) {
            return Err(CoreError::state_conflict(format!(
                "simple ballot {} is open until {} and {} of {} validators have voted",
                id,
                ballot.end_time,
                validators.iter().filter(|v| ballot.has_voted(v)).count(),
                validators.len()
            )));
        }

        let voters_threshold = self.registry.get_threshold(&ctx.state, ThresholdType::Voters)?;
        let state = if ballot.progress > 0 && u128::from(ballot.total_voters) >= voters_threshold {
            QuorumState::Accepted
        } else {
            QuorumState::Rejected
        };
        ballot.finalized = true;
        ballot.quorum_state = state;
        self.book.save(&mut ctx.state, id, &ballot)?;
        self.book.closed(&mut ctx.state, id, &ballot.creator)?;

        if state == QuorumState::Accepted {
            self.registry
                .set_threshold(ctx, ballot.proposed_value, ThresholdType::Voters)?;
        }
        info!(
            "Simple ballot {} finalized {:?}: progress={} voters={} threshold={}",
            id, state, ballot.progress, ballot.total_voters, voters_threshold
        );
        ctx.emit(ChainEvent::SimpleBallotFinalized { id, state });
        Ok(state)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn ballot<B: StorageBackend>(&self, state: &StateTx<'_, B>, id: u64) -> CoreResult<Option<SimpleBallot>> {
        self.book.load(state, id)
    }

    pub fn quorum_state<B: StorageBackend>(&self, state: &StateTx<'_, B>, id: u64) -> CoreResult<QuorumState> {
        let ballot: SimpleBallot = self.book.require(state, id)?;
        Ok(ballot.quorum_state)
    }

    pub fn ballot_info<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        id: u64,
        caller: &Address,
        now: Timestamp,
    ) -> CoreResult<SimpleBallotInfo> {
        let ballot: SimpleBallot = self.book.require(state, id)?;
        let validators: Vec<Address> = self.scheduler.cycle_state(state)?.distinct_validators().into_iter().collect();
        Ok(SimpleBallotInfo {
            id: ballot.id,
            creator: ballot.creator,
            description: ballot.description.clone(),
            start_time: ballot.start_time,
            end_time: ballot.end_time,
            proposed_value: ballot.proposed_value,
            progress: ballot.progress,
            total_voters: ballot.total_voters,
            finalized: ballot.finalized,
            quorum_state: ballot.quorum_state,
            can_be_finalized_now: ballot.can_be_finalized_at(now, &validators),
            already_voted: ballot.has_voted(caller),
        })
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::ballot_limit_for;
    use lib_consensus::{AncestorHashEntropy, RotationConfig};
    use lib_storage::MemoryBackend;
    use lib_types::{BlockEnv, BlockHash};
    use std::sync::Arc;

    const DAY: u64 = 24 * 60 * 60;
    const START: u64 = 1_000;
    const END: u64 = START + 3 * DAY;

    fn addr(n: u8) -> Address {
        Address::new([n; 32])
    }

    struct Harness {
        backend: MemoryBackend,
        engine: SimpleBallotEngine,
        registry: ThresholdRegistry,
    }

    impl Harness {
        /// Validators 1..=6; Voters threshold 3, proxy threshold 4
        fn new() -> CoreResult<Self> {
            let scheduler = CycleScheduler::new(Arc::new(AncestorHashEntropy));
            let registry = ThresholdRegistry::new(scheduler.clone());
            let h = Self {
                backend: MemoryBackend::new(),
                engine: SimpleBallotEngine::new(SimpleBallotConfig::default(), scheduler.clone(), registry.clone()),
                registry,
            };
            h.at(0, |h, ctx| {
                scheduler.initialize(ctx, &RotationConfig::default(), (1..=6).map(addr).collect())?;
                h.registry.initialize(ctx, &[3, 10, 100])
            })?;
            Ok(h)
        }

        fn at<T>(
            &self,
            now: Timestamp,
            f: impl FnOnce(&Self, &mut ExecutionContext<'_, MemoryBackend>) -> CoreResult<T>,
        ) -> CoreResult<T> {
            let mut ctx = ExecutionContext::new(&self.backend, BlockEnv::new(1, now, BlockHash::zero()));
            let out = f(self, &mut ctx)?;
            ctx.into_parts().0.commit()?;
            Ok(out)
        }

        fn open(&self, value: Amount) -> CoreResult<u64> {
            self.at(0, |h, ctx| {
                h.engine.new_ballot(ctx, addr(1), START, END, value, "raise voters".to_string())
            })
        }

        fn vote(&self, now: Timestamp, voter: u8, id: u64, choice: VoteChoice) -> CoreResult<()> {
            self.at(now, |h, ctx| h.engine.vote(ctx, addr(voter), id, choice))
        }

        fn finalize(&self, now: Timestamp, id: u64) -> CoreResult<QuorumState> {
            self.at(now, |h, ctx| h.engine.finalize(ctx, id))
        }

        fn voters(&self) -> CoreResult<Amount> {
            self.registry.get_threshold(&StateTx::new(&self.backend), ThresholdType::Voters)
        }
    }

    #[test]
    fn test_new_ballot_validation() -> CoreResult<()> {
        let h = Harness::new()?;
        let open = |start: Timestamp, end: Timestamp, value: Amount| {
            h.at(500, |h, ctx| h.engine.new_ballot(ctx, addr(1), start, end, value, String::new()))
        };

        assert!(matches!(open(0, END, 4), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(open(400, END, 4), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(open(START, START + DAY, 4), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(open(START, START + 15 * DAY, 4), Err(CoreError::InvalidArgument(_))));
        // Below minimum, equal to current, above proxy
        assert!(matches!(open(START, END, 2), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(open(START, END, 3), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(open(START, END, 5), Err(CoreError::InvalidArgument(_))));
        assert_eq!(open(START, END, 4)?, 1);
        Ok(())
    }

    #[test]
    fn test_vote_window_and_progress() -> CoreResult<()> {
        let h = Harness::new()?;
        let id = h.open(4)?;

        assert!(matches!(h.vote(START - 1, 1, id, VoteChoice::Accept), Err(CoreError::StateConflict(_))));
        h.vote(START, 1, id, VoteChoice::Accept)?;
        h.vote(START, 2, id, VoteChoice::Reject)?;
        h.vote(END, 3, id, VoteChoice::Accept)?;
        assert!(matches!(h.vote(END, 3, id, VoteChoice::Accept), Err(CoreError::StateConflict(_))));
        assert!(matches!(h.vote(END + 1, 4, id, VoteChoice::Accept), Err(CoreError::StateConflict(_))));

        let ballot = h.engine.ballot(&StateTx::new(&h.backend), id)?.unwrap();
        assert_eq!(ballot.progress, 1);
        assert_eq!(ballot.total_voters, 3);
        Ok(())
    }

    #[test]
    fn test_finalize_before_end_requires_all_votes() -> CoreResult<()> {
        let h = Harness::new()?;
        let id = h.open(4)?;

        assert!(matches!(h.finalize(START - 1, id), Err(CoreError::StateConflict(_))));
        for n in 1..=5 {
            h.vote(START + 10, n, id, VoteChoice::Accept)?;
        }
        assert!(matches!(h.finalize(START + 20, id), Err(CoreError::StateConflict(_))));

        h.vote(START + 30, 6, id, VoteChoice::Reject)?;
        let info = h.engine.ballot_info(&StateTx::new(&h.backend), id, &addr(6), START + 30)?;
        assert!(info.can_be_finalized_now);
        assert!(info.already_voted);

        assert_eq!(h.finalize(START + 30, id)?, QuorumState::Accepted);
        assert_eq!(h.voters()?, 4);
        assert!(matches!(h.finalize(END + 1, id), Err(CoreError::StateConflict(_))));
        assert_eq!(h.engine.open_ballots_of(&StateTx::new(&h.backend), &addr(1))?, 0);
        Ok(())
    }

    #[test]
    fn test_too_few_voters_rejected() -> CoreResult<()> {
        let h = Harness::new()?;
        let id = h.open(4)?;
        h.vote(START, 1, id, VoteChoice::Accept)?;
        h.vote(START, 2, id, VoteChoice::Accept)?;

        assert_eq!(h.finalize(END + 1, id)?, QuorumState::Rejected);
        assert_eq!(h.voters()?, 3);
        assert_eq!(h.engine.quorum_state(&StateTx::new(&h.backend), id)?, QuorumState::Rejected);
        Ok(())
    }

    #[test]
    fn test_non_positive_progress_rejected() -> CoreResult<()> {
        let h = Harness::new()?;
        let id = h.open(4)?;
        h.vote(START, 1, id, VoteChoice::Accept)?;
        h.vote(START, 2, id, VoteChoice::Reject)?;
        h.vote(START, 3, id, VoteChoice::Accept)?;
        h.vote(START, 4, id, VoteChoice::Reject)?;

        assert_eq!(h.finalize(END + 1, id)?, QuorumState::Rejected);
        Ok(())
    }

    #[test]
    fn test_ballot_limit_per_creator() -> CoreResult<()> {
        let h = Harness::new()?;
        let limit = h.registry.ballot_limit_per_validator(&StateTx::new(&h.backend))?;
        assert_eq!(limit, ballot_limit_for(6));

        let ids = (0..limit).map(|_| h.open(4)).collect::<CoreResult<Vec<u64>>>()?;
        assert!(matches!(h.open(4), Err(CoreError::StateConflict(_))));
        h.at(0, |h, ctx| h.engine.new_ballot(ctx, addr(2), START, END, 4, String::new()))?;

        // Settling one ballot frees its creator's slot
        assert_eq!(h.finalize(END + 1, ids[0])?, QuorumState::Rejected);
        assert_eq!(h.engine.open_ballots_of(&StateTx::new(&h.backend), &addr(1))?, limit - 1);
        h.open(4)?;
        assert!(matches!(h.open(4), Err(CoreError::StateConflict(_))));
        Ok(())
    }

    #[test]
    fn test_missing_ballot() -> CoreResult<()> {
        let h = Harness::new()?;
        assert!(matches!(h.finalize(END, 42), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(h.vote(START, 1, 42, VoteChoice::Accept), Err(CoreError::InvalidArgument(_))));
        Ok(())
    }
}
