//! Top-level chain context
//!
//! `Chain` owns the storage handle, the capability table, the current block
//! environment and the event log. Each mutating call runs as one unit:
//! authorize, execute against a `StateTx` overlay, commit with a single batch,
//! then publish the buffered events. A failed call writes nothing and emits
//! nothing.

use lib_consensus::{
    AncestorHashEntropy, CycleScheduler, ExecutionContext, RandomSource, StakeLedger, TickOutcome,
};
use lib_governance::{BallotEngine, SimpleBallotEngine, ThresholdRegistry};
use lib_storage::{keys, StateTx, StorageBackend};
use lib_types::{
    Address, Amount, BallotTarget, BlockEnv, ChainEvent, CoreError, CoreResult, QuorumState, ThresholdType,
    Timestamp, VoteChoice,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::access::{AccessTable, Operation};
use crate::config::ChainConfig;

/// What a block tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Ballots settled by the cycle-end tally
    pub finalized_ballots: Vec<u64>,
}

impl TickReport {
    pub fn cycle_ended(&self) -> bool {
        self.outcome.ended_cycle_roster.is_some()
    }
}

#[derive(Debug)]
pub struct Chain<B: StorageBackend> {
    backend: B,
    config: ChainConfig,
    access: AccessTable,
    ledger: StakeLedger,
    scheduler: CycleScheduler,
    registry: ThresholdRegistry,
    ballots: BallotEngine,
    simple_ballots: SimpleBallotEngine,
    env: BlockEnv,
    events: Vec<ChainEvent>,
}

impl<B: StorageBackend> Chain<B> {
    /// Open a chain over `backend` with ancestor-hash snapshot entropy
    pub fn new(backend: B, config: ChainConfig) -> CoreResult<Self> {
        Self::with_random_source(backend, config, Arc::new(AncestorHashEntropy))
    }

    pub fn with_random_source(backend: B, config: ChainConfig, random: Arc<dyn RandomSource>) -> CoreResult<Self> {
        config
            .validate()
            .map_err(|e| CoreError::invalid_argument(e.to_string()))?;

        let stored: Option<u32> = StateTx::new(&backend).get(keys::meta::SCHEMA_VERSION)?;
        if let Some(version) = stored {
            if version > keys::meta::CURRENT_SCHEMA_VERSION {
                return Err(CoreError::state_conflict(format!(
                    "store schema version {} is newer than supported version {}",
                    version,
                    keys::meta::CURRENT_SCHEMA_VERSION
                )));
            }
        }

        let scheduler = CycleScheduler::new(random);
        let registry = ThresholdRegistry::new(scheduler.clone());
        let ballots = BallotEngine::new(config.ballots.clone(), scheduler.clone(), registry.clone());
        let simple_ballots = SimpleBallotEngine::new(config.simple_ballots.clone(), scheduler.clone(), registry.clone());

        info!(
            "Chain opened on {} backend (schema {:?}, {} keys)",
            backend.backend_type(),
            stored,
            backend.len()?
        );
        Ok(Self {
            access: AccessTable::new(config.roles.clone()),
            backend,
            config,
            ledger: StakeLedger::new(),
            scheduler,
            registry,
            ballots,
            simple_ballots,
            env: BlockEnv::default(),
            events: Vec::new(),
        })
    }

    /// Set the block environment for subsequent calls; heights never go back
    pub fn begin_block(&mut self, env: BlockEnv) -> CoreResult<()> {
        if env.number < self.env.number {
            return Err(CoreError::invalid_argument(format!(
                "block {} precedes current block {}",
                env.number, self.env.number
            )));
        }
        debug!("Begin block {} at {}", env.number, env.timestamp);
        self.env = env;
        Ok(())
    }

    pub fn env(&self) -> &BlockEnv {
        &self.env
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn flush(&self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// One-time genesis: rotation window, initial CurrentSet and thresholds
    pub fn initialize(&mut self, caller: Address) -> CoreResult<()> {
        self.execute(Operation::Initialize, caller, |chain, ctx| {
            if ctx.state.get_or_default::<bool>(keys::meta::INITIALIZED)? {
                return Err(CoreError::state_conflict("chain already initialized"));
            }
            let genesis = &chain.config.genesis;
            chain
                .scheduler
                .initialize(ctx, &chain.config.rotation, genesis.initial_validators.clone())?;
            chain.registry.initialize(ctx, &genesis.threshold_values())?;
            ctx.state
                .put(keys::meta::SCHEMA_VERSION, &keys::meta::CURRENT_SCHEMA_VERSION)?;
            ctx.state.put(keys::meta::INITIALIZED, &true)?;
            info!(
                "Chain initialized at block {} with {} validators",
                ctx.env.number,
                genesis.initial_validators.len()
            );
            Ok(())
        })
    }

    // =========================================================================
    // Staking
    // =========================================================================

    pub fn stake(&mut self, caller: Address, amount: Amount) -> CoreResult<()> {
        self.execute(Operation::Stake, caller, |chain, ctx| chain.ledger.stake(ctx, caller, amount))
    }

    pub fn delegate(&mut self, caller: Address, validator: Address, amount: Amount) -> CoreResult<()> {
        self.execute(Operation::Delegate, caller, |chain, ctx| {
            chain.ledger.delegate(ctx, caller, validator, amount)
        })
    }

    pub fn withdraw(&mut self, caller: Address, amount: Amount) -> CoreResult<()> {
        self.execute(Operation::Withdraw, caller, |chain, ctx| chain.ledger.withdraw(ctx, caller, amount))
    }

    pub fn withdraw_from(&mut self, caller: Address, validator: Address, amount: Amount) -> CoreResult<()> {
        self.execute(Operation::WithdrawFrom, caller, |chain, ctx| {
            chain.ledger.withdraw_from(ctx, caller, validator, amount)
        })
    }

    // =========================================================================
    // Rotation
    // =========================================================================

    /// Per-block tick: snapshots, cycle end, and the cycle-end ballot tally
    pub fn tick(&mut self, caller: Address) -> CoreResult<TickReport> {
        self.execute(Operation::Tick, caller, |chain, ctx| {
            let outcome = chain.scheduler.tick(ctx)?;
            let finalized_ballots = match &outcome.ended_cycle_roster {
                Some(roster) => chain.ballots.on_cycle_end(ctx, roster)?,
                None => Vec::new(),
            };
            Ok(TickReport {
                outcome,
                finalized_ballots,
            })
        })
    }

    pub fn notify_handoff(&mut self, caller: Address) -> CoreResult<()> {
        self.execute(Operation::NotifyHandoff, caller, |chain, ctx| chain.scheduler.notify_handoff(ctx))
    }

    pub fn finalize_handoff(&mut self, caller: Address) -> CoreResult<()> {
        self.execute(Operation::FinalizeHandoff, caller, |chain, ctx| {
            chain.scheduler.finalize_handoff(ctx)
        })
    }

    // =========================================================================
    // Governance
    // =========================================================================

    pub fn set_threshold(&mut self, caller: Address, value: Amount, ty: ThresholdType) -> CoreResult<bool> {
        self.execute(Operation::SetThreshold(ty), caller, |chain, ctx| {
            chain.registry.set_threshold(ctx, value, ty)
        })
    }

    pub fn new_ballot(
        &mut self,
        caller: Address,
        start_after_cycles: u64,
        duration_cycles: u64,
        target: BallotTarget,
        proposed_value: Amount,
        description: impl Into<String>,
    ) -> CoreResult<u64> {
        let description = description.into();
        self.execute(Operation::NewBallot, caller, |chain, ctx| {
            chain.ballots.new_ballot(
                ctx,
                caller,
                start_after_cycles,
                duration_cycles,
                target,
                proposed_value,
                description,
            )
        })
    }

    pub fn vote(&mut self, caller: Address, id: u64, choice: VoteChoice) -> CoreResult<()> {
        self.execute(Operation::Vote, caller, |chain, ctx| chain.ballots.vote(ctx, caller, id, choice))
    }

    pub fn new_simple_ballot(
        &mut self,
        caller: Address,
        start_time: Timestamp,
        end_time: Timestamp,
        proposed_value: Amount,
        description: impl Into<String>,
    ) -> CoreResult<u64> {
        let description = description.into();
        self.execute(Operation::NewSimpleBallot, caller, |chain, ctx| {
            chain
                .simple_ballots
                .new_ballot(ctx, caller, start_time, end_time, proposed_value, description)
        })
    }

    pub fn simple_vote(&mut self, caller: Address, id: u64, choice: VoteChoice) -> CoreResult<()> {
        self.execute(Operation::SimpleVote, caller, |chain, ctx| {
            chain.simple_ballots.vote(ctx, caller, id, choice)
        })
    }

    pub fn finalize_simple_ballot(&mut self, caller: Address, id: u64) -> CoreResult<QuorumState> {
        self.execute(Operation::FinalizeSimpleBallot, caller, |chain, ctx| {
            chain.simple_ballots.finalize(ctx, id)
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read view of committed state
    pub fn view(&self) -> StateTx<'_, B> {
        StateTx::new(&self.backend)
    }

    pub fn ledger(&self) -> &StakeLedger {
        &self.ledger
    }

    pub fn scheduler(&self) -> &CycleScheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &ThresholdRegistry {
        &self.registry
    }

    pub fn ballots(&self) -> &BallotEngine {
        &self.ballots
    }

    pub fn simple_ballots(&self) -> &SimpleBallotEngine {
        &self.simple_ballots
    }

    pub fn access(&self) -> &AccessTable {
        &self.access
    }

    pub fn is_initialized(&self) -> CoreResult<bool> {
        Ok(self.view().get_or_default(keys::meta::INITIALIZED)?)
    }

    pub fn schema_version(&self) -> CoreResult<Option<u32>> {
        Ok(self.view().get(keys::meta::SCHEMA_VERSION)?)
    }

    pub fn current_validators(&self) -> CoreResult<Vec<Address>> {
        self.scheduler.current_validators(&self.view())
    }

    pub fn pending_validators(&self) -> CoreResult<Vec<Address>> {
        self.ledger.pending_validators(&self.view())
    }

    pub fn stake_amount(&self, validator: &Address) -> CoreResult<Amount> {
        self.ledger.stake_amount(&self.view(), validator)
    }

    pub fn threshold(&self, ty: ThresholdType) -> CoreResult<Amount> {
        self.registry.get_threshold(&self.view(), ty)
    }

    /// Events published by committed calls, oldest first
    pub fn events(&self) -> &[ChainEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<ChainEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    fn execute<T>(
        &mut self,
        op: Operation,
        caller: Address,
        f: impl FnOnce(&Self, &mut ExecutionContext<'_, B>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut ctx = ExecutionContext::new(&self.backend, self.env);
        let result = self.run(op, &caller, &mut ctx, f);

        match result {
            Ok(value) => {
                let (state, events) = ctx.into_parts();
                let writes = state.pending_writes();
                state.commit()?;
                debug!(
                    "{} by {} committed at block {}: {} writes, {} events",
                    op,
                    caller,
                    self.env.number,
                    writes,
                    events.len()
                );
                self.events.extend(events);
                Ok(value)
            }
            Err(err @ CoreError::AccessDenied(_)) => {
                warn!("Rejected privileged call at block {}: {}", self.env.number, err);
                Err(err)
            }
            Err(err) => {
                debug!("{} by {} failed ({}): {}", op, caller, err.kind(), err);
                Err(err)
            }
        }
    }

    fn run<'a, T>(
        &self,
        op: Operation,
        caller: &Address,
        ctx: &mut ExecutionContext<'a, B>,
        f: impl FnOnce(&Self, &mut ExecutionContext<'a, B>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        if op != Operation::Initialize && !ctx.state.get_or_default::<bool>(keys::meta::INITIALIZED)? {
            return Err(CoreError::Uninitialized("chain"));
        }
        let state = &ctx.state;
        self.access
            .authorize(op, caller, || self.scheduler.is_validator(state, caller))?;
        f(self, ctx)
    }
}
