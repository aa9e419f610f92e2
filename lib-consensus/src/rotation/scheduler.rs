//! Cycle scheduler
//!
//! Block-driven state machine that samples the PendingSet several times per
//! cycle, picks one sample at cycle end and hands the resulting roster over in
//! two phases: `notify_handoff` announces it, `finalize_handoff` installs it.

use lib_storage::{keys, StateTx, StorageBackend};
use lib_types::{Address, BlockHeight, ChainEvent, CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::entropy::RandomSource;
use super::snapshot::Snapshot;
use super::RotationConfig;
use crate::context::ExecutionContext;
use crate::staking::StakeLedger;

/// Handoff phase of the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    /// Window open, nothing sampled yet
    Idle,
    /// At least one snapshot captured in this window
    Sampling,
    /// A new roster is waiting for `finalize_handoff`
    PendingHandoff,
    /// The last handoff was finalized
    Finalized,
}

/// Persisted scheduler state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    pub phase: CyclePhase,
    pub cycle_number: u64,
    pub cycle_start: BlockHeight,
    pub cycle_end: BlockHeight,
    /// Applied at the next window roll
    pub cycle_duration_blocks: u64,
    pub snapshots_per_cycle: u64,
    pub last_snapshot_block: BlockHeight,
    pub snapshots_in_cycle: u64,
    pub next_snapshot_id: u64,
    pub handoff_ready: bool,
    pub pending_roster: Vec<Address>,
    /// Slot-weighted CurrentSet; addresses may repeat
    pub current_validators: Vec<Address>,
}

impl CycleState {
    pub fn blocks_to_snapshot(&self) -> u64 {
        self.cycle_duration_blocks / self.snapshots_per_cycle.max(1)
    }

    /// Distinct addresses in the CurrentSet
    pub fn distinct_validators(&self) -> BTreeSet<Address> {
        self.current_validators.iter().copied().collect()
    }

    fn sampling_open(&self, block: BlockHeight) -> bool {
        block.saturating_sub(self.last_snapshot_block) >= self.blocks_to_snapshot()
            && self.snapshots_in_cycle < self.snapshots_per_cycle
            && block <= self.cycle_end
    }
}

/// What a tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Slot of the snapshot captured by this tick
    pub snapshot_slot: Option<u64>,
    /// CurrentSet in force during the cycle that just ended
    pub ended_cycle_roster: Option<Vec<Address>>,
    /// A new roster was staged for handoff
    pub handoff_prepared: bool,
}

/// Validator-set rotation driven by block ticks
#[derive(Debug, Clone)]
pub struct CycleScheduler {
    random: Arc<dyn RandomSource>,
    ledger: StakeLedger,
}

impl CycleScheduler {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self {
            random,
            ledger: StakeLedger::new(),
        }
    }

    /// One-time setup: first window starts at the current block
    pub fn initialize<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        config: &RotationConfig,
        initial_validators: Vec<Address>,
    ) -> CoreResult<()> {
        if ctx.state.contains_key(keys::rotation::CYCLE_STATE)? {
            return Err(CoreError::state_conflict("cycle scheduler already initialized"));
        }
        config.validate().map_err(CoreError::invalid_argument)?;
        if initial_validators.is_empty() {
            return Err(CoreError::invalid_argument("initial validator set is empty"));
        }
        if initial_validators.iter().any(Address::is_zero) {
            return Err(CoreError::invalid_argument("initial validator set contains the null address"));
        }

        let block = ctx.env.number;
        let state = CycleState {
            phase: CyclePhase::Idle,
            cycle_number: 0,
            cycle_start: block,
            cycle_end: block.saturating_add(config.cycle_duration_blocks),
            cycle_duration_blocks: config.cycle_duration_blocks,
            snapshots_per_cycle: config.snapshots_per_cycle,
            last_snapshot_block: block,
            snapshots_in_cycle: 0,
            next_snapshot_id: 0,
            handoff_ready: false,
            pending_roster: Vec::new(),
            current_validators: initial_validators,
        };
        info!(
            "Cycle scheduler initialized: window [{}, {}], {} snapshots per cycle",
            state.cycle_start, state.cycle_end, state.snapshots_per_cycle
        );
        self.save_state(&mut ctx.state, &state)
    }

    // =========================================================================
    // Block-driven transitions
    // =========================================================================

    /// Advance the scheduler for the current block
    pub fn tick<B: StorageBackend>(&self, ctx: &mut ExecutionContext<'_, B>) -> CoreResult<TickOutcome> {
        let mut state = self.load_state(&ctx.state)?;
        let block = ctx.env.number;
        let mut outcome = TickOutcome::default();

        if state.sampling_open(block) {
            outcome.snapshot_slot = Some(self.take_snapshot(ctx, &mut state)?);
        }

        if block >= state.cycle_end {
            outcome.ended_cycle_roster = Some(state.current_validators.clone());
            outcome.handoff_prepared = self.prepare_handoff(ctx, &mut state)?;
            self.roll_window(&mut state, block);
        }

        self.save_state(&mut ctx.state, &state)?;
        Ok(outcome)
    }

    /// Announce the staged roster to consensus clients
    pub fn notify_handoff<B: StorageBackend>(&self, ctx: &mut ExecutionContext<'_, B>) -> CoreResult<()> {
        let mut state = self.load_state(&ctx.state)?;
        if !state.handoff_ready {
            return Err(CoreError::state_conflict("no handoff is ready"));
        }
        if state.pending_roster.is_empty() {
            return Err(CoreError::state_conflict("pending roster is empty"));
        }

        state.handoff_ready = false;
        info!(
            "Handoff announced: {} slots, parent {}",
            state.pending_roster.len(),
            ctx.env.parent_hash
        );
        ctx.emit(ChainEvent::InitiateChange {
            parent_hash: ctx.env.parent_hash,
            roster: state.pending_roster.clone(),
        });
        self.save_state(&mut ctx.state, &state)
    }

    /// Install the staged roster, if any, and mark the cycle finalized
    pub fn finalize_handoff<B: StorageBackend>(&self, ctx: &mut ExecutionContext<'_, B>) -> CoreResult<()> {
        let mut state = self.load_state(&ctx.state)?;
        if state.phase == CyclePhase::Finalized {
            return Err(CoreError::state_conflict("handoff already finalized"));
        }

        if state.pending_roster.is_empty() {
            debug!("Finalizing cycle {} without a pending roster", state.cycle_number);
        } else {
            state.current_validators = std::mem::take(&mut state.pending_roster);
            info!(
                "CurrentSet replaced: {} slots, {} distinct validators",
                state.current_validators.len(),
                state.distinct_validators().len()
            );
            ctx.emit(ChainEvent::RosterFinalized {
                roster: state.current_validators.clone(),
            });
        }
        state.handoff_ready = false;
        state.phase = CyclePhase::Finalized;
        self.save_state(&mut ctx.state, &state)
    }

    /// Change the cycle length; applies from the next window roll
    pub fn set_cycle_duration<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        blocks: u64,
    ) -> CoreResult<()> {
        let mut state = self.load_state(&ctx.state)?;
        if blocks < state.snapshots_per_cycle {
            return Err(CoreError::invalid_argument(format!(
                "cycle duration {} is shorter than {} snapshots per cycle",
                blocks, state.snapshots_per_cycle
            )));
        }
        state.cycle_duration_blocks = blocks;
        info!("Cycle duration set to {} blocks", blocks);
        ctx.emit(ChainEvent::CycleDurationChanged { blocks });
        self.save_state(&mut ctx.state, &state)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn is_initialized<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<bool> {
        Ok(state.contains_key(keys::rotation::CYCLE_STATE)?)
    }

    pub fn cycle_state<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<CycleState> {
        self.load_state(state)
    }

    pub fn current_validators<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<Vec<Address>> {
        Ok(self.load_state(state)?.current_validators)
    }

    /// Number of distinct addresses in the CurrentSet
    pub fn validator_count<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<usize> {
        Ok(self.load_state(state)?.distinct_validators().len())
    }

    pub fn is_validator<B: StorageBackend>(&self, state: &StateTx<'_, B>, address: &Address) -> CoreResult<bool> {
        Ok(self.load_state(state)?.current_validators.contains(address))
    }

    pub fn pending_roster<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<Vec<Address>> {
        Ok(self.load_state(state)?.pending_roster)
    }

    pub fn handoff_ready<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<bool> {
        Ok(self.load_state(state)?.handoff_ready)
    }

    pub fn phase<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<CyclePhase> {
        Ok(self.load_state(state)?.phase)
    }

    pub fn current_cycle_start<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<BlockHeight> {
        Ok(self.load_state(state)?.cycle_start)
    }

    pub fn current_cycle_end<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<BlockHeight> {
        Ok(self.load_state(state)?.cycle_end)
    }

    pub fn cycle_duration<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<u64> {
        Ok(self.load_state(state)?.cycle_duration_blocks)
    }

    pub fn snapshots_per_cycle<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<u64> {
        Ok(self.load_state(state)?.snapshots_per_cycle)
    }

    pub fn blocks_to_snapshot<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<u64> {
        Ok(self.load_state(state)?.blocks_to_snapshot())
    }

    pub fn cycle_number<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<u64> {
        Ok(self.load_state(state)?.cycle_number)
    }

    pub fn snapshot<B: StorageBackend>(&self, state: &StateTx<'_, B>, slot: u64) -> CoreResult<Option<Snapshot>> {
        Ok(state.get(&keys::rotation::snapshot_key(slot))?)
    }

    /// Weighted roster of the snapshot in `slot`; empty when absent or unstaked.
    ///
    /// Slots are reused every cycle, so a slot the running cycle has not
    /// sampled yet still holds an earlier cycle's snapshot. Use `snapshot` and
    /// its `cycle` field to tell them apart.
    pub fn validator_set_from_snapshot<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        slot: u64,
    ) -> CoreResult<Vec<Address>> {
        Ok(self
            .snapshot(state, slot)?
            .map(|s| s.weighted_roster())
            .unwrap_or_default())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn take_snapshot<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        state: &mut CycleState,
    ) -> CoreResult<u64> {
        let block = ctx.env.number;
        let validators = self.ledger.pending_validators(&ctx.state)?;
        let stakes = validators
            .iter()
            .map(|v| self.ledger.stake_amount(&ctx.state, v))
            .collect::<CoreResult<Vec<_>>>()?;

        let slot = state.snapshots_in_cycle;
        let snapshot = Snapshot {
            id: state.next_snapshot_id,
            slot,
            cycle: state.cycle_number,
            block,
            validators,
            stakes,
        };
        ctx.state.put(&keys::rotation::snapshot_key(slot), &snapshot)?;

        info!(
            "Snapshot {} taken at block {} (slot {}, {} validators)",
            snapshot.id,
            block,
            slot,
            snapshot.validators.len()
        );
        ctx.emit(ChainEvent::SnapshotTaken {
            id: snapshot.id,
            slot,
            block,
            validators: snapshot.validators.len(),
        });

        state.last_snapshot_block = block;
        state.snapshots_in_cycle += 1;
        state.next_snapshot_id += 1;
        if matches!(state.phase, CyclePhase::Idle | CyclePhase::Finalized) {
            state.phase = CyclePhase::Sampling;
        }
        Ok(slot)
    }

    fn prepare_handoff<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        state: &mut CycleState,
    ) -> CoreResult<bool> {
        if state.snapshots_in_cycle == 0 {
            warn!("Cycle {} ended without snapshots; CurrentSet stays", state.cycle_number);
            return Ok(false);
        }

        let slot = self
            .random
            .random_index(&ctx.env, 0, state.snapshots_in_cycle - 1);
        let roster = self.validator_set_from_snapshot(&ctx.state, slot)?;
        if roster.is_empty() {
            warn!(
                "Cycle {} selected snapshot slot {} with no stake; CurrentSet stays",
                state.cycle_number, slot
            );
            return Ok(false);
        }

        info!(
            "Cycle {} ended: snapshot slot {} selected, {} slots staged",
            state.cycle_number,
            slot,
            roster.len()
        );
        ctx.emit(ChainEvent::HandoffPrepared {
            slot,
            roster_len: roster.len(),
        });
        state.pending_roster = roster;
        state.handoff_ready = true;
        state.phase = CyclePhase::PendingHandoff;
        Ok(true)
    }

    fn roll_window(&self, state: &mut CycleState, block: BlockHeight) {
        state.cycle_start = block;
        state.cycle_end = block.saturating_add(state.cycle_duration_blocks);
        state.last_snapshot_block = block;
        state.snapshots_in_cycle = 0;
        state.cycle_number += 1;
        if matches!(state.phase, CyclePhase::Sampling | CyclePhase::Finalized) {
            state.phase = CyclePhase::Idle;
        }
        debug!(
            "Cycle {} window [{}, {}]",
            state.cycle_number, state.cycle_start, state.cycle_end
        );
    }

    fn load_state<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<CycleState> {
        state
            .get(keys::rotation::CYCLE_STATE)?
            .ok_or(CoreError::Uninitialized("cycle scheduler"))
    }

    fn save_state<B: StorageBackend>(&self, state: &mut StateTx<'_, B>, cycle: &CycleState) -> CoreResult<()> {
        state.put(keys::rotation::CYCLE_STATE, cycle)?;
        Ok(())
    }
}
