//! Threshold registry
//!
//! Typed governance parameters plus the two values derived from the live
//! validator count. MinStake is owned by the stake ledger; the registry
//! forwards reads and writes of that type.

use lib_consensus::{CycleScheduler, ExecutionContext, StakeLedger};
use lib_storage::{keys, StateTx, StorageBackend};
use lib_types::{Amount, ChainEvent, CoreError, CoreResult, ThresholdType};
use tracing::{debug, info};

/// Upper bound on open ballots per validator when the roster has one member
pub const MAX_LIMIT_OF_BALLOTS: u64 = 100;

/// Quorum size for `n` distinct validators: a strict majority
pub fn proxy_threshold_for(n: usize) -> u64 {
    n as u64 / 2 + 1
}

/// Open-ballot cap per validator for `n` distinct validators
pub fn ballot_limit_for(n: usize) -> u64 {
    if n == 0 {
        return MAX_LIMIT_OF_BALLOTS;
    }
    (MAX_LIMIT_OF_BALLOTS / n as u64).max(1)
}

#[derive(Debug, Clone)]
pub struct ThresholdRegistry {
    scheduler: CycleScheduler,
    ledger: StakeLedger,
}

impl ThresholdRegistry {
    pub fn new(scheduler: CycleScheduler) -> Self {
        Self {
            scheduler,
            ledger: StakeLedger::new(),
        }
    }

    /// One-time bulk setup; `values` follow `ThresholdType::ALL` order
    pub fn initialize<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        values: &[Amount],
    ) -> CoreResult<()> {
        if self.is_initialized(&ctx.state)? {
            return Err(CoreError::state_conflict("thresholds already initialized"));
        }
        if values.len() != ThresholdType::ALL.len() {
            return Err(CoreError::invalid_argument(format!(
                "expected {} threshold values, got {}",
                ThresholdType::ALL.len(),
                values.len()
            )));
        }
        if values[0] == 0 {
            return Err(CoreError::invalid_argument("voters threshold must be greater than zero"));
        }

        for (ty, value) in ThresholdType::ALL.into_iter().zip(values.iter().copied()) {
            self.store(ctx, ty, value)?;
            ctx.emit(ChainEvent::ThresholdChanged { threshold: ty, value });
        }
        ctx.state.put(keys::thresholds::INITIALIZED, &true)?;
        info!(
            "Thresholds initialized: voters={}, block_reward={}, min_stake={}",
            values[0], values[1], values[2]
        );
        Ok(())
    }

    /// Set one threshold. Returns whether anything changed.
    ///
    /// An invalid type, a zero value or the current value is a silent no-op.
    pub fn set_threshold<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        value: Amount,
        ty: ThresholdType,
    ) -> CoreResult<bool> {
        if !self.is_initialized(&ctx.state)? {
            return Err(CoreError::Uninitialized("threshold registry"));
        }
        if !ty.is_valid() || value == 0 {
            debug!("Ignoring threshold update {}={}", ty, value);
            return Ok(false);
        }
        if self.get_threshold(&ctx.state, ty)? == value {
            debug!("Threshold {} already {}", ty, value);
            return Ok(false);
        }

        self.store(ctx, ty, value)?;
        info!("Threshold {} set to {}", ty, value);
        ctx.emit(ChainEvent::ThresholdChanged { threshold: ty, value });
        Ok(true)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn is_initialized<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<bool> {
        Ok(state.get_or_default(keys::thresholds::INITIALIZED)?)
    }

    /// Current value; zero for `Invalid` and unset types
    pub fn get_threshold<B: StorageBackend>(&self, state: &StateTx<'_, B>, ty: ThresholdType) -> CoreResult<Amount> {
        match ty {
            ThresholdType::Invalid => Ok(0),
            ThresholdType::MinStake => self.ledger.min_stake(state),
            _ => Ok(state.get_or_default(&keys::thresholds::value_key(ty.code()))?),
        }
    }

    /// Strict majority of the distinct CurrentSet, recomputed on every call
    pub fn proxy_threshold<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<u64> {
        Ok(proxy_threshold_for(self.scheduler.validator_count(state)?))
    }

    pub fn ballot_limit_per_validator<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<u64> {
        Ok(ballot_limit_for(self.scheduler.validator_count(state)?))
    }

    fn store<B: StorageBackend>(&self, ctx: &mut ExecutionContext<'_, B>, ty: ThresholdType, value: Amount) -> CoreResult<()> {
        match ty {
            ThresholdType::Invalid => Ok(()),
            ThresholdType::MinStake => self.ledger.set_min_stake(ctx, value),
            _ => {
                ctx.state.put(&keys::thresholds::value_key(ty.code()), &value)?;
                Ok(())
            }
        }
    }
}
