//! Stake ledger and PendingSet candidacy
//!
//! Balances are kept per (delegator, validator) pair. After every balance
//! change the validator's PendingSet membership is recomputed: a validator is a
//! candidate exactly while its stake is non-zero and at least the minimum stake.

use lib_storage::{keys, StateTx, StorageBackend};
use lib_types::{Address, Amount, ChainEvent, CoreError, CoreResult};
use tracing::{debug, info};

use super::validator::{ValidatorInfo, ValidatorRecord};
use crate::context::ExecutionContext;

/// Stake and delegation balances plus PendingSet membership
#[derive(Debug, Clone, Copy, Default)]
pub struct StakeLedger;

impl StakeLedger {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Self-stake `amount` as validator `staker`
    pub fn stake<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        staker: Address,
        amount: Amount,
    ) -> CoreResult<()> {
        self.deposit(ctx, staker, staker, amount)
    }

    /// Deposit `amount` from `delegator` with `validator`
    pub fn delegate<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        delegator: Address,
        validator: Address,
        amount: Amount,
    ) -> CoreResult<()> {
        if validator.is_zero() {
            return Err(CoreError::invalid_argument("delegation target is the null address"));
        }
        self.deposit(ctx, delegator, validator, amount)
    }

    /// Withdraw `amount` of self-stake
    pub fn withdraw<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        staker: Address,
        amount: Amount,
    ) -> CoreResult<()> {
        self.withdraw_from(ctx, staker, staker, amount)
    }

    /// Withdraw `amount` that `delegator` deposited with `validator`
    pub fn withdraw_from<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        delegator: Address,
        validator: Address,
        amount: Amount,
    ) -> CoreResult<()> {
        if amount == 0 {
            return Err(CoreError::invalid_argument("withdrawal amount must be greater than zero"));
        }
        if validator.is_zero() {
            return Err(CoreError::invalid_argument("withdrawal source is the null address"));
        }

        let mut record = self
            .record(&ctx.state, &validator)?
            .ok_or_else(|| CoreError::invalid_argument(format!("no stake recorded for {}", validator)))?;

        let balance = record.delegated_by(&delegator);
        if amount > balance {
            return Err(CoreError::invalid_argument(format!(
                "withdrawal of {} exceeds balance {}",
                amount, balance
            )));
        }

        let remaining = balance - amount;
        if remaining == 0 {
            record.delegators.remove(&delegator);
        } else {
            record.delegators.insert(delegator, remaining);
        }
        // stake is the sum of all balances, so it covers this one
        record.stake -= amount;

        let stake = record.stake;
        self.save_record(&mut ctx.state, record)?;

        debug!("Withdrew {} from {} by {}, stake now {}", amount, validator, delegator, stake);
        ctx.emit(ChainEvent::Withdrawn {
            validator,
            delegator,
            amount,
        });

        self.refresh_candidacy(ctx, validator, stake)
    }

    /// Replace the minimum stake and re-evaluate every validator.
    ///
    /// Members that fall below the new minimum are removed keeping the order of
    /// the survivors; newly qualifying validators are appended in address order.
    pub fn set_min_stake<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        value: Amount,
    ) -> CoreResult<()> {
        ctx.state.put(keys::staking::MIN_STAKE, &value)?;

        let pending = self.pending_validators(&ctx.state)?;
        let mut survivors = Vec::with_capacity(pending.len());
        for validator in pending {
            let stake = self.stake_amount(&ctx.state, &validator)?;
            if qualifies(stake, value) {
                survivors.push(validator);
            } else {
                info!("Validator {} dropped from PendingSet (stake {} < {})", validator, stake, value);
                ctx.emit(ChainEvent::CandidateRemoved { validator });
            }
        }

        for key in ctx.state.keys_with_prefix(keys::staking::VALIDATOR_PREFIX)? {
            let Some(validator) = keys::parse_address_suffix(&key) else {
                continue;
            };
            if survivors.contains(&validator) {
                continue;
            }
            let stake = self.stake_amount(&ctx.state, &validator)?;
            if qualifies(stake, value) {
                info!("Validator {} joined PendingSet (stake {} >= {})", validator, stake, value);
                survivors.push(validator);
                ctx.emit(ChainEvent::CandidateAdded { validator });
            }
        }

        ctx.state.put(keys::staking::PENDING_SET, &survivors)?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn record<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        validator: &Address,
    ) -> CoreResult<Option<ValidatorRecord>> {
        Ok(state.get(&keys::staking::validator_key(validator))?)
    }

    pub fn stake_amount<B: StorageBackend>(&self, state: &StateTx<'_, B>, validator: &Address) -> CoreResult<Amount> {
        Ok(self.record(state, validator)?.map(|r| r.stake).unwrap_or(0))
    }

    pub fn delegated_amount<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        delegator: &Address,
        validator: &Address,
    ) -> CoreResult<Amount> {
        Ok(self
            .record(state, validator)?
            .map(|r| r.delegated_by(delegator))
            .unwrap_or(0))
    }

    /// Sum of current stakes of `validators`; each address counted as given.
    ///
    /// Saturates at `Amount::MAX`, since every individual stake is accepted.
    pub fn total_stake_of<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        validators: &[Address],
    ) -> CoreResult<Amount> {
        let mut total: Amount = 0;
        for validator in validators {
            total = total.saturating_add(self.stake_amount(state, validator)?);
        }
        Ok(total)
    }

    pub fn pending_validators<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<Vec<Address>> {
        Ok(state.get_or_default(keys::staking::PENDING_SET)?)
    }

    pub fn is_pending<B: StorageBackend>(&self, state: &StateTx<'_, B>, validator: &Address) -> CoreResult<bool> {
        Ok(self.pending_index(state, validator)?.is_some())
    }

    pub fn pending_index<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        validator: &Address,
    ) -> CoreResult<Option<usize>> {
        Ok(self
            .pending_validators(state)?
            .iter()
            .position(|v| v == validator))
    }

    pub fn min_stake<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<Amount> {
        Ok(state.get_or_default(keys::staking::MIN_STAKE)?)
    }

    /// Combined view; `is_current` comes from the rotation state
    pub fn validator_info<B: StorageBackend>(
        &self,
        state: &StateTx<'_, B>,
        validator: &Address,
        is_current: bool,
    ) -> CoreResult<ValidatorInfo> {
        let record = self.record(state, validator)?;
        let pending_index = self.pending_index(state, validator)?;
        Ok(ValidatorInfo {
            address: *validator,
            stake: record.as_ref().map(|r| r.stake).unwrap_or(0),
            delegator_count: record.as_ref().map(|r| r.delegators.len()).unwrap_or(0),
            is_pending: pending_index.is_some(),
            pending_index,
            is_current,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn deposit<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        delegator: Address,
        validator: Address,
        amount: Amount,
    ) -> CoreResult<()> {
        if amount == 0 {
            return Err(CoreError::invalid_argument("stake amount must be greater than zero"));
        }
        if delegator.is_zero() {
            return Err(CoreError::invalid_argument("depositor is the null address"));
        }

        let mut record = self
            .record(&ctx.state, &validator)?
            .unwrap_or_else(|| ValidatorRecord::new(validator));

        let balance = record
            .delegated_by(&delegator)
            .checked_add(amount)
            .ok_or_else(|| CoreError::invalid_argument("delegated balance overflow"))?;
        let stake = record
            .stake
            .checked_add(amount)
            .ok_or_else(|| CoreError::invalid_argument("stake overflow"))?;

        record.delegators.insert(delegator, balance);
        record.stake = stake;
        self.save_record(&mut ctx.state, record)?;

        debug!("Deposited {} with {} by {}, stake now {}", amount, validator, delegator, stake);
        ctx.emit(ChainEvent::Staked {
            validator,
            delegator,
            amount,
        });

        self.refresh_candidacy(ctx, validator, stake)
    }

    fn save_record<B: StorageBackend>(&self, state: &mut StateTx<'_, B>, record: ValidatorRecord) -> CoreResult<()> {
        let key = keys::staking::validator_key(&record.address);
        if record.is_empty() {
            state.remove(&key);
        } else {
            state.put(&key, &record)?;
        }
        Ok(())
    }

    fn refresh_candidacy<B: StorageBackend>(
        &self,
        ctx: &mut ExecutionContext<'_, B>,
        validator: Address,
        stake: Amount,
    ) -> CoreResult<()> {
        let min_stake = self.min_stake(&ctx.state)?;
        let mut pending = self.pending_validators(&ctx.state)?;
        let member = pending.contains(&validator);

        match (member, qualifies(stake, min_stake)) {
            (false, true) => {
                pending.push(validator);
                info!("Validator {} joined PendingSet at index {}", validator, pending.len() - 1);
                ctx.emit(ChainEvent::CandidateAdded { validator });
            }
            (true, false) => {
                pending.retain(|v| *v != validator);
                info!("Validator {} left PendingSet (stake {} < {})", validator, stake, min_stake);
                ctx.emit(ChainEvent::CandidateRemoved { validator });
            }
            _ => return Ok(()),
        }

        ctx.state.put(keys::staking::PENDING_SET, &pending)?;
        Ok(())
    }
}

fn qualifies(stake: Amount, min_stake: Amount) -> bool {
    stake > 0 && stake >= min_stake
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_storage::MemoryBackend;
    use lib_types::BlockEnv;

    const MIN: Amount = 1_000;

    fn addr(n: u8) -> Address {
        Address::new([n; 32])
    }

    fn setup(backend: &MemoryBackend) -> CoreResult<()> {
        let mut ctx = ExecutionContext::new(backend, BlockEnv::default());
        StakeLedger.set_min_stake(&mut ctx, MIN)?;
        ctx.into_parts().0.commit()?;
        Ok(())
    }

    #[test]
    fn test_stake_crosses_threshold() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        ledger.stake(&mut ctx, addr(1), 600)?;
        assert!(!ledger.is_pending(&ctx.state, &addr(1))?);

        ledger.stake(&mut ctx, addr(1), 400)?;
        assert!(ledger.is_pending(&ctx.state, &addr(1))?);
        assert_eq!(ledger.stake_amount(&ctx.state, &addr(1))?, 1_000);
        assert!(ctx
            .events()
            .contains(&ChainEvent::CandidateAdded { validator: addr(1) }));
        Ok(())
    }

    #[test]
    fn test_delegation_counts_toward_stake() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        ledger.stake(&mut ctx, addr(1), 500)?;
        ledger.delegate(&mut ctx, addr(2), addr(1), 700)?;

        assert_eq!(ledger.stake_amount(&ctx.state, &addr(1))?, 1_200);
        assert_eq!(ledger.delegated_amount(&ctx.state, &addr(2), &addr(1))?, 700);
        assert_eq!(ledger.delegated_amount(&ctx.state, &addr(1), &addr(1))?, 500);
        assert_eq!(ledger.pending_validators(&ctx.state)?, vec![addr(1)]);
        Ok(())
    }

    #[test]
    fn test_withdraw_removes_preserving_order() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        for n in [3, 1, 2] {
            ledger.stake(&mut ctx, addr(n), MIN)?;
        }
        assert_eq!(ledger.pending_validators(&ctx.state)?, vec![addr(3), addr(1), addr(2)]);

        ledger.withdraw(&mut ctx, addr(1), 1)?;
        assert_eq!(ledger.pending_validators(&ctx.state)?, vec![addr(3), addr(2)]);
        assert_eq!(ledger.pending_index(&ctx.state, &addr(2))?, Some(1));
        Ok(())
    }

    #[test]
    fn test_withdraw_from_delegator() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        ledger.delegate(&mut ctx, addr(2), addr(1), 1_500)?;
        ledger.withdraw_from(&mut ctx, addr(2), addr(1), 1_500)?;

        assert_eq!(ledger.stake_amount(&ctx.state, &addr(1))?, 0);
        assert!(ledger.record(&ctx.state, &addr(1))?.is_none());
        assert!(!ledger.is_pending(&ctx.state, &addr(1))?);
        Ok(())
    }

    #[test]
    fn test_invalid_arguments() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        assert!(matches!(ledger.stake(&mut ctx, addr(1), 0), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(
            ledger.delegate(&mut ctx, addr(1), Address::zero(), 10),
            Err(CoreError::InvalidArgument(_))
        ));

        ledger.stake(&mut ctx, addr(1), 10)?;
        assert!(matches!(ledger.withdraw(&mut ctx, addr(1), 11), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(
            ledger.withdraw_from(&mut ctx, addr(2), addr(1), 1),
            Err(CoreError::InvalidArgument(_))
        ));
        Ok(())
    }

    #[test]
    fn test_stake_overflow_rejected() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        ledger.stake(&mut ctx, addr(1), Amount::MAX)?;
        assert!(matches!(
            ledger.delegate(&mut ctx, addr(2), addr(1), 1),
            Err(CoreError::InvalidArgument(_))
        ));
        Ok(())
    }

    #[test]
    fn test_total_stake_saturates() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        let half = Amount::MAX / 2 + 1;
        ledger.stake(&mut ctx, addr(1), half)?;
        ledger.stake(&mut ctx, addr(2), half)?;
        ledger.stake(&mut ctx, addr(3), MIN)?;

        assert_eq!(ledger.total_stake_of(&ctx.state, &[addr(1), addr(3)])?, half + MIN);
        assert_eq!(ledger.total_stake_of(&ctx.state, &[addr(1), addr(2), addr(3)])?, Amount::MAX);
        assert_eq!(ledger.total_stake_of(&ctx.state, &[])?, 0);
        Ok(())
    }

    #[test]
    fn test_set_min_stake_reevaluates() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        ledger.stake(&mut ctx, addr(4), 2_000)?;
        ledger.stake(&mut ctx, addr(3), 500)?;
        ledger.stake(&mut ctx, addr(1), 1_000)?;
        ledger.stake(&mut ctx, addr(2), 400)?;
        assert_eq!(ledger.pending_validators(&ctx.state)?, vec![addr(4), addr(1)]);

        // Raising drops addr(1)
        ledger.set_min_stake(&mut ctx, 1_500)?;
        assert_eq!(ledger.pending_validators(&ctx.state)?, vec![addr(4)]);

        // Lowering appends newcomers in address order
        ledger.set_min_stake(&mut ctx, 400)?;
        assert_eq!(
            ledger.pending_validators(&ctx.state)?,
            vec![addr(4), addr(1), addr(2), addr(3)]
        );
        assert_eq!(ledger.min_stake(&ctx.state)?, 400);
        Ok(())
    }

    #[test]
    fn test_validator_info() -> CoreResult<()> {
        let backend = MemoryBackend::new();
        setup(&backend)?;
        let ledger = StakeLedger::new();
        let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());

        ledger.stake(&mut ctx, addr(1), 1_000)?;
        ledger.delegate(&mut ctx, addr(9), addr(1), 5)?;

        let info = ledger.validator_info(&ctx.state, &addr(1), true)?;
        assert_eq!(info.stake, 1_005);
        assert_eq!(info.delegator_count, 2);
        assert_eq!(info.pending_index, Some(0));
        assert!(info.is_pending && info.is_current);
        Ok(())
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        #[derive(Debug, Clone)]
        enum Op {
            Stake(u8, Amount),
            Delegate(u8, u8, Amount),
            Withdraw(u8, u8, Amount),
            SetMin(Amount),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1u8..5, 1u128..3_000).prop_map(|(v, a)| Op::Stake(v, a)),
                (1u8..5, 1u8..5, 1u128..3_000).prop_map(|(d, v, a)| Op::Delegate(d, v, a)),
                (1u8..5, 1u8..5, 1u128..3_000).prop_map(|(d, v, a)| Op::Withdraw(d, v, a)),
                (1u128..4_000).prop_map(Op::SetMin),
            ]
        }

        proptest! {
            /// Stake equals deposits minus withdrawals and PendingSet tracks the threshold
            #[test]
            fn prop_ledger_invariants(ops in prop::collection::vec(op(), 1..60)) {
                let backend = MemoryBackend::new();
                let ledger = StakeLedger::new();
                let mut ctx = ExecutionContext::new(&backend, BlockEnv::default());
                ledger.set_min_stake(&mut ctx, MIN).unwrap();

                let mut balances: BTreeMap<(u8, u8), Amount> = BTreeMap::new();
                let mut previous: Vec<Address> = Vec::new();

                for op in ops {
                    match op {
                        Op::Stake(v, a) => {
                            ledger.stake(&mut ctx, addr(v), a).unwrap();
                            *balances.entry((v, v)).or_default() += a;
                        }
                        Op::Delegate(d, v, a) => {
                            ledger.delegate(&mut ctx, addr(d), addr(v), a).unwrap();
                            *balances.entry((d, v)).or_default() += a;
                        }
                        Op::Withdraw(d, v, a) => {
                            let held = balances.get(&(d, v)).copied().unwrap_or(0);
                            let result = ledger.withdraw_from(&mut ctx, addr(d), addr(v), a);
                            if a <= held {
                                prop_assert!(result.is_ok());
                                balances.insert((d, v), held - a);
                            } else {
                                prop_assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
                            }
                        }
                        Op::SetMin(m) => ledger.set_min_stake(&mut ctx, m).unwrap(),
                    }

                    let min = ledger.min_stake(&ctx.state).unwrap();
                    let pending = ledger.pending_validators(&ctx.state).unwrap();
                    for v in 1u8..5 {
                        let expected: Amount = balances
                            .iter()
                            .filter(|((_, to), _)| *to == v)
                            .map(|(_, a)| *a)
                            .sum();
                        let stake = ledger.stake_amount(&ctx.state, &addr(v)).unwrap();
                        prop_assert_eq!(stake, expected);
                        prop_assert_eq!(pending.contains(&addr(v)), stake > 0 && stake >= min);
                    }

                    // Survivors keep their relative order
                    let survivors: Vec<Address> =
                        previous.iter().filter(|v| pending.contains(v)).copied().collect();
                    let kept: Vec<Address> =
                        pending.iter().filter(|v| previous.contains(v)).copied().collect();
                    prop_assert_eq!(survivors, kept);
                    previous = pending;
                }
            }
        }
    }
}
