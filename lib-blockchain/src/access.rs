//! Capability table
//!
//! Every mutating call names an `Operation`; the table maps it to the `Role`
//! that may issue it and checks the caller before any business logic runs.

use lib_types::{Address, CoreError, CoreResult, ThresholdType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutating calls accepted by the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Initialize,
    Stake,
    Delegate,
    Withdraw,
    WithdrawFrom,
    Tick,
    NotifyHandoff,
    FinalizeHandoff,
    SetThreshold(ThresholdType),
    NewBallot,
    Vote,
    NewSimpleBallot,
    SimpleVote,
    FinalizeSimpleBallot,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SetThreshold(ty) => write!(f, "set_threshold({})", ty),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Who may issue an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Anyone,
    Owner,
    SystemCaller,
    RewardDistributor,
    /// Member of the CurrentSet
    Validator,
    /// Designated setter of one threshold type
    ThresholdSetter(ThresholdType),
    /// Any designated threshold setter
    AnyThresholdSetter,
}

/// Addresses bound to privileged roles, fixed for the lifetime of a chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleBindings {
    pub owner: Address,
    pub system_caller: Address,
    pub reward_distributor: Address,
    pub voters_setter: Address,
    pub block_reward_setter: Address,
    pub min_stake_setter: Address,
}

impl RoleBindings {
    /// Designated setter for `ty`; `None` for `Invalid`
    pub fn setter(&self, ty: ThresholdType) -> Option<Address> {
        match ty {
            ThresholdType::Invalid => None,
            ThresholdType::Voters => Some(self.voters_setter),
            ThresholdType::BlockReward => Some(self.block_reward_setter),
            ThresholdType::MinStake => Some(self.min_stake_setter),
        }
    }

    pub fn is_threshold_setter(&self, caller: &Address) -> bool {
        ThresholdType::ALL
            .into_iter()
            .any(|ty| self.setter(ty).as_ref() == Some(caller))
    }

    pub fn validate(&self) -> Result<(), String> {
        let named = [
            ("owner", self.owner),
            ("system_caller", self.system_caller),
            ("reward_distributor", self.reward_distributor),
            ("voters_setter", self.voters_setter),
            ("block_reward_setter", self.block_reward_setter),
            ("min_stake_setter", self.min_stake_setter),
        ];
        for (name, address) in named {
            if address.is_zero() {
                return Err(format!("roles.{} must be set", name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AccessTable {
    bindings: RoleBindings,
}

impl AccessTable {
    pub fn new(bindings: RoleBindings) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &RoleBindings {
        &self.bindings
    }

    pub fn required_role(op: Operation) -> Role {
        match op {
            Operation::Initialize => Role::Owner,
            Operation::Stake | Operation::Delegate | Operation::Withdraw | Operation::WithdrawFrom => Role::Anyone,
            Operation::Tick => Role::RewardDistributor,
            Operation::NotifyHandoff => Role::Validator,
            Operation::FinalizeHandoff => Role::SystemCaller,
            // Invalid types have no setter; the registry turns them into a no-op
            Operation::SetThreshold(ThresholdType::Invalid) => Role::AnyThresholdSetter,
            Operation::SetThreshold(ty) => Role::ThresholdSetter(ty),
            Operation::NewBallot => Role::Validator,
            Operation::Vote => Role::Anyone,
            Operation::NewSimpleBallot | Operation::SimpleVote => Role::Validator,
            Operation::FinalizeSimpleBallot => Role::Anyone,
        }
    }

    /// Check `caller` against the role required for `op`.
    ///
    /// `is_validator` is only consulted for validator-gated operations.
    pub fn authorize(
        &self,
        op: Operation,
        caller: &Address,
        is_validator: impl FnOnce() -> CoreResult<bool>,
    ) -> CoreResult<()> {
        let allowed = match Self::required_role(op) {
            Role::Anyone => true,
            Role::Owner => *caller == self.bindings.owner,
            Role::SystemCaller => *caller == self.bindings.system_caller,
            Role::RewardDistributor => *caller == self.bindings.reward_distributor,
            Role::Validator => is_validator()?,
            Role::ThresholdSetter(ty) => self.bindings.setter(ty).as_ref() == Some(caller),
            Role::AnyThresholdSetter => self.bindings.is_threshold_setter(caller),
        };
        if allowed {
            Ok(())
        } else {
            Err(CoreError::access_denied(format!(
                "{} may not call {} (requires {:?})",
                caller,
                op,
                Self::required_role(op)
            )))
        }
    }
}
