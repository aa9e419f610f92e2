//! Stake ledger and validator rotation
//!
//! - `staking`: stake and delegation balances, PendingSet candidacy
//! - `rotation`: cycle scheduler, weighted slot allocation, snapshot entropy
//! - `context`: per-call execution context shared with the governance crate

pub mod context;
pub mod rotation;
pub mod staking;

pub use context::ExecutionContext;
pub use rotation::{
    allocate_slots, AncestorHashEntropy, CyclePhase, CycleScheduler, CycleState, RandomSource,
    RotationConfig, Snapshot, TickOutcome, VALIDATOR_SLOTS,
};
pub use staking::{StakeLedger, ValidatorInfo, ValidatorRecord};
