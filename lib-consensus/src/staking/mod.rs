//! Staking: stake and delegation balances and PendingSet candidacy

pub mod ledger;
pub mod validator;

pub use ledger::StakeLedger;
pub use validator::{ValidatorInfo, ValidatorRecord};
