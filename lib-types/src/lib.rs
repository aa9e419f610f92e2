//! Validator rotation and governance primitives.
//! Stable, protocol-neutral, behavior-free.
//!
//! Rule: No String identifiers in consensus state. Ever.

pub mod errors;
pub mod events;
pub mod governance;
pub mod primitives;

pub use errors::{CoreError, CoreResult};
pub use events::ChainEvent;
pub use governance::{BallotTarget, QuorumState, ThresholdType, VoteChoice};
pub use primitives::{Address, Amount, BlockEnv, BlockHash, BlockHeight, Timestamp};
