//! Stake-weighted ballots settled at cycle end

mod engine;
mod types;

pub use engine::{clears_turnout, BallotEngine, TallyResult};
pub use types::{Ballot, BallotInfo, BallotPhase};
