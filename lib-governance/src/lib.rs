//! Validator governance
//!
//! Parameter changes are voted on by the validator roster:
//!
//! 1. **Thresholds**: `ThresholdRegistry` holds Voters, BlockReward and MinStake
//!    and derives the quorum size and ballot cap from the live roster
//! 2. **Stake-weighted ballots**: `BallotEngine` opens windows measured in cycles
//!    and tallies them against stake at cycle end
//! 3. **Simple ballots**: `SimpleBallotEngine` runs one-validator-one-vote
//!    ballots on the Voters threshold over wall-clock windows
//!
//! # Usage
//!
//! ```ignore
//! use lib_governance::{BallotEngine, BallotConfig, ThresholdRegistry};
//!
//! let registry = ThresholdRegistry::new(scheduler.clone());
//! let ballots = BallotEngine::new(BallotConfig::default(), scheduler, registry);
//! let id = ballots.new_ballot(&mut ctx, creator, 1, 2, BallotTarget::MinStake, 500, desc)?;
//! ```

pub mod ballot;
pub mod book;
pub mod config;
pub mod simple_ballot;
pub mod thresholds;

pub use ballot::{clears_turnout, Ballot, BallotEngine, BallotInfo, BallotPhase, TallyResult};
pub use book::BallotBook;
pub use config::{BallotConfig, SimpleBallotConfig};
pub use simple_ballot::{SimpleBallot, SimpleBallotEngine, SimpleBallotInfo};
pub use thresholds::{ballot_limit_for, proxy_threshold_for, ThresholdRegistry, MAX_LIMIT_OF_BALLOTS};
