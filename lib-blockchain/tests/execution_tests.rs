//! Call execution semantics
//!
//! Covers the one-time genesis, the uninitialized guard, all-or-nothing commits
//! and state surviving a sled reopen.

mod common;

use anyhow::Result;
use common::*;
use lib_blockchain::Chain;
use lib_storage::{keys, MemoryBackend, SledBackend};
use lib_types::{BallotTarget, CoreError, QuorumState, ThresholdType, VoteChoice};

// ============================================================================
// Test 1: Genesis runs once, and only for the owner
// ============================================================================

#[test]
fn test_initialize_guards() -> Result<()> {
    init_tracing();
    let mut chain = Chain::new(MemoryBackend::new(), config(vec![addr(1)], 10, 2, 100))?;
    assert!(!chain.is_initialized()?);

    assert!(matches!(chain.stake(addr(1), 100), Err(CoreError::Uninitialized(_))));
    assert!(matches!(chain.tick(SYSTEM), Err(CoreError::Uninitialized(_))));
    assert!(matches!(
        chain.set_threshold(SETTER, 5, ThresholdType::Voters),
        Err(CoreError::Uninitialized(_))
    ));
    assert!(matches!(chain.initialize(addr(1)), Err(CoreError::AccessDenied(_))));
    assert!(chain.backend().dump().is_empty());

    chain.initialize(OWNER)?;
    assert!(chain.is_initialized()?);
    assert_eq!(chain.schema_version()?, Some(keys::meta::CURRENT_SCHEMA_VERSION));
    assert_eq!(chain.threshold(ThresholdType::Voters)?, 3);
    assert_eq!(chain.current_validators()?, vec![addr(1)]);
    assert!(matches!(chain.initialize(OWNER), Err(CoreError::StateConflict(_))));
    Ok(())
}

// ============================================================================
// Test 2: Failed calls write nothing and emit nothing
// ============================================================================

#[test]
fn test_failed_calls_are_atomic() -> Result<()> {
    let mut chain = genesis(MemoryBackend::new(), config(vec![addr(1), addr(2)], 10, 2, 100))?;
    chain.stake(addr(1), 150)?;
    chain.take_events();
    let before = chain.backend().dump();

    let failures = [
        chain.withdraw(addr(1), 151).unwrap_err(),
        chain.withdraw_from(addr(5), addr(1), 1).unwrap_err(),
        chain.delegate(addr(5), lib_types::Address::zero(), 10).unwrap_err(),
        chain.stake(addr(3), 0).unwrap_err(),
        chain
            .new_ballot(addr(1), 1, 1, BallotTarget::MinStake, 10, "too short")
            .unwrap_err(),
        chain.vote(addr(1), 77, VoteChoice::Accept).unwrap_err(),
        chain.finalize_handoff(addr(1)).unwrap_err(),
    ];
    assert!(failures.iter().all(|e| matches!(
        e,
        CoreError::InvalidArgument(_) | CoreError::AccessDenied(_)
    )));

    assert_eq!(chain.backend().dump(), before);
    assert!(chain.events().is_empty());
    Ok(())
}

// ============================================================================
// Test 3: Block heights never go back
// ============================================================================

#[test]
fn test_heights_never_go_back() -> Result<()> {
    let mut chain = genesis(MemoryBackend::new(), config(vec![addr(1)], 10, 2, 100))?;
    advance_to(&mut chain, 4)?;
    assert!(matches!(chain.begin_block(env(3)), Err(CoreError::InvalidArgument(_))));
    assert_eq!(chain.env().number, 4);
    chain.begin_block(env(4))?;
    Ok(())
}

// ============================================================================
// Test 4: State survives reopening a sled store
// ============================================================================

#[test]
fn test_sled_reopen_keeps_state() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("chain-db");
    let config = config(vec![addr(1), addr(2), addr(3)], 10, 2, 100);

    let id = {
        let mut chain = genesis(SledBackend::open(&path)?, config.clone())?;
        chain.stake(addr(1), 100)?;
        chain.stake(addr(2), 200)?;
        chain.stake(addr(3), 300)?;
        let id = chain.new_ballot(addr(1), 1, 2, BallotTarget::BlockReward, 42, "persisted")?;
        advance_to(&mut chain, 20)?;
        chain.vote(addr(3), id, VoteChoice::Accept)?;
        chain.vote(addr(2), id, VoteChoice::Accept)?;
        chain.flush()?;
        id
    };

    let mut chain = Chain::new(SledBackend::open(&path)?, config)?;
    assert!(chain.is_initialized()?);
    assert_eq!(chain.stake_amount(&addr(3))?, 300);
    assert_eq!(chain.pending_validators()?, vec![addr(1), addr(2), addr(3)]);
    assert_eq!(chain.scheduler().cycle_number(&chain.view())?, 2);
    assert!(matches!(chain.initialize(OWNER), Err(CoreError::StateConflict(_))));

    // Pick up where the first process stopped
    chain.begin_block(env(20))?;
    advance_to(&mut chain, 40)?;
    assert_eq!(chain.ballots().quorum_state(&chain.view(), id)?, QuorumState::Accepted);
    assert_eq!(chain.threshold(ThresholdType::BlockReward)?, 42);
    Ok(())
}
