//! Shared fixtures for chain scenario tests

#![allow(dead_code)]

use anyhow::Result;
use lib_blockchain::{Chain, ChainConfig, GenesisConfig, RoleBindings, TickReport};
use lib_consensus::RotationConfig;
use lib_storage::StorageBackend;
use lib_types::{Address, Amount, BlockEnv, BlockHash, Timestamp};

pub const OWNER: Address = Address::new([0xA1; 32]);
/// Bound as both system caller and reward distributor
pub const SYSTEM: Address = Address::new([0xA2; 32]);
pub const SETTER: Address = Address::new([0xA3; 32]);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn addr(n: u8) -> Address {
    Address::new([n; 32])
}

/// Block `number` with a parent hash derived from the height
pub fn env_at(number: u64, timestamp: Timestamp) -> BlockEnv {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&number.wrapping_mul(0x9e37_79b9_7f4a_7c15).to_be_bytes());
    BlockEnv::new(number, timestamp, BlockHash::new(hash))
}

pub fn env(number: u64) -> BlockEnv {
    env_at(number, number * 5)
}

pub fn config(
    validators: Vec<Address>,
    cycle_duration_blocks: u64,
    snapshots_per_cycle: u64,
    min_stake: Amount,
) -> ChainConfig {
    ChainConfig {
        rotation: RotationConfig {
            cycle_duration_blocks,
            snapshots_per_cycle,
        },
        roles: RoleBindings {
            owner: OWNER,
            system_caller: SYSTEM,
            reward_distributor: SYSTEM,
            voters_setter: SETTER,
            block_reward_setter: SETTER,
            min_stake_setter: SETTER,
        },
        genesis: GenesisConfig {
            voters: 3,
            block_reward: 10,
            min_stake,
            initial_validators: validators,
        },
        ..Default::default()
    }
}

/// Open a chain on `backend` and run genesis at block 0
pub fn genesis<B: StorageBackend>(backend: B, config: ChainConfig) -> Result<Chain<B>> {
    init_tracing();
    let mut chain = Chain::new(backend, config)?;
    chain.begin_block(env(0))?;
    chain.initialize(OWNER)?;
    Ok(chain)
}

/// Tick every block up to and including `target`
pub fn advance_to<B: StorageBackend>(chain: &mut Chain<B>, target: u64) -> Result<Vec<TickReport>> {
    let mut reports = Vec::new();
    for number in chain.env().number + 1..=target {
        chain.begin_block(env(number))?;
        reports.push(chain.tick(SYSTEM)?);
    }
    Ok(reports)
}
