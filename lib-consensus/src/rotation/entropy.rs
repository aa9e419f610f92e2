//! Snapshot selection entropy
//!
//! The entropy only chooses which captured snapshot becomes authoritative. It
//! is weak: a block producer can grind the parent hash. It must never feed the
//! slot allocation itself.

use lib_types::BlockEnv;
use std::fmt;

/// Source of a pseudo-random index in `[min, max]` for the current block
pub trait RandomSource: Send + Sync + fmt::Debug {
    /// Integer in `[min, max]`; returns `min` when `max <= min`
    fn random_index(&self, env: &BlockEnv, min: u64, max: u64) -> u64;
}

/// Entropy from the parent block hash.
///
/// Unknown until the parent block is produced, reproducible afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct AncestorHashEntropy;

impl RandomSource for AncestorHashEntropy {
    fn random_index(&self, env: &BlockEnv, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(env.parent_hash.as_bytes());
        hasher.update(&min.to_be_bytes());
        hasher.update(&max.to_be_bytes());
        let digest = hasher.finalize();

        let mut word = [0u8; 16];
        word.copy_from_slice(&digest.as_bytes()[..16]);
        let width = u128::from(max - min) + 1;
        min + (u128::from_be_bytes(word) % width) as u64
    }
}
