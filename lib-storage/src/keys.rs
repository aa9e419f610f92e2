//! Key Encoding Helpers
//!
//! Key encoding is PROTOCOL. These functions define the canonical byte layout
//! for every stored value. Never inline key construction in business logic.
//!
//! # Format Conventions
//!
//! - Every key starts with a component namespace (`stk/`, `rot/`, ...)
//! - Integers are big-endian (sorts numerically under prefix scans)
//! - Addresses are raw bytes (32 bytes)
//! - Layouts only ever grow: an existing key keeps its value layout forever

use lib_types::Address;

fn join(namespace: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let len = namespace.len() + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.extend_from_slice(namespace);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

/// Parse a big-endian u64 from the tail of a key
#[inline]
pub fn parse_u64_suffix(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    let bytes: [u8; 8] = key[start..].try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Parse an address from the tail of a key
#[inline]
pub fn parse_address_suffix(key: &[u8]) -> Option<Address> {
    let start = key.len().checked_sub(32)?;
    Address::from_slice(&key[start..])
}

// =============================================================================
// STAKING KEYS
// =============================================================================

pub mod staking {
    use super::*;

    /// Minimum stake for PendingSet candidacy → Amount
    pub const MIN_STAKE: &[u8] = b"stk/min_stake";

    /// Ordered PendingSet → Vec<Address>
    pub const PENDING_SET: &[u8] = b"stk/pending";

    /// Prefix of all validator records
    pub const VALIDATOR_PREFIX: &[u8] = b"stk/val/";

    /// Key for a validator record: prefix + address (32 bytes) → ValidatorRecord
    #[inline]
    pub fn validator_key(addr: &Address) -> Vec<u8> {
        join(VALIDATOR_PREFIX, &[addr.as_bytes().as_slice()])
    }
}

// =============================================================================
// ROTATION KEYS
// =============================================================================

pub mod rotation {
    use super::*;

    /// Cycle window, phase, pending roster and CurrentSet → CycleState
    pub const CYCLE_STATE: &[u8] = b"rot/state";

    /// Prefix of snapshot slots
    pub const SNAPSHOT_PREFIX: &[u8] = b"rot/snap/";

    /// Key for a snapshot slot: prefix + slot (8 bytes BE) → Snapshot
    #[inline]
    pub fn snapshot_key(slot: u64) -> Vec<u8> {
        join(SNAPSHOT_PREFIX, &[slot.to_be_bytes().as_slice()])
    }
}

// =============================================================================
// THRESHOLD KEYS
// =============================================================================

pub mod thresholds {
    use super::*;

    /// Set once by `initialize` → bool
    pub const INITIALIZED: &[u8] = b"thr/init";

    /// Prefix of threshold values
    pub const VALUE_PREFIX: &[u8] = b"thr/val/";

    /// Key for a threshold value: prefix + type code (1 byte) → Amount
    #[inline]
    pub fn value_key(code: u8) -> Vec<u8> {
        join(VALUE_PREFIX, &[[code].as_slice()])
    }
}

// =============================================================================
// BALLOT KEYS
// =============================================================================

/// Keys for one ballot engine, parameterized by its namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallotKeys {
    namespace: &'static [u8],
}

/// Stake-weighted ballots
pub const STAKE_BALLOTS: BallotKeys = BallotKeys { namespace: b"bal/" };

/// Simple-majority ballots
pub const SIMPLE_BALLOTS: BallotKeys = BallotKeys { namespace: b"sbl/" };

impl BallotKeys {
    /// Next ballot id → u64
    pub fn next_id(&self) -> Vec<u8> {
        join(self.namespace, &[b"next_id".as_slice()])
    }

    /// Ids of ballots not yet finalized → Vec<u64>
    pub fn active(&self) -> Vec<u8> {
        join(self.namespace, &[b"active".as_slice()])
    }

    /// Prefix of ballot records
    pub fn ballot_prefix(&self) -> Vec<u8> {
        join(self.namespace, &[b"b/".as_slice()])
    }

    /// Key for a ballot record: prefix + id (8 bytes BE) → ballot
    pub fn ballot(&self, id: u64) -> Vec<u8> {
        join(self.namespace, &[b"b/".as_slice(), id.to_be_bytes().as_slice()])
    }

    /// Key for a creator's open-ballot counter: prefix + address → u64
    pub fn open_count(&self, creator: &Address) -> Vec<u8> {
        join(self.namespace, &[b"open/".as_slice(), creator.as_bytes().as_slice()])
    }
}

// =============================================================================
// META KEYS
// =============================================================================

/// Well-known meta keys
pub mod meta {
    /// Storage layout generation written at initialization → u32
    pub const SCHEMA_VERSION: &[u8] = b"meta/schema_version";

    /// Set once the owner has run the one-time setup → bool
    pub const INITIALIZED: &[u8] = b"meta/initialized";

    /// Layout generation produced by this code
    pub const CURRENT_SCHEMA_VERSION: u32 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_key_layout() {
        let addr = Address::new([0xaa; 32]);
        let key = staking::validator_key(&addr);
        assert!(key.starts_with(staking::VALIDATOR_PREFIX));
        assert_eq!(key.len(), staking::VALIDATOR_PREFIX.len() + 32);
        assert_eq!(parse_address_suffix(&key), Some(addr));
    }

    #[test]
    fn test_snapshot_keys_sort_numerically() {
        let k1 = rotation::snapshot_key(1);
        let k2 = rotation::snapshot_key(2);
        let k256 = rotation::snapshot_key(256);
        assert!(k1 < k2);
        assert!(k2 < k256);
        assert_eq!(parse_u64_suffix(&k256), Some(256));
    }

    #[test]
    fn test_ballot_namespaces_disjoint() {
        let a = STAKE_BALLOTS.ballot(7);
        let b = SIMPLE_BALLOTS.ballot(7);
        assert_ne!(a, b);
        assert!(a.starts_with(&STAKE_BALLOTS.ballot_prefix()));
        assert!(!b.starts_with(&STAKE_BALLOTS.ballot_prefix()));
        assert_eq!(parse_u64_suffix(&a), Some(7));
    }

    #[test]
    fn test_parse_short_key() {
        assert_eq!(parse_u64_suffix(b"abc"), None);
        assert_eq!(parse_address_suffix(b"short"), None);
    }
}
