//! Fixed-width values shared by the ledger, the rotation scheduler and
//! governance
//!
//! Accounts and hashes are 32-byte arrays so state keys have a fixed layout
//! and compare byte-wise.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Height of a block, genesis is 0
pub type BlockHeight = u64;

/// Stake, delegation and threshold values
pub type Amount = u128;

/// Seconds since the Unix epoch
pub type Timestamp = u64;

/// Accessors common to the 32-byte newtypes
macro_rules! bytes32 {
    ($name:ident) => {
        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// All-zero value
            pub const fn zero() -> Self {
                Self([0u8; 32])
            }

            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        // Short prefix keeps log lines readable
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({}..)"), hex::encode(&self.0[..8]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }
    };
}

/// Parent block hash, the seed for snapshot selection
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub struct BlockHash(pub [u8; 32]);

bytes32!(BlockHash);

/// Account address. The all-zero address is the null address and is never a
/// valid validator or delegator.
///
/// Human-readable formats (TOML, JSON) carry it as hex, bincode as 32 raw
/// bytes.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Address(pub [u8; 32]);

bytes32!(Address);

impl Address {
    /// Accepts 64 hex digits, optionally prefixed with `0x`.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Reads an address back out of a storage key segment.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.0))
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::from_hex(&s).map_err(D::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Address)
        }
    }
}

/// What the host tells us about the block every call in it runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockEnv {
    pub number: BlockHeight,
    pub timestamp: Timestamp,
    pub parent_hash: BlockHash,
}

impl BlockEnv {
    pub fn new(number: BlockHeight, timestamp: Timestamp, parent_hash: BlockHash) -> Self {
        Self {
            number,
            timestamp,
            parent_hash,
        }
    }
}
