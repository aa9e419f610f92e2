//! Chain Context
//!
//! The single entry point for mutating calls. Wires the stake ledger, cycle
//! scheduler, threshold registry and both ballot engines over one storage
//! backend, checks every caller against the capability table, and commits
//! each call atomically.

pub mod access;
pub mod chain;
pub mod config;

pub use access::{AccessTable, Operation, Role, RoleBindings};
pub use chain::{Chain, TickReport};
pub use config::{ChainConfig, ConfigError, GenesisConfig};

// Re-export the component crates for hosts that only depend on this one
pub use lib_consensus as consensus;
pub use lib_governance as governance;
pub use lib_storage as storage;
pub use lib_types as types;
