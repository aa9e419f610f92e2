//! Chain state storage
//!
//! Persistence layer for the validator rotation and governance core:
//! - `backend`: byte-level `StorageBackend` trait with in-memory and sled implementations
//! - `state`: `StateTx` write overlay committed atomically per call
//! - `keys`: canonical key layout for every stored value

pub mod backend;
pub mod keys;
pub mod state;

pub use backend::{BatchOp, MemoryBackend, SledBackend, StorageBackend};
pub use state::StateTx;
