//! Byte-level store underneath all chain state
//!
//! The ledger, the scheduler and both ballot engines only see typed reads and
//! writes through `StateTx`. `StateTx` in turn talks to whichever backend the
//! host injected:
//!
//! - `MemoryBackend` keeps everything in an ordered map and is what tests use
//! - `SledBackend` writes to disk for nodes that must survive a restart
//!
//! Calls execute one at a time, so the trait is synchronous. A committed call
//! reaches the backend as a single `write_batch`.

pub mod memory;
pub mod sled_backend;

use anyhow::Result;
use std::fmt;

pub use memory::MemoryBackend;
pub use sled_backend::SledBackend;

/// One entry of a `write_batch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Handle to a key-value store.
///
/// Clones refer to the same underlying data.
pub trait StorageBackend: Send + Sync + Clone + fmt::Debug {
    /// Writes `value`, handing back what was there before.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Deletes `key`, handing back the old value if any.
    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn contains_key(&self, key: &[u8]) -> Result<bool>;

    /// Keys under `prefix`, byte-wise ascending
    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Applies `ops` in order. Readers see all of them or none.
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()>;

    fn flush(&self) -> Result<()>;

    /// Entry count, possibly by a full scan
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Label used in log fields
    fn backend_type(&self) -> &'static str;
}
