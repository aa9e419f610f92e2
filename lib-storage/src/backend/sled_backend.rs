//! On-disk chain state backed by sled
//!
//! Every `StateTx` commit lands as one `sled::Batch`, so a crash never leaves
//! half of a call's writes behind.

use super::{BatchOp, StorageBackend};
use anyhow::{Context, Result};
use std::path::Path;

const PAGE_CACHE_BYTES: u64 = 64 << 20;

/// Durable backend for long-running nodes
#[derive(Clone, Debug)]
pub struct SledBackend {
    tree: sled::Db,
}

impl SledBackend {
    /// Opens the store at `path`, creating it on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let tree = sled::Config::default()
            .path(path)
            .cache_capacity(PAGE_CACHE_BYTES)
            .mode(sled::Mode::HighThroughput)
            .open()
            .with_context(|| format!("opening chain store at {}", path.display()))?;
        Ok(Self { tree })
    }

    /// Scratch store deleted on drop. Used by tests and dry runs.
    pub fn temporary() -> Result<Self> {
        let tree = sled::Config::default()
            .temporary(true)
            .open()
            .context("opening scratch chain store")?;
        Ok(Self { tree })
    }
}

fn owned(bytes: Option<sled::IVec>) -> Option<Vec<u8>> {
    bytes.map(|ivec| ivec.to_vec())
}

impl StorageBackend for SledBackend {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let old = self.tree.insert(key, value).context("sled insert")?;
        Ok(owned(old))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(owned(self.tree.get(key).context("sled read")?))
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let old = self.tree.remove(key).context("sled delete")?;
        Ok(owned(old))
    }

    fn contains_key(&self, key: &[u8]) -> Result<bool> {
        self.tree.contains_key(key).context("sled key lookup")
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        for entry in self.tree.scan_prefix(prefix) {
            let (key, _) = entry.context("sled prefix scan")?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let batch = ops.into_iter().fold(sled::Batch::default(), |mut batch, op| {
            match op {
                BatchOp::Put { key, value } => batch.insert(key, value),
                BatchOp::Delete { key } => batch.remove(key),
            }
            batch
        });
        self.tree.apply_batch(batch).context("sled batch commit")
    }

    fn flush(&self) -> Result<()> {
        self.tree.flush().context("sled flush")?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.tree.len())
    }

    fn backend_type(&self) -> &'static str {
        "sled"
    }
}
