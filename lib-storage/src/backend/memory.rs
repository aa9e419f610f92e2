//! Volatile backend. Contents vanish with the process.

use super::{BatchOp, StorageBackend};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// Ordered in-memory map; prefix scans rely on the ordering
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    entries: Arc<RwLock<Entries>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, used to assert that failed calls wrote nothing
    pub fn dump(&self) -> Entries {
        self.entries.read().clone()
    }
}

impl StorageBackend for MemoryBackend {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.write().insert(key.to_vec(), value.to_vec()))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.write().remove(key))
    }

    fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let entries = self.entries.read();
        let keys = entries
            .range(prefix.to_vec()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        Ok(keys)
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        // One guard for the whole batch
        let mut entries = self.entries.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
