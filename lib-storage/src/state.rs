//! Atomic state transactions
//!
//! A `StateTx` buffers every write of one call in an overlay. Reads see the
//! overlay first and the backend second. Nothing reaches the backend until
//! `commit`, which applies the whole overlay as one `write_batch`; dropping the
//! transaction discards it.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::backend::{BatchOp, StorageBackend};

/// Write overlay over a storage backend
#[derive(Debug)]
pub struct StateTx<'a, B: StorageBackend> {
    backend: &'a B,
    /// `Some(value)` is a pending put, `None` a pending delete
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, B: StorageBackend> StateTx<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            overlay: BTreeMap::new(),
        }
    }

    // =========================================================================
    // Raw access
    // =========================================================================

    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.overlay.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => self.backend.get(key),
        }
    }

    pub fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert(key, Some(value));
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.overlay.insert(key.to_vec(), None);
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        match self.overlay.get(key) {
            Some(pending) => Ok(pending.is_some()),
            None => self.backend.contains_key(key),
        }
    }

    /// Keys under `prefix` as this transaction sees them, ascending
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut keys: BTreeSet<Vec<u8>> = self.backend.keys_with_prefix(prefix)?.into_iter().collect();
        for (key, pending) in self
            .overlay
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match pending {
                Some(_) => keys.insert(key.clone()),
                None => keys.remove(key),
            };
        }
        Ok(keys.into_iter().collect())
    }

    // =========================================================================
    // Typed access (bincode)
    // =========================================================================

    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)
                    .with_context(|| format!("Failed to decode value at key {}", String::from_utf8_lossy(key)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Typed read falling back to `T::default()` for absent keys
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &[u8]) -> Result<T> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    pub fn put<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)
            .with_context(|| format!("Failed to encode value at key {}", String::from_utf8_lossy(key)))?;
        self.put_raw(key.to_vec(), bytes);
        Ok(())
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.overlay.len()
    }

    /// Apply every buffered write atomically
    pub fn commit(self) -> Result<()> {
        if self.overlay.is_empty() {
            return Ok(());
        }
        let ops = self
            .overlay
            .into_iter()
            .map(|(key, pending)| match pending {
                Some(value) => BatchOp::Put { key, value },
                None => BatchOp::Delete { key },
            })
            .collect::<Vec<_>>();
        debug!(
            "Committing {} writes to {} backend",
            ops.len(),
            self.backend.backend_type()
        );
        self.backend.write_batch(ops)
    }
}
