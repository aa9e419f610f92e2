//! Ballot bookkeeping shared by both engines
//!
//! Id allocation, the list of unfinalized ballots and per-creator open-ballot
//! counters, each under the engine's own key namespace.

use lib_storage::keys::BallotKeys;
use lib_storage::{StateTx, StorageBackend};
use lib_types::{Address, CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct BallotBook {
    keys: BallotKeys,
}

impl BallotBook {
    pub fn new(keys: BallotKeys) -> Self {
        Self { keys }
    }

    /// Id the next ballot will receive; ids start at 1
    pub fn next_id<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<u64> {
        Ok(state.get(&self.keys.next_id())?.unwrap_or(1))
    }

    pub fn allocate_id<B: StorageBackend>(&self, state: &mut StateTx<'_, B>) -> CoreResult<u64> {
        let id = self.next_id(state)?;
        state.put(&self.keys.next_id(), &(id + 1))?;
        Ok(id)
    }

    pub fn load<T: DeserializeOwned, B: StorageBackend>(&self, state: &StateTx<'_, B>, id: u64) -> CoreResult<Option<T>> {
        Ok(state.get(&self.keys.ballot(id))?)
    }

    /// Load a ballot that must exist
    pub fn require<T: DeserializeOwned, B: StorageBackend>(&self, state: &StateTx<'_, B>, id: u64) -> CoreResult<T> {
        self.load(state, id)?
            .ok_or_else(|| CoreError::invalid_argument(format!("ballot {} does not exist", id)))
    }

    pub fn save<T: Serialize, B: StorageBackend>(&self, state: &mut StateTx<'_, B>, id: u64, ballot: &T) -> CoreResult<()> {
        state.put(&self.keys.ballot(id), ballot)?;
        Ok(())
    }

    /// Ids of unfinalized ballots in creation order
    pub fn active<B: StorageBackend>(&self, state: &StateTx<'_, B>) -> CoreResult<Vec<u64>> {
        Ok(state.get_or_default(&self.keys.active())?)
    }

    pub fn set_active<B: StorageBackend>(&self, state: &mut StateTx<'_, B>, ids: &[u64]) -> CoreResult<()> {
        state.put(&self.keys.active(), &ids)?;
        Ok(())
    }

    pub fn open_count<B: StorageBackend>(&self, state: &StateTx<'_, B>, creator: &Address) -> CoreResult<u64> {
        Ok(state.get_or_default(&self.keys.open_count(creator))?)
    }

    /// Register a new ballot: active list and creator counter
    pub fn opened<B: StorageBackend>(&self, state: &mut StateTx<'_, B>, id: u64, creator: &Address) -> CoreResult<()> {
        let mut active = self.active(state)?;
        active.push(id);
        self.set_active(state, &active)?;
        let count = self.open_count(state, creator)?;
        state.put(&self.keys.open_count(creator), &(count + 1))?;
        Ok(())
    }

    /// Retire a finalized ballot from the active list and creator counter
    pub fn closed<B: StorageBackend>(&self, state: &mut StateTx<'_, B>, id: u64, creator: &Address) -> CoreResult<()> {
        let mut active = self.active(state)?;
        active.retain(|a| *a != id);
        self.set_active(state, &active)?;

        let key = self.keys.open_count(creator);
        match self.open_count(state, creator)?.saturating_sub(1) {
            0 => state.remove(&key),
            count => state.put(&key, &count)?,
        }
        Ok(())
    }
}
