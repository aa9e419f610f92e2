//! Execution context for a single state-mutating call

use lib_storage::{StateTx, StorageBackend};
use lib_types::{BlockEnv, ChainEvent};

/// State overlay, block environment and buffered events of one call.
///
/// Components read and write `state` and push events through `emit`. The
/// owner commits the overlay and publishes the events only if the whole call
/// succeeds.
#[derive(Debug)]
pub struct ExecutionContext<'a, B: StorageBackend> {
    pub state: StateTx<'a, B>,
    pub env: BlockEnv,
    events: Vec<ChainEvent>,
}

impl<'a, B: StorageBackend> ExecutionContext<'a, B> {
    pub fn new(backend: &'a B, env: BlockEnv) -> Self {
        Self {
            state: StateTx::new(backend),
            env,
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: ChainEvent) {
        self.events.push(event);
    }

    /// Events emitted so far in this call
    pub fn events(&self) -> &[ChainEvent] {
        &self.events
    }

    pub fn into_parts(self) -> (StateTx<'a, B>, Vec<ChainEvent>) {
        (self.state, self.events)
    }
}
