use std::sync::{Arc, Condvar, Mutex};

use super::StoreError;

/// the last committed value of a table group plus the single-writer flag
/// that serializes transactions against it.
#[derive(Debug)]
pub(crate) struct Slot<G> {
    name: String,
    state: Mutex<SlotState<G>>,
    writer_released: Condvar,
}

#[derive(Debug)]
struct SlotState<G> {
    committed: Arc<G>,
    writer_open: bool,
}

impl<G> Slot<G> {
    pub fn new(name: &str, initial: G) -> Slot<G> {
        Slot {
            name: name.to_string(),
            state: Mutex::new(SlotState {
                committed: Arc::new(initial),
                writer_open: false,
            }),
            writer_released: Condvar::new(),
        }
    }

    /// the last committed value. readers never wait on writers.
    pub fn committed(&self) -> Result<Arc<G>, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|e| StoreError::poisoned(&self.name, e))?;
        Ok(Arc::clone(&state.committed))
    }

    /// blocks until no other writer is open, then claims the writer role.
    pub fn acquire_writer(self: &Arc<Self>) -> Result<(WriterGuard<G>, Arc<G>), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StoreError::poisoned(&self.name, e))?;
        while state.writer_open {
            log::debug!("waiting for open writer on {} to finish", self.name);
            state = self
                .writer_released
                .wait(state)
                .map_err(|e| StoreError::poisoned(&self.name, e))?;
        }
        state.writer_open = true;
        let guard = WriterGuard {
            slot: Arc::clone(self),
        };
        Ok((guard, Arc::clone(&state.committed)))
    }

    /// claims the writer role, or returns None if another writer is open.
    pub fn try_acquire_writer(
        self: &Arc<Self>,
    ) -> Result<Option<(WriterGuard<G>, Arc<G>)>, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StoreError::poisoned(&self.name, e))?;
        if state.writer_open {
            return Ok(None);
        }
        state.writer_open = true;
        let guard = WriterGuard {
            slot: Arc::clone(self),
        };
        Ok(Some((guard, Arc::clone(&state.committed))))
    }
}

/// proof of holding the writer role on a [`Slot`]. dropping it releases the role.
#[derive(Debug)]
pub(crate) struct WriterGuard<G> {
    slot: Arc<Slot<G>>,
}

impl<G> WriterGuard<G> {
    /// replaces the committed value.
    pub fn publish(&self, value: G) -> Result<Arc<G>, StoreError> {
        let mut state = self
            .slot
            .state
            .lock()
            .map_err(|e| StoreError::poisoned(&self.slot.name, e))?;
        let committed = Arc::new(value);
        state.committed = Arc::clone(&committed);
        Ok(committed)
    }
}

impl<G> Drop for WriterGuard<G> {
    fn drop(&mut self) {
        let mut state = match self.slot.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.writer_open = false;
        self.slot.writer_released.notify_one();
    }
}
