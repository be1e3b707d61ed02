//! Single-slot permit bounding handler concurrency.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// At-most-one concurrent asynchronous handler per protocol.
///
/// `issue` hands out a guard when the slot is free and `None` when busy;
/// the slot frees itself when the guard drops, so release happens even if
/// the spawned work panics.
#[derive(Clone)]
pub struct AsyncPermit {
    slot: Arc<Semaphore>,
}

/// Guard of the single slot; drop to release.
pub struct PermitGuard {
    _permit: OwnedSemaphorePermit,
}

impl AsyncPermit {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Try to take the slot.
    pub fn issue(&self) -> Option<PermitGuard> {
        self.slot
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| PermitGuard { _permit: permit })
    }

    /// Whether the slot is currently taken.
    pub fn busy(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

impl Default for AsyncPermit {
    fn default() -> Self {
        Self::new()
    }
}
