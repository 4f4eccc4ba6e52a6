use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Bounded gate on the number of rows processed at once.
///
/// A permit is moved into each row worker and released when it drops, so
/// every exit path (accepted, filtered out, failed, aborted) frees its slot.
#[derive(Debug, Clone)]
pub struct Throttle {
    sem: Arc<Semaphore>,
    capacity: usize,
}

impl Throttle {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.sem).acquire_owned().await
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by a worker.
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}
