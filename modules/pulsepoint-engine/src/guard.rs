use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Mutual exclusion for orchestration passes. One permit, shared by the
/// discovery and completion passes: only one orchestration activity of
/// either kind runs at a time. Acquisition is non-blocking — a held guard
/// means the caller skips its run, a normal silent outcome.
///
/// Injectable rather than ambient process state, so "guard busy" behavior
/// is deterministic to test. Clones share the same permit.
#[derive(Clone)]
pub struct RunGuard {
    inner: Arc<Semaphore>,
}

/// Held for the duration of a pass; released on drop, on every exit path.
pub struct RunPermit {
    _permit: OwnedSemaphorePermit,
}

impl RunGuard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.inner
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| RunPermit { _permit: permit })
    }
}

impl Default for RunGuard {
    fn default() -> Self {
        Self::new()
    }
}
