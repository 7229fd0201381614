//! Admission control in front of the task executor.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of concurrently running tasks.
///
/// The reader acquires an [`Admission`] before spawning a task; the task
/// holds it until it finishes. While the gate is full the reader stops
/// pulling frames, so backpressure reaches the transport.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    permits: Option<Arc<Semaphore>>,
}

/// Slot held by one running task.
#[derive(Debug)]
pub struct Admission {
    _permit: Option<OwnedSemaphorePermit>,
}

impl AdmissionGate {
    /// Gate allowing `max` concurrent tasks; `0` means unbounded.
    pub fn new(max: usize) -> Self {
        if max == 0 {
            return Self::unbounded();
        }
        let max = max.min(Semaphore::MAX_PERMITS);
        Self {
            permits: Some(Arc::new(Semaphore::new(max))),
        }
    }

    /// Gate that admits everything immediately.
    pub fn unbounded() -> Self {
        Self { permits: None }
    }

    /// Wait for a free slot. Returns `None` once the gate is closed.
    pub async fn admit(&self) -> Option<Admission> {
        match &self.permits {
            None => Some(Admission { _permit: None }),
            Some(permits) => Arc::clone(permits)
                .acquire_owned()
                .await
                .ok()
                .map(|permit| Admission {
                    _permit: Some(permit),
                }),
        }
    }

    /// Refuse further admissions and wake pending waiters.
    ///
    /// Running tasks keep their slots. An unbounded gate cannot be closed.
    pub fn close(&self) {
        if let Some(permits) = &self.permits {
            permits.close();
        }
    }

    /// Free slots, or `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.permits.as_ref().map(|p| p.available_permits())
    }
}
