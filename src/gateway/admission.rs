//! Admission gate bounding concurrent generation requests
//!
//! A fixed number of slots backed by a [`Semaphore`]. Every admitted request
//! holds an [`AdmissionPermit`] that returns its slot when dropped, so a slot
//! is released exactly once whichever way the request ends. Outstanding work
//! is tracked with a [`TaskTracker`] so shutdown can wait for it to drain.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

/// Extra time given to aborted requests to unwind after the drain grace
const ABORT_GRACE: Duration = Duration::from_secs(5);

/// Fixed-capacity counting gate shared by all request handlers
#[derive(Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    abort: CancellationToken,
    capacity: usize,
}

/// One held admission slot, returned to the gate on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    _token: TaskTrackerToken,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        debug!("Admission slot released");
    }
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            tracker: TaskTracker::new(),
            abort: CancellationToken::new(),
            capacity,
        }
    }

    /// Wait for a free slot.
    ///
    /// Fails with [`AppError::ShuttingDown`] once the gate is closed, including
    /// for callers that were already waiting.
    pub async fn acquire(&self) -> Result<AdmissionPermit> {
        // Registered before waiting so a concurrent drain cannot miss a
        // request that is admitted right as the gate closes.
        let token = self.tracker.token();

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::ShuttingDown)?;

        debug!(available = self.available(), "Admission slot acquired");

        Ok(AdmissionPermit {
            _permit: permit,
            _token: token,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Token cancelled when the drain grace period runs out.
    ///
    /// Admitted work should stop waiting on upstream once it fires.
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.child_token()
    }

    /// Stop admitting new requests. Waiting callers fail immediately.
    pub fn close(&self) {
        if !self.semaphore.is_closed() {
            info!(in_flight = self.in_flight(), "Admission gate closed");
        }
        self.semaphore.close();
        self.tracker.close();
    }

    /// Close the gate and wait for admitted work to release its slots.
    ///
    /// Returns `true` if everything drained within `grace`. Otherwise the
    /// abort token is cancelled and remaining work gets a few more seconds to
    /// unwind before this returns `false`.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.close();

        info!(
            in_flight = self.in_flight(),
            grace_secs = grace.as_secs(),
            "Draining admitted requests"
        );

        if timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("All admitted requests drained");
            return true;
        }

        warn!(
            in_flight = self.in_flight(),
            "Drain grace period elapsed, aborting remaining requests"
        );
        self.abort.cancel();

        if timeout(ABORT_GRACE, self.tracker.wait()).await.is_err() {
            warn!(in_flight = self.in_flight(), "Requests still running after abort");
        }

        false
    }
}
