//! Job status poller
//!
//! Drives an upstream job from submission to a terminal status. Each tick
//! queries the status endpoint once; failed queries are logged and skipped,
//! unknown statuses are logged and treated as still running. The whole loop
//! is bounded by a wall-clock deadline and by a caller-supplied
//! [`CancellationToken`], and neither a tick nor a status query is started or
//! awaited past either of them.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::traits::{JobHandle, JobStatus, JobStatusSnapshot, JobUpstream, ResultLocator};
use crate::config::PollingConfig;
use crate::error::{AppError, Result};

/// State of a job as seen by the poller.
///
/// Running out of time is not a state a snapshot can produce; it ends the
/// loop with [`AppError::PollingTimeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Succeeded(ResultLocator),
    Failed(JobStatus),
}

impl PollState {
    /// State reached after observing `snapshot`
    pub fn from_snapshot(snapshot: &JobStatusSnapshot) -> Self {
        match &snapshot.status {
            JobStatus::Succeeded => Self::Succeeded(ResultLocator::new(snapshot.result.clone())),
            status if status.is_terminal() => Self::Failed(status.clone()),
            _ => Self::Polling,
        }
    }
}

/// Poll timing
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_duration: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_duration: Duration::from_secs(300),
        }
    }
}

impl From<&PollingConfig> for PollConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_duration: config.max_duration(),
        }
    }
}

/// Polls upstream job status until a terminal state or the deadline
pub struct JobPoller {
    upstream: Arc<dyn JobUpstream>,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(upstream: Arc<dyn JobUpstream>, config: PollConfig) -> Self {
        Self { upstream, config }
    }

    /// Poll `job` until it succeeds, fails, runs out of time or `cancel` fires.
    ///
    /// The first status query happens one interval after the call.
    pub async fn poll(&self, job: &JobHandle, cancel: &CancellationToken) -> Result<ResultLocator> {
        let started = Instant::now();
        let deadline = sleep(self.config.max_duration);
        tokio::pin!(deadline);

        let mut ticker = interval_at(started + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut checks: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(job, checks)),
                _ = &mut deadline => return Err(self.timed_out(job, checks)),
                _ = ticker.tick() => {}
            }

            checks += 1;

            let checked = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(job, checks)),
                _ = &mut deadline => return Err(self.timed_out(job, checks)),
                checked = self.upstream.check_status(job) => checked,
            };

            let snapshot = match checked {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(job_id = %job, error = %e, "Failed to check job status");
                    continue;
                }
            };

            debug!(
                job_id = %job,
                status = %snapshot.status,
                queue_position = snapshot.queue_position,
                elapsed_time = snapshot.elapsed_time,
                worker_gpu = %snapshot.worker.gpu,
                "Job status checked"
            );

            match PollState::from_snapshot(&snapshot) {
                PollState::Succeeded(locator) => {
                    info!(
                        job_id = %job,
                        checks,
                        elapsed_secs = started.elapsed().as_secs_f64(),
                        "Job succeeded"
                    );
                    return Ok(locator);
                }
                PollState::Failed(status) => {
                    return Err(AppError::JobFailed {
                        job_id: job.to_string(),
                        status: status.to_string(),
                    });
                }
                PollState::Polling => {
                    if let JobStatus::Unknown(raw) = &snapshot.status {
                        warn!(job_id = %job, status = %raw, "Unknown job status");
                    }
                }
            }
        }
    }

    fn timed_out(&self, job: &JobHandle, checks: u32) -> AppError {
        AppError::PollingTimeout(format!(
            "job {} did not finish within {}s ({} status checks)",
            job,
            self.config.max_duration.as_secs(),
            checks
        ))
    }

    fn cancelled(&self, job: &JobHandle, checks: u32) -> AppError {
        AppError::PollingTimeout(format!(
            "polling for job {} was cancelled after {} status checks",
            job, checks
        ))
    }
}
