//! Common traits and types for the upstream generation service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Inbound request body as received from callers.
///
/// Every field is optional at the wire level so that missing fields can be
/// reported together by [`GenerateBody::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateBody {
    pub prompt: Option<String>,
    pub negative: Option<String>,
    pub sampler: Option<String>,
    pub scheduler: Option<String>,
}

/// A validated image generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative: String,
    pub sampler: String,
    pub scheduler: String,
}

impl GenerateBody {
    /// Check required fields and produce a [`GenerationRequest`].
    ///
    /// `prompt`, `sampler` and `scheduler` must be present and non-empty.
    pub fn validate(self) -> Result<GenerationRequest> {
        fn required(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        let prompt = required(self.prompt);
        let sampler = required(self.sampler);
        let scheduler = required(self.scheduler);

        let missing: Vec<&str> = [
            ("prompt", prompt.is_none()),
            ("sampler", sampler.is_none()),
            ("scheduler", scheduler.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        match (prompt, sampler, scheduler) {
            (Some(prompt), Some(sampler), Some(scheduler)) => Ok(GenerationRequest {
                prompt,
                negative: self.negative.unwrap_or_default(),
                sampler,
                scheduler,
            }),
            _ => Err(AppError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Payload sent once to the upstream submission endpoint
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpstreamSubmission {
    pub prompt: String,
    pub negative: String,
    pub sampler: String,
    pub scheduler: String,
    /// Server-controlled hardware preference, in priority order
    pub preferred_gpu: Vec<String>,
}

impl UpstreamSubmission {
    pub fn new(request: GenerationRequest, preferred_gpu: Vec<String>) -> Self {
        Self {
            prompt: request.prompt,
            negative: request.negative,
            sampler: request.sampler,
            scheduler: request.scheduler,
            preferred_gpu,
        }
    }
}

/// Opaque upstream job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream-relative path of a finished image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLocator(String);

impl ResultLocator {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status as reported by the upstream status endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Waiting,
    Succeeded,
    Failed,
    Cancelled,
    Timeout,
    /// Any value outside the known set, kept verbatim for logging
    Unknown(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "waiting" => Self::Waiting,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "timeout" => Self::Timeout,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Waiting => "waiting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether no further state transition can follow this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worker details reported alongside a status. Informational only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerInfo {
    pub name: String,
    pub city: String,
    pub country: String,
    pub gpu: String,
}

/// One observation of an upstream job
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    /// Meaningful only when `status` is [`JobStatus::Succeeded`]
    pub result: String,
    pub queue_position: i64,
    pub elapsed_time: f64,
    pub worker: WorkerInfo,
}

impl JobStatusSnapshot {
    /// Snapshot with only an id and a status, as used by scripted upstreams
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            result: String::new(),
            queue_position: 0,
            elapsed_time: 0.0,
            worker: WorkerInfo::default(),
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }
}

/// Final image returned to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    /// Upstream `Content-Type`, verbatim; empty when the header was absent
    pub content_type: String,
}

/// Trait for the upstream asynchronous generation service
#[async_trait]
pub trait JobUpstream: Send + Sync {
    /// Submit a generation job. Single attempt, bounded by `timeout`.
    async fn submit(&self, submission: &UpstreamSubmission, timeout: Duration)
        -> Result<JobHandle>;

    /// Query the current status of a job.
    ///
    /// Errors are [`AppError::PollCheckFailed`] and are treated as soft by the
    /// poller.
    async fn check_status(&self, job: &JobHandle) -> Result<JobStatusSnapshot>;

    /// Retrieve the finished image. Single attempt, bounded by `timeout`.
    async fn fetch_image(&self, locator: &ResultLocator, timeout: Duration)
        -> Result<ImagePayload>;
}
