//! HTTP client for the Akash Gen upstream

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::backend::traits::{
    ImagePayload, JobHandle, JobStatus, JobStatusSnapshot, JobUpstream, ResultLocator,
    UpstreamSubmission, WorkerInfo,
};
use crate::config::Settings;
use crate::error::{AppError, Result};

/// Upstream generation service reached over HTTP
pub struct HttpBackend {
    client: Client,
    generate_url: String,
    status_url: String,
    image_base: String,
    image_width: u32,
    image_quality: u32,
    status_timeout: Duration,
}

/// Response from the submission endpoint
#[derive(Debug, Deserialize)]
struct ApiGenerateResponse {
    job_id: String,
}

/// One element of the status endpoint's array response
#[derive(Debug, Deserialize)]
struct ApiStatusEntry {
    #[serde(default)]
    job_id: String,
    #[serde(default)]
    worker_name: String,
    #[serde(default)]
    worker_city: String,
    #[serde(default)]
    worker_country: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    result: String,
    #[serde(default)]
    worker_gpu: String,
    #[serde(default)]
    elapsed_time: f64,
    #[serde(default)]
    queue_position: i64,
}

impl From<ApiStatusEntry> for JobStatusSnapshot {
    fn from(entry: ApiStatusEntry) -> Self {
        Self {
            job_id: entry.job_id,
            status: JobStatus::parse(&entry.status),
            result: entry.result,
            queue_position: entry.queue_position,
            elapsed_time: entry.elapsed_time,
            worker: WorkerInfo {
                name: entry.worker_name,
                city: entry.worker_city,
                country: entry.worker_country,
                gpu: entry.worker_gpu,
            },
        }
    }
}

impl HttpBackend {
    /// Create a new upstream client from configuration
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            generate_url: settings.upstream.generate_url.clone(),
            status_url: settings.upstream.status_url.clone(),
            image_base: settings.upstream.image_base.clone(),
            image_width: settings.upstream.image_width,
            image_quality: settings.upstream.image_quality,
            status_timeout: settings.timeouts.status(),
        })
    }

    /// Full image URL for a result locator.
    ///
    /// Locators usually carry their own query string already, in which case
    /// the size parameters are appended with `&`.
    pub fn image_url(&self, locator: &ResultLocator) -> String {
        let separator = if locator.as_str().contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}w={}&q={}",
            self.image_base.trim_end_matches('/'),
            locator,
            separator,
            self.image_width,
            self.image_quality
        )
    }
}

#[async_trait]
impl JobUpstream for HttpBackend {
    async fn submit(
        &self,
        submission: &UpstreamSubmission,
        timeout: Duration,
    ) -> Result<JobHandle> {
        debug!(url = %self.generate_url, "Sending generate request");

        let response = self
            .client
            .post(&self.generate_url)
            .timeout(timeout)
            .json(submission)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response
            .json::<ApiGenerateResponse>()
            .await
            .map_err(|e| AppError::UpstreamMalformed(e.to_string()))?;

        if parsed.job_id.is_empty() {
            return Err(AppError::UpstreamMalformed(
                "response carried an empty job_id".to_string(),
            ));
        }

        Ok(JobHandle::new(parsed.job_id))
    }

    async fn check_status(&self, job: &JobHandle) -> Result<JobStatusSnapshot> {
        let response = self
            .client
            .get(&self.status_url)
            .query(&[("ids", job.as_str())])
            .timeout(self.status_timeout)
            .send()
            .await
            .map_err(|e| AppError::PollCheckFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PollCheckFailed(format!(
                "status API error: {}, body: {}",
                status.as_u16(),
                body
            )));
        }

        let entries = response
            .json::<Vec<ApiStatusEntry>>()
            .await
            .map_err(|e| {
                AppError::PollCheckFailed(format!("failed to decode status response: {}", e))
            })?;

        entries
            .into_iter()
            .next()
            .map(JobStatusSnapshot::from)
            .ok_or_else(|| {
                AppError::PollCheckFailed(format!("no status returned for job_id: {}", job))
            })
    }

    async fn fetch_image(
        &self,
        locator: &ResultLocator,
        timeout: Duration,
    ) -> Result<ImagePayload> {
        let url = self.image_url(locator);
        debug!(url = %url, "Fetching image");

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::ImageUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ImageRejected {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ImageReadError(e.to_string()))?;

        Ok(ImagePayload {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
