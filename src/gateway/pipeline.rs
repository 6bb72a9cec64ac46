//! Request orchestration: admission, submission, polling, and image fetch

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::backend::poller::{JobPoller, PollConfig};
use crate::backend::traits::{GenerateBody, ImagePayload, JobUpstream, UpstreamSubmission};
use crate::config::Settings;
use crate::error::Result;
use crate::gateway::admission::AdmissionGate;

/// Fixed parameters of every orchestration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub preferred_gpus: Vec<String>,
    pub submit_timeout: Duration,
    pub image_fetch_timeout: Duration,
    pub poll: PollConfig,
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            preferred_gpus: settings.upstream.preferred_gpus.clone(),
            submit_timeout: settings.timeouts.generate(),
            image_fetch_timeout: settings.timeouts.image_fetch(),
            poll: PollConfig::from(&settings.polling),
        }
    }
}

/// Runs one generation request end to end
pub struct GenerationPipeline {
    gate: AdmissionGate,
    upstream: Arc<dyn JobUpstream>,
    poller: JobPoller,
    config: PipelineConfig,
}

impl GenerationPipeline {
    pub fn new(gate: AdmissionGate, upstream: Arc<dyn JobUpstream>, config: PipelineConfig) -> Self {
        let poller = JobPoller::new(upstream.clone(), config.poll);
        Self {
            gate,
            upstream,
            poller,
            config,
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Generate an image for `body`.
    ///
    /// Holds one admission slot for the whole call. The first failing stage
    /// ends the request and its error is returned as is.
    pub async fn generate(&self, body: GenerateBody) -> Result<ImagePayload> {
        let request_id = Uuid::new_v4();
        let span = info_span!("generate", %request_id);

        async move {
            let result = self.run(body).await;
            if let Err(e) = &result {
                error!(error = %e, code = e.code(), "Generation request failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, body: GenerateBody) -> Result<ImagePayload> {
        let _permit = self.gate.acquire().await?;

        let request = body.validate()?;

        info!(
            prompt = %request.prompt,
            sampler = %request.sampler,
            scheduler = %request.scheduler,
            "Received generate request"
        );

        let submission = UpstreamSubmission::new(request, self.config.preferred_gpus.clone());

        let job = self
            .upstream
            .submit(&submission, self.config.submit_timeout)
            .await?;

        info!(job_id = %job, "Generate request sent successfully");

        let cancel = self.gate.abort_token();
        let locator = self.poller.poll(&job, &cancel).await?;

        let image = self
            .upstream
            .fetch_image(&locator, self.config.image_fetch_timeout)
            .await?;

        info!(
            job_id = %job,
            content_type = %image.content_type,
            size = image.bytes.len(),
            "Image fetched successfully"
        );

        Ok(image)
    }
}
