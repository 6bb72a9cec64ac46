//! Akash Gen relay gateway
//!
//! Accepts image generation requests, submits them to the upstream
//! generation service, polls the asynchronous job until it finishes and
//! streams the resulting image back. Concurrency is bounded by an
//! admission gate that also coordinates graceful shutdown.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod response;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::http_backend::HttpBackend;
use backend::traits::JobUpstream;
use gateway::admission::AdmissionGate;
use gateway::pipeline::{GenerationPipeline, PipelineConfig};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub pipeline: Arc<GenerationPipeline>,
}

impl AppState {
    /// Wire the pipeline against the real upstream described by `settings`
    pub fn from_settings(settings: config::Settings) -> Result<Self> {
        let upstream: Arc<dyn JobUpstream> = Arc::new(HttpBackend::new(&settings)?);
        Ok(Self::with_upstream(settings, upstream))
    }

    /// Wire the pipeline against an arbitrary upstream
    pub fn with_upstream(settings: config::Settings, upstream: Arc<dyn JobUpstream>) -> Self {
        let gate = AdmissionGate::new(settings.admission.max_concurrent);
        let pipeline = GenerationPipeline::new(gate, upstream, PipelineConfig::from(&settings));

        Self {
            settings: Arc::new(settings),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        self.pipeline.gate()
    }
}
