//! Common error types for the generation relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to send generate request: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream generate API error: {status}, body: {body}")]
    UpstreamRejected { status: u16, body: String },

    #[error("Failed to decode generate response: {0}")]
    UpstreamMalformed(String),

    #[error("Failed to check job status: {0}")]
    PollCheckFailed(String),

    #[error("Job {job_id} failed with status: {status}")]
    JobFailed { job_id: String, status: String },

    #[error("Polling timeout exceeded: {0}")]
    PollingTimeout(String),

    #[error("Failed to fetch image: {0}")]
    ImageUnavailable(String),

    #[error("Image fetch error: {status}, body: {body}")]
    ImageRejected { status: u16, body: String },

    #[error("Failed to read image data: {0}")]
    ImageReadError(String),

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error category reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Validation(_) => "validation_error",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::UpstreamRejected { .. } => "upstream_rejected",
            AppError::UpstreamMalformed(_) => "upstream_malformed",
            AppError::PollCheckFailed(_) => "poll_check_failed",
            AppError::JobFailed { .. } => "job_failed",
            AppError::PollingTimeout(_) => "polling_timeout",
            AppError::ImageUnavailable(_) => "image_unavailable",
            AppError::ImageRejected { .. } => "image_rejected",
            AppError::ImageReadError(_) => "image_read_error",
            AppError::ShuttingDown => "shutting_down",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamUnavailable(_)
            | AppError::UpstreamRejected { .. }
            | AppError::UpstreamMalformed(_)
            | AppError::JobFailed { .. }
            | AppError::ImageUnavailable(_)
            | AppError::ImageRejected { .. }
            | AppError::ImageReadError(_) => StatusCode::BAD_GATEWAY,
            AppError::PollingTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_)
            | AppError::PollCheckFailed(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body: `{"error": <code>, "details": <message>}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            details: self.to_string(),
        });

        (self.status_code(), body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
