//! Response handling module - Rendering fetched images

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::backend::traits::ImagePayload;

/// Content type used when the upstream did not send a usable one
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

impl IntoResponse for ImagePayload {
    fn into_response(self) -> Response {
        let content_type = content_type_header(&self.content_type);
        (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], self.bytes).into_response()
    }
}

fn content_type_header(raw: &str) -> HeaderValue {
    if raw.is_empty() {
        return HeaderValue::from_static(FALLBACK_CONTENT_TYPE);
    }

    HeaderValue::from_str(raw).unwrap_or_else(|_| {
        warn!(content_type = %raw, "Upstream content type is not a valid header value");
        HeaderValue::from_static(FALLBACK_CONTENT_TYPE)
    })
}
