//! Functional tests for the HTTP API, end to end against a mocked upstream

use akashgen_gateway::{api::routes::create_router, config::Settings, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-bytes";

fn settings_for(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.upstream.generate_url = format!("{}/api/generate", server.uri());
    settings.upstream.status_url = format!("{}/api/status", server.uri());
    settings.upstream.image_base = server.uri();
    settings.polling.interval_ms = 10;
    settings.polling.max_duration_secs = 5;
    settings
}

fn create_test_app(server: &MockServer) -> (Arc<AppState>, Router) {
    let state = Arc::new(AppState::from_settings(settings_for(server)).unwrap());
    let app = create_router(state.clone());
    (state, app)
}

fn generate_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mount_submit(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": job_id })))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, job_id: &str, status: &str, result: &str) {
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .and(query_param("ids", job_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "job_id": job_id, "status": status, "result": result }
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    let (_, app) = create_test_app(&server);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_generate_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({
            "prompt": "a cat",
            "negative": "",
            "sampler": "euler",
            "scheduler": "karras",
            "preferred_gpu": ["RTX4090", "A10", "A100", "V100-32Gi", "H100"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "job-42" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, "job-42", "succeeded", "/images/job-42.png").await;
    Mock::given(method("GET"))
        .and(path("/images/job-42.png"))
        .and(query_param("w", "2048"))
        .and(query_param("q", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(IMAGE, "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let (state, app) = create_test_app(&server);
    let response = app
        .oneshot(generate_request(json!({
            "prompt": "a cat",
            "sampler": "euler",
            "scheduler": "karras",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], IMAGE);
    assert_eq!(state.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_missing_fields_return_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    let (state, app) = create_test_app(&server);
    let response = app
        .oneshot(generate_request(json!({ "prompt": "a cat" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "validation_error");
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("sampler"));
    assert!(details.contains("scheduler"));

    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(state.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_malformed_json_returns_client_error() {
    let server = MockServer::start().await;
    let (_, app) = create_test_app(&server);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{\"prompt\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "validation_error");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_rejection_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("queue full"))
        .mount(&server)
        .await;

    let (state, app) = create_test_app(&server);
    let response = app
        .oneshot(generate_request(json!({
            "prompt": "a cat",
            "sampler": "euler",
            "scheduler": "karras",
        })))
        .await
        .unwrap();

    assert!(response.status().is_server_error());
    let body = json_body(response).await;
    assert_eq!(body["error"], "upstream_rejected");
    assert!(body["details"].as_str().unwrap().contains("queue full"));
    assert_eq!(state.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_failed_job_never_fetches_image() {
    let server = MockServer::start().await;
    mount_submit(&server, "job-7").await;
    mount_status(&server, "job-7", "failed", "").await;
    Mock::given(method("GET"))
        .and(path("/images/job-7.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(IMAGE, "image/png"))
        .expect(0)
        .mount(&server)
        .await;

    let (state, app) = create_test_app(&server);
    let response = app
        .oneshot(generate_request(json!({
            "prompt": "a cat",
            "sampler": "euler",
            "scheduler": "karras",
        })))
        .await
        .unwrap();

    assert!(response.status().is_server_error());
    let body = json_body(response).await;
    assert_eq!(body["error"], "job_failed");
    assert!(body["details"].as_str().unwrap().contains("failed"));
    assert_eq!(state.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_image_rejection_is_server_error() {
    let server = MockServer::start().await;
    mount_submit(&server, "job-9").await;
    mount_status(&server, "job-9", "succeeded", "/images/job-9.png").await;
    Mock::given(method("GET"))
        .and(path("/images/job-9.png"))
        .respond_with(ResponseTemplate::new(404).set_body_string("expired"))
        .mount(&server)
        .await;

    let (state, app) = create_test_app(&server);
    let response = app
        .oneshot(generate_request(json!({
            "prompt": "a cat",
            "sampler": "euler",
            "scheduler": "karras",
        })))
        .await
        .unwrap();

    assert!(response.status().is_server_error());
    let body = json_body(response).await;
    assert_eq!(body["error"], "image_rejected");
    assert!(body["details"].as_str().unwrap().contains("expired"));
    assert_eq!(state.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_closed_gate_returns_service_unavailable() {
    let server = MockServer::start().await;
    let (state, app) = create_test_app(&server);
    state.gate().close();

    let response = app
        .oneshot(generate_request(json!({
            "prompt": "a cat",
            "sampler": "euler",
            "scheduler": "karras",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "shutting_down");
    assert!(server.received_requests().await.unwrap().is_empty());
}
