// Integration tests for `ControlClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bob_api::{ControlClient, DetectorConfig, Error, PipelineState, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ControlClient) {
    let server = MockServer::start().await;
    let client = ControlClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

// ── Health probe ────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_ok_on_success_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "running" })))
        .mount(&server)
        .await;

    assert!(client.check_health().await);
}

#[tokio::test]
async fn test_health_false_on_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(!client.check_health().await);
}

#[tokio::test]
async fn test_health_false_when_unreachable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = ControlClient::from_reqwest(&uri, reqwest::Client::new()).unwrap();
    assert!(!client.check_health().await);
}

// ── Status ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_parses_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "running",
            "uptime": 42.5,
            "fps": 29.97,
            "detections_per_second": 3.0
        })))
        .mount(&server)
        .await;

    let status = client.status().await.unwrap();
    assert_eq!(status.status, PipelineState::Running);
    assert_eq!(status.fps, Some(29.97));
    assert_eq!(status.uptime, Some(42.5));
}

#[tokio::test]
async fn test_status_bad_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client.status().await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "<html>"));
}

// ── Start / stop ────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/start"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "message": "pipeline started" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.start().await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.message.as_deref(), Some("pipeline started"));
}

#[tokio::test]
async fn test_stop_with_empty_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/stop"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let resp = client.stop().await.unwrap();
    assert!(resp.success);
}

#[tokio::test]
async fn test_start_failure_status() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/start"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 500 }));
}

#[tokio::test]
async fn test_slow_backend_reports_configured_timeout() {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        timeout: Duration::from_secs(1),
        ..TransportConfig::default()
    };
    let client = ControlClient::new(server.uri().parse().unwrap(), &transport).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/start"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_secs: 1 }));
}

// ── Config ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_config_posts_thresholds() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/config"))
        .and(body_json(
            json!({ "confidence": 0.6, "nms": 0.45, "source": "camera" }),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update_config(&DetectorConfig {
            confidence: 0.6,
            nms: 0.45,
            source: "camera".into(),
        })
        .await;
}

#[tokio::test]
async fn test_update_config_swallows_failures() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    // Must not panic or surface an error.
    client
        .update_config(&DetectorConfig {
            confidence: 0.5,
            nms: 0.4,
            source: "camera".into(),
        })
        .await;
}
