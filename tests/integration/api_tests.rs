//! API integration tests
//!
//! Tests the public endpoints through the full middleware stack.

use axum::{body::Body, http::Request, http::StatusCode};
use chrono::Utc;
use std::time::Duration;

use crate::common::{test_config, test_config_without_metrics, TestApp};

#[tokio::test]
async fn test_index_page() {
    let app = TestApp::new();
    let response = app.get("/wm_resource_monitor").await;

    response.assert_ok();
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/html"));
    assert!(response.text().contains("WM Resource Monitor"));
}

#[tokio::test]
async fn test_status_endpoint() {
    let app = TestApp::new();
    let response = app.get("/wm_resource_monitor/api/status").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["uptime"].as_f64().unwrap() >= 0.0);
    assert!(json["last_cycle_duration"].is_null());
    assert!(json["last_cycle_start"].is_null());
    assert!(json["timestamp"].as_str().unwrap().ends_with("+00:00"));
    assert!(json["rust_version"].is_string());
}

#[tokio::test]
async fn test_status_reports_last_cycle() {
    let app = TestApp::new();
    app.state
        .record_cycle(Utc::now(), Duration::from_millis(1500));

    let json: serde_json::Value = app.get("/wm_resource_monitor/api/status").await.json();
    assert_eq!(json["last_cycle_duration"], 1.5);
    assert!(json["last_cycle_start"].is_string());
}

#[tokio::test]
async fn test_api_index_lists_absolute_urls() {
    let app = TestApp::new();
    let response = app
        .get_with_headers("/wm_resource_monitor/api", &[("host", "monitor.local:5000")])
        .await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(
        json["endpoints"]["status"],
        "http://monitor.local:5000/wm_resource_monitor/api/status"
    );
    assert_eq!(
        json["endpoints"]["metrics"],
        "http://monitor.local:5000/wm_resource_monitor/api/metrics"
    );
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_api_index_behind_proxy() {
    let app = TestApp::new();
    let response = app
        .get_with_headers(
            "/wm_resource_monitor/api",
            &[
                ("host", "127.0.0.1:5000"),
                ("x-forwarded-proto", "https"),
                ("x-forwarded-host", "monitor.example.com"),
            ],
        )
        .await;

    let json: serde_json::Value = response.json();
    assert_eq!(
        json["endpoints"]["status"],
        "https://monitor.example.com/wm_resource_monitor/api/status"
    );
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();
    app.get("/wm_resource_monitor/api/status").await.assert_ok();

    let response = app.get("/wm_resource_monitor/api/metrics").await;
    response.assert_ok();
    assert_eq!(
        response.header("content-type"),
        Some("text/plain; version=0.0.4; charset=utf-8")
    );

    let text = response.text();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains(r#"path="/wm_resource_monitor/api/status""#));
    assert!(text.contains("wm_resource_monitor_build_info"));
}

#[tokio::test]
async fn test_custom_metrics_endpoint() {
    let mut config = test_config();
    config.metrics.endpoint = "/prometheus".to_string();
    let app = TestApp::with_config(config);

    app.get("/wm_resource_monitor/api/prometheus").await.assert_ok();
    app.get("/wm_resource_monitor/api/metrics")
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_metrics_disabled() {
    let app = TestApp::with_config(test_config_without_metrics());

    app.get("/wm_resource_monitor/api/metrics")
        .await
        .assert_not_found();

    let json: serde_json::Value = app.get("/wm_resource_monitor/api").await.json();
    assert!(json["endpoints"].get("metrics").is_none());
    assert!(json["endpoints"]["status"].is_string());
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = TestApp::new();
    let response = app.get("/wm_resource_monitor/api/nope").await;

    response.assert_not_found();
    let json: serde_json::Value = response.json();
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_gzip_compression() {
    let app = TestApp::new();
    let response = app
        .get_with_headers("/wm_resource_monitor", &[("accept-encoding", "gzip")])
        .await;

    response.assert_ok();
    assert_eq!(response.header("content-encoding"), Some("gzip"));
}

#[tokio::test]
async fn test_oversized_request_rejected() {
    let mut config = test_config();
    config.server.max_request_size = "1KB".to_string();
    let app = TestApp::with_config(config);

    let request = Request::builder()
        .method("GET")
        .uri("/wm_resource_monitor/api/status")
        .header("content-length", "4096")
        .body(Body::from(vec![b'x'; 4096]))
        .unwrap();

    let response = app.request(request).await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}
