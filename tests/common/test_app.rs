//! Test application setup utilities
//!
//! Provides utilities for setting up test instances of the application
//! with the production middleware stack.

use axum::{body::Body, http::Request, Router};
use tower::ServiceExt;

use wm_resource_monitor::{
    config::{AppConfig, LoggingConfig, MetricsConfig, SecurityConfig, ServerConfig},
    create_app, AppState,
};

/// PEM certificate with `CN=agent-01.example.com, OU=admin`
pub const ADMIN_CERT_PEM: &str = include_str!("../fixtures/client-ou-admin.pem");

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application with the default test configuration
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a new test application with custom configuration
    pub fn with_config(config: AppConfig) -> Self {
        let state = AppState::new(config).expect("Failed to create test state");
        let router = create_app(state.clone()).expect("Failed to build test router");

        Self { router, state }
    }

    /// Wrap the router, e.g. to merge additional protected routes
    pub fn with_router(state: AppState, router: Router) -> Self {
        Self { router, state }
    }

    /// Make a GET request to the test application
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make a GET request with extra headers
    pub async fn get_with_headers(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    /// Value of a response header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Assert the response status
    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Assert the response status is OK (200)
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    /// Assert the response status is Unauthorized (401)
    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    /// Assert the response status is Forbidden (403)
    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::FORBIDDEN)
    }

    /// Assert the response status is Not Found (404)
    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }
}

/// Create a test configuration: console logging, metrics on, roles from the OU
pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            workers: 1,
            ..ServerConfig::default()
        },
        security: SecurityConfig {
            role_source: "subject_ou".to_string(),
            ..SecurityConfig::default()
        },
        logging: LoggingConfig::default(),
        metrics: MetricsConfig::default(),
    }
}

/// Test configuration with the metrics endpoint switched off
pub fn test_config_without_metrics() -> AppConfig {
    let mut config = test_config();
    config.metrics.enabled = false;
    config
}
