//! Client certificate role gate integration tests
//!
//! Mounts a protected route next to the public API and checks the
//! 401 / 403 / pass-through outcomes for certificates arriving the way a
//! reverse proxy forwards them.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Extension, Router,
};
use rstest::rstest;

use wm_resource_monitor::{
    create_app_with_routes, middleware::protect, middleware::SslClientCert, services::Role,
    AppState,
};

use crate::common::{test_config, TestApp, ADMIN_CERT_PEM};

const PROTECTED: &str = "/wm_resource_monitor/api/admin";

async fn whoami(Extension(role): Extension<Role>) -> String {
    role.to_string()
}

fn app_with_protected_route(role_source: &str, allowed: &[&str]) -> TestApp {
    let mut config = test_config();
    config.security.role_source = role_source.to_string();

    let state = AppState::new(config).expect("Failed to create test state");
    let protected = protect(
        Router::new().route(PROTECTED, get(whoami)),
        state.cert_gate(allowed.iter().copied()),
    );
    let router =
        create_app_with_routes(state.clone(), protected).expect("Failed to build test router");

    TestApp::with_router(state, router)
}

fn encoded_admin_cert() -> String {
    urlencoding::encode(ADMIN_CERT_PEM).into_owned()
}

#[tokio::test]
async fn test_allowed_role_passes_through() {
    let app = app_with_protected_route("subject_ou", &["admin", "operator"]);
    let response = app
        .get_with_headers(PROTECTED, &[("x-ssl-client-cert", encoded_admin_cert().as_str())])
        .await;

    response.assert_ok();
    assert_eq!(response.text(), "admin");
}

#[tokio::test]
async fn test_missing_certificate_is_unauthorized() {
    let app = app_with_protected_route("subject_ou", &["admin"]);
    let response = app.get(PROTECTED).await;

    response.assert_unauthorized();
    let json: serde_json::Value = response.json();
    assert_eq!(json["error"], "unauthorized");
}

#[rstest]
#[case::empty("")]
#[case::not_pem("definitely-not-a-certificate")]
#[case::truncated("-----BEGIN%20CERTIFICATE-----%0AMIIB%0A")]
#[tokio::test]
async fn test_unusable_certificate_is_unauthorized(#[case] header_value: &str) {
    let app = app_with_protected_route("subject_ou", &["admin"]);
    let response = app
        .get_with_headers(PROTECTED, &[("x-ssl-client-cert", header_value)])
        .await;

    response.assert_unauthorized();
}

#[rstest]
#[case::role_not_allowed("subject_ou", &["operator"])]
#[case::empty_allow_list("subject_ou", &[])]
#[case::no_role_source("none", &["admin"])]
#[case::missing_extension("extension:1.3.6.1.4.1.55555.1.1", &["admin"])]
#[tokio::test]
async fn test_forbidden(#[case] role_source: &str, #[case] allowed: &[&str]) {
    let app = app_with_protected_route(role_source, allowed);
    let response = app
        .get_with_headers(PROTECTED, &[("x-ssl-client-cert", encoded_admin_cert().as_str())])
        .await;

    response.assert_forbidden();
    let json: serde_json::Value = response.json();
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn test_role_from_common_name() {
    let app = app_with_protected_route("subject_cn", &["agent-01.example.com"]);
    let response = app
        .get_with_headers(PROTECTED, &[("x-ssl-client-cert", encoded_admin_cert().as_str())])
        .await;

    response.assert_ok();
    assert_eq!(response.text(), "agent-01.example.com");
}

#[tokio::test]
async fn test_custom_certificate_header() {
    let mut config = test_config();
    config.security.client_cert_header = "X-Client-Cert".to_string();

    let state = AppState::new(config).unwrap();
    let router = protect(
        Router::new().route(PROTECTED, get(whoami)),
        state.cert_gate(["admin"]),
    );
    let app = TestApp::with_router(state, router);

    app.get_with_headers(PROTECTED, &[("x-ssl-client-cert", encoded_admin_cert().as_str())])
        .await
        .assert_unauthorized();
    app.get_with_headers(PROTECTED, &[("x-client-cert", encoded_admin_cert().as_str())])
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_certificate_from_tls_layer() {
    let app = app_with_protected_route("subject_ou", &["admin"]);

    let mut request = Request::builder()
        .uri(PROTECTED)
        .header("x-ssl-client-cert", "garbage")
        .body(Body::empty())
        .unwrap();
    request
        .extensions_mut()
        .insert(SslClientCert(ADMIN_CERT_PEM.to_string()));

    let response = app.request(request).await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_public_routes_stay_open() {
    let app = app_with_protected_route("subject_ou", &["admin"]);
    app.get("/wm_resource_monitor/api/status").await.assert_ok();
}

#[tokio::test]
async fn test_gated_requests_go_through_the_middleware_stack() {
    let app = app_with_protected_route("subject_ou", &["admin"]);

    app.get(PROTECTED).await.assert_unauthorized();
    app.get_with_headers(PROTECTED, &[("x-ssl-client-cert", encoded_admin_cert().as_str())])
        .await
        .assert_ok();

    let text = app.get("/wm_resource_monitor/api/metrics").await.text();
    assert!(text.contains(
        r#"http_requests_total{method="GET",path="/wm_resource_monitor/api/admin",status="401"} 1"#
    ));
    assert!(text.contains(
        r#"http_requests_total{method="GET",path="/wm_resource_monitor/api/admin",status="200"} 1"#
    ));
}

#[tokio::test]
async fn test_gated_responses_are_compressed() {
    let app = app_with_protected_route("subject_ou", &["admin"]);
    let response = app
        .get_with_headers(PROTECTED, &[("accept-encoding", "gzip")])
        .await;

    response.assert_unauthorized();
    assert_eq!(response.header("content-encoding"), Some("gzip"));
}
