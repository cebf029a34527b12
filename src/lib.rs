//! WM Resource Monitor Library
//!
//! HTTP surface of the WM resource monitor: status and Prometheus endpoints,
//! plus the client certificate role gate used to protect routes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::{
    compression::CompressionLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    CompressionLevel,
};
use tracing::Level;

pub mod api;
pub mod config;
pub mod middleware;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use middleware::{CertRoleError, CertRoleGate};
use services::role_deriver::{self, Role, RoleDeriver};
use services::{Metrics, MonitorState};
use utils::error::AppError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Uptime and last monitoring cycle
    pub monitor: Arc<MonitorState>,
    /// Prometheus registry and collectors
    pub metrics: Metrics,
    /// Reads roles out of client certificates, chosen by `security.role_source`
    pub role_deriver: Arc<dyn RoleDeriver>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let role_deriver = role_deriver::from_role_source(&config.security.role_source)
            .context("Invalid security.role_source")?;

        Ok(Self {
            config,
            monitor: Arc::new(MonitorState::new()),
            metrics: Metrics::new(),
            role_deriver,
        })
    }

    /// Report a finished monitoring cycle
    pub fn record_cycle(&self, started_at: DateTime<Utc>, duration: Duration) {
        self.monitor.record_cycle(started_at, duration);
        self.metrics.record_cycle(duration);
    }

    /// Role gate admitting `allowed_roles`, using the configured deriver and
    /// certificate header
    pub fn cert_gate<I, R>(&self, allowed_roles: I) -> CertRoleGate
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        CertRoleGate::new(allowed_roles, self.role_deriver.clone())
            .with_cert_header(&self.config.security.client_cert_header)
    }
}

/// Build the full application router with its middleware stack
pub fn create_app(state: AppState) -> anyhow::Result<Router> {
    create_app_with_routes(state, Router::new())
}

/// Build the application router with extra routes, typically groups wrapped
/// with [`middleware::protect`], mounted inside the middleware stack
pub fn create_app_with_routes(
    state: AppState,
    extra_routes: Router<AppState>,
) -> anyhow::Result<Router> {
    let server = &state.config.server;
    let body_limit = server
        .max_request_bytes()
        .context("Invalid server.max_request_size")?;
    let compression = CompressionLayer::new()
        .quality(CompressionLevel::Precise(server.compression_level as i32));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let mut router = api::routes(&state.config.metrics)
        .merge(extra_routes)
        .fallback(not_found);

    if state.config.metrics.enabled {
        router = router.layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            middleware::track_http_metrics,
        ));
    }

    Ok(router
        .layer(compression)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(trace_layer)
        .with_state(state))
}

async fn not_found() -> AppError {
    AppError::NotFound("No route for this path".to_string())
}
