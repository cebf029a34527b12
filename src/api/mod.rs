//! API routes and handlers
//!
//! This module defines all endpoints and their routing.

use axum::{extract::State, response::Html, routing::get, Json, Router};
use serde::Serialize;

use crate::config::MetricsConfig;
use crate::middleware::ExternalBase;
use crate::AppState;

mod metrics;
mod status;

pub use metrics::metrics;
pub use status::{get_status, StatusResponse, RUST_VERSION};

/// Root of every route served by this application
pub const APP_PREFIX: &str = "/wm_resource_monitor";

/// Prefix of the JSON/metrics API
pub const API_PREFIX: &str = "/wm_resource_monitor/api";

/// Status route, relative to [`API_PREFIX`]
pub const STATUS_ENDPOINT: &str = "/status";

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Build the application routes
pub fn routes(metrics_config: &MetricsConfig) -> Router<AppState> {
    let router = Router::new()
        .route(APP_PREFIX, get(index))
        .route(API_PREFIX, get(api_index))
        .route(&format!("{API_PREFIX}{STATUS_ENDPOINT}"), get(get_status));

    if metrics_config.enabled {
        router.route(&metrics_path(metrics_config), get(metrics))
    } else {
        router
    }
}

fn metrics_path(metrics_config: &MetricsConfig) -> String {
    format!("{API_PREFIX}{}", metrics_config.endpoint)
}

/// GET /wm_resource_monitor
///
/// Application description page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// API index body
#[derive(Debug, Serialize)]
pub struct ApiIndex {
    pub endpoints: ApiEndpoints,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ApiEndpoints {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
}

/// GET /wm_resource_monitor/api
///
/// Lists the available API endpoints as absolute URLs.
pub async fn api_index(State(state): State<AppState>, base: ExternalBase) -> Json<ApiIndex> {
    let metrics_config = &state.config.metrics;

    Json(ApiIndex {
        endpoints: ApiEndpoints {
            status: base.url_for(&format!("{API_PREFIX}{STATUS_ENDPOINT}")),
            metrics: metrics_config
                .enabled
                .then(|| base.url_for(&metrics_path(metrics_config))),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
