//! Prometheus metrics endpoint

use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};

use crate::services::metrics::PROMETHEUS_CONTENT_TYPE;
use crate::utils::error::AppResult;
use crate::AppState;

/// GET /wm_resource_monitor/api/metrics
pub async fn metrics(State(state): State<AppState>) -> AppResult<Response> {
    let body = state.metrics.render()?;
    Ok(([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response())
}
