//! HTTP request metrics middleware

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::services::metrics::{HttpLabels, Metrics};

/// Label used for requests that did not match any route
const UNMATCHED_PATH: &str = "<unmatched>";

/// Count and time every request by method, route template and status
pub async fn track_http_metrics(
    State(metrics): State<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let started = Instant::now();
    let response = next.run(request).await;

    metrics.record_http_request(
        HttpLabels {
            method,
            path,
            status: response.status().as_u16().to_string(),
        },
        started.elapsed(),
    );

    response
}
