//! Prometheus metrics registry
//!
//! Holds the families recorded by the HTTP metrics middleware and the monitor
//! cycle gauge, and renders them in the Prometheus text exposition format.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::metrics::info::Info;
use prometheus_client::registry::Registry;

/// Content type of the text exposition format served at the metrics endpoint
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    /// Route template, not the raw URI
    pub path: String,
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct BuildLabels {
    version: String,
}

/// Shared metrics handle; clones refer to the same registry
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    http_requests: Family<HttpLabels, Counter>,
    http_request_duration: Family<HttpLabels, Histogram>,
    last_cycle_duration: Gauge<f64, AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Number of HTTP requests handled",
            http_requests.clone(),
        );

        let http_request_duration = Family::<HttpLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.005, 2.0, 12))
        });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            http_request_duration.clone(),
        );

        let last_cycle_duration = Gauge::<f64, AtomicU64>::default();
        registry.register(
            "monitor_last_cycle_duration_seconds",
            "Duration of the most recent monitoring cycle in seconds",
            last_cycle_duration.clone(),
        );

        registry.register(
            "wm_resource_monitor_build",
            "Build information",
            Info::new(BuildLabels {
                version: env!("CARGO_PKG_VERSION").to_string(),
            }),
        );

        Self {
            registry: Arc::new(registry),
            http_requests,
            http_request_duration,
            last_cycle_duration,
        }
    }

    /// Record one handled HTTP request
    pub fn record_http_request(&self, labels: HttpLabels, elapsed: Duration) {
        self.http_requests.get_or_create(&labels).inc();
        self.http_request_duration
            .get_or_create(&labels)
            .observe(elapsed.as_secs_f64());
    }

    /// Record the duration of a completed monitoring cycle
    pub fn record_cycle(&self, duration: Duration) {
        self.last_cycle_duration.set(duration.as_secs_f64());
    }

    /// Render every registered metric in text format
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
