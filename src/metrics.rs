//! Prometheus metrics registry and instruments.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref OAUTH_EXCHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lgtm_oauth_exchanges_total", "Total number of OAuth code exchanges"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref COMMENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lgtm_comments_total", "Total number of LGTM comment submissions"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref UPSTREAM_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "lgtm_upstream_request_duration_seconds",
            "GitHub request duration in seconds"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"]
    ).expect("metric can be created");

    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lgtm_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(OAUTH_EXCHANGES_TOTAL.clone()))
        .expect("OAUTH_EXCHANGES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(COMMENTS_TOTAL.clone()))
        .expect("COMMENTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(UPSTREAM_REQUEST_DURATION_SECONDS.clone()))
        .expect("UPSTREAM_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

pub fn observe_upstream(operation: &str, elapsed: Duration) {
    UPSTREAM_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
}
