//! Prometheus metrics for the swap service.
//!
//! Everything lives in the default registry so `/metrics` can gather it with
//! [`encode_metrics`].

use once_cell::sync::Lazy;
use prometheus::{
    opts, register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

use crate::models::notification::NotificationKind;
use crate::models::request::SwapStatus;

pub struct SwapMetrics {
    requests_created: IntCounter,
    transitions: IntCounterVec,
    notifications: IntCounterVec,
    errors: IntCounterVec,
}

static METRICS: Lazy<SwapMetrics> = Lazy::new(|| SwapMetrics {
    requests_created: register_int_counter!(opts!(
        "skillswap_requests_created_total",
        "Swap requests created"
    ))
    .expect("failed to register skillswap_requests_created_total"),
    transitions: register_int_counter_vec!(
        opts!(
            "skillswap_request_transitions_total",
            "Swap request status transitions by target status"
        ),
        &["status"]
    )
    .expect("failed to register skillswap_request_transitions_total"),
    notifications: register_int_counter_vec!(
        opts!(
            "skillswap_notifications_total",
            "Notifications persisted by type"
        ),
        &["type"]
    )
    .expect("failed to register skillswap_notifications_total"),
    errors: register_int_counter_vec!(
        opts!("skillswap_errors_total", "API errors by code"),
        &["code"]
    )
    .expect("failed to register skillswap_errors_total"),
});

pub fn record_request_created() {
    METRICS.requests_created.inc();
}

pub fn record_transition(status: SwapStatus) {
    METRICS
        .transitions
        .with_label_values(&[status.as_str()])
        .inc();
}

pub fn record_notification(kind: NotificationKind) {
    METRICS
        .notifications
        .with_label_values(&[kind.as_str()])
        .inc();
}

pub fn record_error(code: &str) {
    METRICS.errors.with_label_values(&[code]).inc();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> String {
    Lazy::force(&METRICS);
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
