//! Prometheus metrics for the OIDC bridge.
//!
//! Counters are registered in the default registry on first use and exposed
//! by `GET /metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// ID tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oidc_bridge_tokens_issued_total",
        "Total number of ID tokens issued",
        &["algorithm"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Signing key pair lifecycle events.
pub static KEY_PAIR_EVENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oidc_bridge_key_pair_events_total",
        "Signing key pair persistence outcomes",
        &["outcome"]
    )
    .expect("Failed to register key_pair_events metric")
});

/// Per-guild role lookup outcomes.
pub static ROLE_LOOKUPS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oidc_bridge_role_lookups_total",
        "Per-guild role lookup outcomes",
        &["outcome"]
    )
    .expect("Failed to register role_lookups metric")
});

/// Upstream identity provider latency.
pub static UPSTREAM_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "oidc_bridge_upstream_latency_seconds",
        "Identity provider call latency in seconds",
        &["call"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register upstream_latency metric")
});

/// Record an ID token issuance.
pub fn record_token_issued(algorithm: &str) {
    TOKENS_ISSUED.with_label_values(&[algorithm]).inc();
}

/// Record a key pair event (`persisted`, `replaced_corrupt`, `lost_race`).
pub fn record_key_pair_event(outcome: &str) {
    KEY_PAIR_EVENTS.with_label_values(&[outcome]).inc();
}

/// Record a role lookup outcome.
pub fn record_role_lookup(outcome: &str) {
    ROLE_LOOKUPS.with_label_values(&[outcome]).inc();
}

/// Record upstream call latency.
pub fn record_upstream_latency(call: &str, duration_secs: f64) {
    UPSTREAM_LATENCY.with_label_values(&[call]).observe(duration_secs);
}

/// Render the default registry in the text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn render() -> Result<String, prometheus::Error> {
    let families = prometheus::gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
