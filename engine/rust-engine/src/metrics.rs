use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Attempt lifecycle metrics
    pub static ref ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempts_total",
        "Total number of assessment attempts by lifecycle event",
        &["status"]
    )
    .unwrap();

    pub static ref ATTEMPTS_ACTIVE: IntGauge = register_int_gauge!(
        "attempts_active",
        "Number of attempts currently in progress"
    )
    .unwrap();

    // Integrity metrics
    pub static ref INTEGRITY_VIOLATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "integrity_violations_total",
        "Total number of integrity violations detected",
        &["kind"]
    )
    .unwrap();

    pub static ref FORCE_SUBMITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "force_submits_total",
        "Total number of system-initiated submissions",
        &["reason"]
    )
    .unwrap();

    // Persistence metrics
    pub static ref SNAPSHOT_SAVES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "snapshot_saves_total",
        "Total number of snapshot saves",
        &["trigger", "outcome"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
