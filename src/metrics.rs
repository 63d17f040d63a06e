// src/metrics.rs

//! Prometheus metrics for the control plane, registered once globally
//! via `lazy_static`.

use lazy_static::lazy_static;
use prometheus::{register_counter, register_gauge, Counter, Gauge, TextEncoder};

lazy_static! {
    /// The locally known smap version. Bumps on every successful
    /// regular handoff or force-join commit.
    pub static ref SMAP_VERSION: Gauge =
        register_gauge!("storcp_smap_version", "Current locally installed smap version.").unwrap();
    /// 1 if this node currently believes itself primary, 0 otherwise.
    pub static ref IS_PRIMARY: Gauge =
        register_gauge!("storcp_is_primary", "Whether this node is currently primary (1) or not (0).").unwrap();

    pub static ref HANDOFF_ATTEMPTS_TOTAL: Counter = register_counter!(
        "storcp_handoff_attempts_total",
        "Total regular primary-handoff attempts initiated."
    )
    .unwrap();
    pub static ref HANDOFF_SUCCESS_TOTAL: Counter = register_counter!(
        "storcp_handoff_success_total",
        "Total regular primary-handoffs that committed successfully."
    )
    .unwrap();

    pub static ref FORCE_JOIN_ATTEMPTS_TOTAL: Counter = register_counter!(
        "storcp_force_join_attempts_total",
        "Total force-join sequences initiated."
    )
    .unwrap();
    pub static ref FORCE_JOIN_SUCCESS_TOTAL: Counter = register_counter!(
        "storcp_force_join_success_total",
        "Total force-join sequences that completed through step 10."
    )
    .unwrap();
    pub static ref FORCE_JOIN_ROLLBACK_TOTAL: Counter = register_counter!(
        "storcp_force_join_rollback_total",
        "Total force-join sequences that rolled back before commit."
    )
    .unwrap();

    pub static ref METASYNC_DELIVERY_FAILURES_TOTAL: Counter = register_counter!(
        "storcp_metasync_delivery_failures_total",
        "Total per-node metasync deliveries that exhausted their retry budget."
    )
    .unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus
/// text exposition format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
