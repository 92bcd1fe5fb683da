//! Prometheus metrics, registered once into the default registry on first
//! access, mirroring the `static ...: Lazy<...>` idiom used for metrics
//! elsewhere in the tree.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

pub struct LfcMetrics {
    /// Current `ctl.size` (chunks ever allocated, including abandoned holes).
    pub size_chunks: IntGauge,
    /// Current `ctl.used` (live entries in the index).
    pub used_chunks: IntGauge,
    /// Current soft `size_limit_chunks`.
    pub size_limit_chunks: IntGauge,
    pub hits_total: IntCounter,
    pub misses_total: IntCounter,
    pub writes_total: IntCounter,
    pub evictions_total: IntCounter,
    pub shrink_ticks_total: IntCounter,
}

pub static LFC_METRICS: Lazy<LfcMetrics> = Lazy::new(|| LfcMetrics {
    size_chunks: register_int_gauge!("lfc_size_chunks", "Total chunk slots allocated").unwrap(),
    used_chunks: register_int_gauge!("lfc_used_chunks", "Live chunk entries in the index").unwrap(),
    size_limit_chunks: register_int_gauge!("lfc_size_limit_chunks", "Current soft size limit in chunks").unwrap(),
    hits_total: register_int_counter!("lfc_hits_total", "Cache read hits").unwrap(),
    misses_total: register_int_counter!("lfc_misses_total", "Cache read misses").unwrap(),
    writes_total: register_int_counter!("lfc_writes_total", "Cache page writes").unwrap(),
    evictions_total: register_int_counter!("lfc_evictions_total", "Page-level evictions").unwrap(),
    shrink_ticks_total: register_int_counter!(
        "lfc_shrink_ticks_total",
        "Pressure-monitor ticks that reduced the size limit"
    )
    .unwrap(),
});

pub struct PscMetrics {
    pub reconnects_total: IntCounter,
    pub connect_failures_total: IntCounter,
    pub shard_map_reloads_total: IntCounter,
    pub send_errors_total: IntCounter,
    pub recv_errors_total: IntCounter,
}

pub static PSC_METRICS: Lazy<PscMetrics> = Lazy::new(|| PscMetrics {
    reconnects_total: register_int_counter!("psc_reconnects_total", "Successful shard (re)connects").unwrap(),
    connect_failures_total: register_int_counter!("psc_connect_failures_total", "Failed shard connect attempts")
        .unwrap(),
    shard_map_reloads_total: register_int_counter!("psc_shard_map_reloads_total", "Observed shard-map changes")
        .unwrap(),
    send_errors_total: register_int_counter!("psc_send_errors_total", "Send errors across all shards").unwrap(),
    recv_errors_total: register_int_counter!("psc_recv_errors_total", "Receive errors across all shards").unwrap(),
});
