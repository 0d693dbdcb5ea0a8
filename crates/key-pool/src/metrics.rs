//! Pool counters
//!
//! Emitted through the `metrics` facade; they are no-ops until a recorder is
//! installed. The `key-rotator` binary installs a Prometheus recorder and
//! reports them in `status`.
//!
//! - `key_pool_dispatch_total` (counter): label `key`
//! - `key_pool_exhausted_total` (counter): dispatches with no usable resource
//! - `key_pool_resets_total` (counter): quota windows rolled over
//! - `key_pool_snapshot_recovered_total` (counter): unreadable snapshots replaced

/// Record a request charged to `key`.
pub fn record_dispatch(key: &str) {
    metrics::counter!("key_pool_dispatch_total", "key" => key.to_string()).increment(1);
}

/// Record a dispatch that found every resource exhausted.
pub fn record_exhausted() {
    metrics::counter!("key_pool_exhausted_total").increment(1);
}

/// Record `count` resources whose quota window was reset.
pub fn record_resets(count: usize) {
    metrics::counter!("key_pool_resets_total").increment(count as u64);
}

/// Record a corrupt snapshot that was discarded.
pub fn record_snapshot_recovered() {
    metrics::counter!("key_pool_snapshot_recovered_total").increment(1);
}
