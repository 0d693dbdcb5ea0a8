//! Prometheus recorder for the pool counters
//!
//! The binary runs one command per process, so counters only cover that run:
//! load-time resets and snapshot recovery, plus the command's own dispatches.
//! `status` includes them as a flat JSON object keyed by series.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::{Map, Value};

/// Install the Prometheus recorder globally and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Current series as `{"name{labels}": value}`.
pub fn series(handle: &PrometheusHandle) -> Value {
    parse_exposition(&handle.render())
}

fn parse_exposition(text: &str) -> Value {
    let mut series = Map::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.rsplit_once(' ') else {
            continue;
        };
        if let Ok(value) = value.parse::<f64>() {
            series.insert(name.to_string(), Value::from(value));
        }
    }
    Value::Object(series)
}
