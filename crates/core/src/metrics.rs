//! Prometheus metrics for ingestion runs.
//!
//! This module provides metrics for:
//! - Discovery and recheck of Patchwork series
//! - Build dispatches
//! - External service latency (Patchwork, Jenkins)
//!
//! A run is a short-lived process, so metrics are exported by writing the
//! registry to a node_exporter textfile at the end of the run.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Registry holding every ingestion metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

// =============================================================================
// Ingestion
// =============================================================================

/// Series returned by discovery, by completeness.
pub static SERIES_DISCOVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "patchwork_ci_series_discovered_total",
            "Series newer than the watermark returned by discovery",
        ),
        &["repo", "state"], // "complete", "incomplete"
    )
    .unwrap()
});

/// Rechecks of pending series, by result.
pub static RECHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "patchwork_ci_recheck_total",
            "Rechecks of series waiting for more patches",
        ),
        &["repo", "result"], // "complete", "incomplete", "not_found", "error"
    )
    .unwrap()
});

/// Build dispatches, by result.
pub static DISPATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("patchwork_ci_dispatches_total", "Build submissions"),
        &["repo", "result"], // "submitted", "failed", "malformed"
    )
    .unwrap()
});

/// Per-repository run outcomes.
pub static REPO_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("patchwork_ci_repo_runs_total", "Repository runs"),
        &["repo", "result"], // "ok", "failed"
    )
    .unwrap()
});

// =============================================================================
// External services
// =============================================================================

/// External service request duration.
pub static EXTERNAL_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "patchwork_ci_external_request_duration_seconds",
            "Duration of requests to Patchwork and Jenkins",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["service", "operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record the duration of an external request started at `start`.
pub fn observe_external_request(service: &str, operation: &str, start: Instant) {
    EXTERNAL_REQUEST_DURATION
        .with_label_values(&[service, operation])
        .observe(start.elapsed().as_secs_f64());
}

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SERIES_DISCOVERED.clone()),
        Box::new(RECHECKS.clone()),
        Box::new(DISPATCHES.clone()),
        Box::new(REPO_RUNS.clone()),
        Box::new(EXTERNAL_REQUEST_DURATION.clone()),
    ]
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Write all metrics to a node_exporter textfile, atomically.
pub fn write_textfile(path: &Path) -> io::Result<()> {
    let text = encode_metrics().map_err(|e| io::Error::other(e.to_string()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}
