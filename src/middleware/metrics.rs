//! Prometheus metrics for scans and the scan log path.
//!
//! Exposed on `/metrics`. Each `ScanMetrics` owns its registry so several
//! instances (tests, multiple routers) never collide on registration.

use anyhow::Context;
use prometheus::{
    histogram_opts, opts, Encoder, HistogramVec, IntCounter, IntCounterVec, Registry,
    TextEncoder,
};

use crate::models::scan::{ScanResult, ValidationOutcome, SYSTEM_ERROR_CODE};

pub struct ScanMetrics {
    registry: Registry,
    scans_total: IntCounterVec,
    scan_duration_seconds: HistogramVec,
    log_failures_total: IntCounter,
    log_dropped_total: IntCounter,
}

impl ScanMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let scans_total = IntCounterVec::new(
            opts!("checkpoint_scans_total", "Total tag scans by result and code"),
            &["result", "code"],
        )
        .expect("metric definition is valid");

        let scan_duration_seconds = HistogramVec::new(
            histogram_opts!(
                "checkpoint_scan_duration_seconds",
                "Time from request to decision, in seconds",
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
            ),
            &["result"],
        )
        .expect("metric definition is valid");

        let log_failures_total = IntCounter::with_opts(opts!(
            "checkpoint_scan_log_failures_total",
            "Scan log writes the sink rejected"
        ))
        .expect("metric definition is valid");

        let log_dropped_total = IntCounter::with_opts(opts!(
            "checkpoint_scan_log_dropped_total",
            "Scan log entries dropped because the queue was full or closed"
        ))
        .expect("metric definition is valid");

        registry
            .register(Box::new(scans_total.clone()))
            .expect("failed to register checkpoint_scans_total");
        registry
            .register(Box::new(scan_duration_seconds.clone()))
            .expect("failed to register checkpoint_scan_duration_seconds");
        registry
            .register(Box::new(log_failures_total.clone()))
            .expect("failed to register checkpoint_scan_log_failures_total");
        registry
            .register(Box::new(log_dropped_total.clone()))
            .expect("failed to register checkpoint_scan_log_dropped_total");

        Self {
            registry,
            scans_total,
            scan_duration_seconds,
            log_failures_total,
            log_dropped_total,
        }
    }

    pub fn observe_outcome(&self, outcome: &ValidationOutcome, elapsed_ms: i64) {
        let result = outcome.result().as_str();
        let code = outcome.error_code().unwrap_or("OK");
        self.scans_total.with_label_values(&[result, code]).inc();
        self.scan_duration_seconds
            .with_label_values(&[result])
            .observe(elapsed_ms as f64 / 1000.0);
    }

    pub fn observe_fault(&self, elapsed_ms: i64) {
        let result = ScanResult::Error.as_str();
        self.scans_total
            .with_label_values(&[result, SYSTEM_ERROR_CODE])
            .inc();
        self.scan_duration_seconds
            .with_label_values(&[result])
            .observe(elapsed_ms as f64 / 1000.0);
    }

    pub fn log_failed(&self) {
        self.log_failures_total.inc();
    }

    pub fn log_dropped(&self) {
        self.log_dropped_total.inc();
    }

    pub fn log_failures(&self) -> u64 {
        self.log_failures_total.get()
    }

    pub fn dropped(&self) -> u64 {
        self.log_dropped_total.get()
    }

    /// Encode every metric as Prometheus text format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .context("failed to encode metrics")?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}
