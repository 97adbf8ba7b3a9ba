//! # Metrics
//!
//! Prometheus metrics for monitoring the target status poller.
//!
//! ## Metrics Exposed
//!
//! - `target_status_poll_cycles_total` - Total number of poll cycles run
//! - `target_status_poll_cycles_skipped_total` - Activations skipped by the should-poll check
//! - `target_status_poll_cycle_errors_total` - Poll cycles that ended with an error
//! - `target_status_poll_cycle_duration_seconds` - Duration of poll cycles
//! - `target_status_collector_fetches_total` - Total number of collector fetches
//! - `target_status_collector_fetch_failures_total` - Collector fetches that failed
//! - `target_status_collectors_fraction` - Fraction of collectors that answered the last cycle
//! - `target_status_patch_failures_total` - Failed endpoint status patches by resource kind

use anyhow::Result;
use prometheus::{Gauge, Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static POLL_CYCLES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "target_status_poll_cycles_total",
        "Total number of target status poll cycles",
    )
    .expect("Failed to create POLL_CYCLES_TOTAL metric - this should never happen")
});

static POLL_CYCLES_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "target_status_poll_cycles_skipped_total",
        "Total number of activations skipped because target status is disabled or unused",
    )
    .expect("Failed to create POLL_CYCLES_SKIPPED_TOTAL metric - this should never happen")
});

static POLL_CYCLE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "target_status_poll_cycle_errors_total",
        "Total number of poll cycles that ended with an error",
    )
    .expect("Failed to create POLL_CYCLE_ERRORS_TOTAL metric - this should never happen")
});

static POLL_CYCLE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "target_status_poll_cycle_duration_seconds",
            "Duration of target status poll cycles in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create POLL_CYCLE_DURATION metric - this should never happen")
});

static COLLECTOR_FETCHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "target_status_collector_fetches_total",
        "Total number of collector target fetches",
    )
    .expect("Failed to create COLLECTOR_FETCHES_TOTAL metric - this should never happen")
});

static COLLECTOR_FETCH_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "target_status_collector_fetch_failures_total",
        "Total number of collector target fetches that failed",
    )
    .expect("Failed to create COLLECTOR_FETCH_FAILURES_TOTAL metric - this should never happen")
});

static COLLECTORS_FRACTION: LazyLock<Gauge> = LazyLock::new(|| {
    Gauge::new(
        "target_status_collectors_fraction",
        "Fraction of collectors that answered during the last poll cycle",
    )
    .expect("Failed to create COLLECTORS_FRACTION metric - this should never happen")
});

static PATCH_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "target_status_patch_failures_total",
            "Total number of failed endpoint status patches by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create PATCH_FAILURES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(POLL_CYCLES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(POLL_CYCLES_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(POLL_CYCLE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(POLL_CYCLE_DURATION.clone()))?;
    REGISTRY.register(Box::new(COLLECTOR_FETCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(COLLECTOR_FETCH_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(COLLECTORS_FRACTION.clone()))?;
    REGISTRY.register(Box::new(PATCH_FAILURES_TOTAL.clone()))?;

    Ok(())
}

/// Metric families of the operator registry
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

pub fn increment_poll_cycles() {
    POLL_CYCLES_TOTAL.inc();
}

pub fn increment_poll_cycles_skipped() {
    POLL_CYCLES_SKIPPED_TOTAL.inc();
}

pub fn increment_poll_cycle_errors() {
    POLL_CYCLE_ERRORS_TOTAL.inc();
}

pub fn observe_poll_cycle_duration(duration: f64) {
    POLL_CYCLE_DURATION.observe(duration);
}

pub fn increment_collector_fetches() {
    COLLECTOR_FETCHES_TOTAL.inc();
}

pub fn increment_collector_fetch_failures() {
    COLLECTOR_FETCH_FAILURES_TOTAL.inc();
}

pub fn set_collectors_fraction(fraction: f64) {
    COLLECTORS_FRACTION.set(fraction);
}

pub fn increment_patch_failures(kind: &str) {
    PATCH_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}
